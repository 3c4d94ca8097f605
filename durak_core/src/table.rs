use serde::{Deserialize, Serialize};

use crate::{card::Card, error::EngineError, pair::Pair, utils::VecExtensions};

/// Pairs on the table in the order they were thrown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pairs: Vec<Pair>,
}

impl Table {
    pub fn new() -> Self {
        Table { pairs: vec![] }
    }

    pub fn from_pairs(pairs: Vec<Pair>) -> Self {
        Table { pairs }
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn card_count(&self) -> usize {
        self.pairs.iter().map(|p| p.cards().count()).sum()
    }

    pub fn uncovered_count(&self) -> usize {
        self.pairs.iter().filter(|p| !p.is_broken()).count()
    }

    pub fn all_broken(&self) -> bool {
        self.pairs.iter().all(Pair::is_broken)
    }

    pub fn has_top_cards(&self) -> bool {
        self.pairs.iter().any(Pair::is_broken)
    }

    pub fn contains(&self, card: &Card) -> bool {
        self.pairs.iter().any(|p| p.contains(card))
    }

    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.pairs.iter().flat_map(Pair::cards)
    }

    pub fn find_bottom(&self, bottom: &Card) -> Option<&Pair> {
        self.pairs.iter().find(|p| p.bottom() == *bottom)
    }

    /// The bottom card currently covered by `top`.
    pub fn bottom_of(&self, top: &Card) -> Option<Card> {
        self.pairs
            .iter()
            .find(|p| p.top().as_ref() == Some(top))
            .map(Pair::bottom)
    }

    pub fn throw_pair(&mut self, card: Card) {
        self.pairs.push(Pair::new(card));
    }

    pub fn break_top(&mut self, bottom: Card, top: Card) -> Result<(), EngineError> {
        let pair = self
            .pairs
            .iter_mut()
            .find(|p| p.bottom() == bottom)
            .ok_or(EngineError::NotFound(bottom))?;
        if pair.is_broken() {
            return Err(EngineError::AlreadyBroken(bottom));
        }
        pair.set_top(top);
        Ok(())
    }

    /// Moves `top` onto the pair whose bottom is `new_bottom`. Nothing changes
    /// when the move is refused.
    pub fn relocate_top_card(&mut self, top: Card, new_bottom: Card) -> Result<(), EngineError> {
        let from = self
            .pairs
            .iter()
            .position(|p| p.top() == Some(top))
            .ok_or(EngineError::NotFound(top))?;
        let to = self
            .pairs
            .iter()
            .position(|p| p.bottom() == new_bottom)
            .ok_or(EngineError::NotFound(new_bottom))?;
        if self.pairs[to].is_broken() {
            return Err(EngineError::AlreadyBroken(new_bottom));
        }
        self.pairs[from].take_top();
        self.pairs[to].set_top(top);
        Ok(())
    }

    /// Empties the table, returning bottom then top of each pair in pair order.
    pub fn take_all(&mut self) -> Result<Vec<Card>, EngineError> {
        if self.pairs.is_empty() {
            return Err(EngineError::NothingToTake);
        }
        let cards = self.cards().collect();
        self.pairs.clear();
        Ok(cards)
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Removes the uncovered pairs with the given bottom cards. Refused as a
    /// whole if any of them is missing or covered.
    pub fn remove_pairs(&mut self, bottoms: &[Card]) -> Result<(), EngineError> {
        for bottom in bottoms {
            match self.find_bottom(bottom) {
                None => return Err(EngineError::NotFound(*bottom)),
                Some(p) if p.is_broken() => return Err(EngineError::AlreadyBroken(*bottom)),
                Some(_) => {}
            }
        }
        for bottom in bottoms {
            self.pairs.remove_first_where(|p| p.bottom() == *bottom);
        }
        Ok(())
    }
}
