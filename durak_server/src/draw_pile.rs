use durak_core::{
    card::{Card, Rank},
    utils::VecExtensions,
};
use rand::seq::SliceRandom;

/// The face-down cards only the room knows. The top of the pile is the end
/// of the vector, the bottom card is turned up as trump.
#[derive(Debug, Clone, Default)]
pub struct DrawPile {
    cards: Vec<Card>,
}

impl DrawPile {
    pub fn shuffled(lowest: Rank) -> Self {
        let mut cards = Card::deck(lowest);
        cards.shuffle(&mut rand::thread_rng());
        DrawPile { cards }
    }

    pub fn from_cards(cards: Vec<Card>) -> Self {
        DrawPile { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn deal(&mut self, count: usize) -> Vec<Card> {
        let split = self.cards.len().saturating_sub(count);
        self.cards.split_off(split).into_iter().rev().collect()
    }

    pub fn turn_up_trump(&mut self) -> Option<Card> {
        if self.cards.is_empty() {
            None
        } else {
            Some(self.cards.remove(0))
        }
    }

    pub fn put_back(&mut self, cards: &[Card]) {
        self.cards.extend_from_slice(cards);
    }

    /// Takes cards that were put back out of the pile again.
    pub fn pull_out(&mut self, cards: &[Card]) -> bool {
        self.cards.remove_each(cards)
    }

    pub fn cards_mut(&mut self) -> &mut Vec<Card> {
        &mut self.cards
    }
}
