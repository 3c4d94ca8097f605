use crate::{card::Card, user_name::Username};

/// A move as the local player expresses it, before the legality check turns
/// it into an `Intent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    Throw { cards: Vec<Card> },
    Break { selected: Vec<Card>, bottom: Card },
    MoveTopCard { top: Option<Card>, new_bottom: Card },
    Take,
    BreakOut,
    PassWithCards { cards: Vec<Card> },
    PassWithTrump,
    StealTrump { selected: Vec<Card> },
    PutIntoDeck { cards: Vec<Card> },
    AllowBreak,
    CallCheat { cheater: Username },
}

/// Cards the local player has picked, purely local state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    cards: Vec<Card>,
    top_card: Option<Card>,
}

impl Selection {
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn top_card(&self) -> Option<Card> {
        self.top_card
    }

    pub fn toggle(&mut self, card: Card) {
        if let Some(i) = self.cards.iter().position(|c| *c == card) {
            self.cards.remove(i);
        } else {
            self.cards.push(card);
        }
    }

    pub fn toggle_top(&mut self, card: Card) {
        self.top_card = match self.top_card {
            Some(c) if c == card => None,
            _ => Some(card),
        };
    }

    /// Forget everything picked so far.
    pub fn retract(&mut self) {
        self.cards.clear();
        self.top_card = None;
    }

    pub fn throw(&self) -> PlayerAction {
        PlayerAction::Throw {
            cards: self.cards.clone(),
        }
    }

    pub fn break_onto(&self, bottom: Card) -> PlayerAction {
        PlayerAction::Break {
            selected: self.cards.clone(),
            bottom,
        }
    }

    pub fn move_top_onto(&self, new_bottom: Card) -> PlayerAction {
        PlayerAction::MoveTopCard {
            top: self.top_card,
            new_bottom,
        }
    }

    pub fn pass(&self) -> PlayerAction {
        PlayerAction::PassWithCards {
            cards: self.cards.clone(),
        }
    }

    pub fn steal_trump(&self) -> PlayerAction {
        PlayerAction::StealTrump {
            selected: self.cards.clone(),
        }
    }

    pub fn put_into_deck(&self) -> PlayerAction {
        PlayerAction::PutIntoDeck {
            cards: self.cards.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        card::{Card, Rank, Suit},
        play::{PlayerAction, Selection},
    };

    #[test]
    fn toggle_should_select_and_unselect() {
        let a = Card::new(Rank::Seven, Suit::Hearts);
        let mut selection = Selection::default();
        selection.toggle(a);
        assert_eq!(selection.cards(), &[a]);
        selection.toggle(a);
        assert!(selection.cards().is_empty());
    }

    #[test]
    fn retract_should_clear_cards_and_top_card() {
        let a = Card::new(Rank::Seven, Suit::Hearts);
        let mut selection = Selection::default();
        selection.toggle(a);
        selection.toggle_top(a);
        selection.retract();
        assert_eq!(selection, Selection::default());
        assert_eq!(
            selection.move_top_onto(a),
            PlayerAction::MoveTopCard {
                top: None,
                new_bottom: a
            }
        );
    }
}
