use serde::{Deserialize, Serialize};

use crate::card::Card;

/// A bottom card on the table and the card covering it, if any.
///
/// The bottom card never changes once thrown. The top slot is filled by a
/// break or by relocating a top card from another pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    bottom: Card,
    top: Option<Card>,
}

impl Pair {
    pub fn new(bottom: Card) -> Self {
        Pair { bottom, top: None }
    }

    pub fn covered(bottom: Card, top: Card) -> Self {
        Pair {
            bottom,
            top: Some(top),
        }
    }

    pub fn bottom(&self) -> Card {
        self.bottom
    }

    pub fn top(&self) -> Option<Card> {
        self.top
    }

    pub fn is_broken(&self) -> bool {
        self.top.is_some()
    }

    pub fn contains(&self, card: &Card) -> bool {
        self.bottom == *card || self.top.as_ref() == Some(card)
    }

    /// Bottom first, then top.
    pub fn cards(&self) -> impl Iterator<Item = Card> + '_ {
        std::iter::once(self.bottom).chain(self.top)
    }

    pub(crate) fn set_top(&mut self, card: Card) {
        self.top = Some(card);
    }

    pub(crate) fn take_top(&mut self) -> Option<Card> {
        self.top.take()
    }
}
