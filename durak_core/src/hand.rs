use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    card::Card, error::EngineError, user_name::Username, utils::SliceExtensions,
    utils::VecExtensions,
};

/// One player's hand as a replica knows it: the full card list for hands it
/// may see, only the size for everyone else's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Known(Vec<Card>),
    Hidden(usize),
}

impl Hand {
    pub fn count(&self) -> usize {
        match self {
            Hand::Known(cards) => cards.len(),
            Hand::Hidden(count) => *count,
        }
    }

    pub fn known(&self) -> Option<&[Card]> {
        match self {
            Hand::Known(cards) => Some(cards),
            Hand::Hidden(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hands {
    hands: BTreeMap<Username, Hand>,
}

impl Hands {
    pub fn new() -> Self {
        Hands {
            hands: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, player: Username, hand: Hand) {
        self.hands.insert(player, hand);
    }

    pub fn remove(&mut self, player: &Username) -> Option<Hand> {
        self.hands.remove(player)
    }

    pub fn get(&self, player: &Username) -> Option<&Hand> {
        self.hands.get(player)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Username, &Hand)> {
        self.hands.iter()
    }

    pub fn count_for(&self, player: &Username) -> usize {
        self.hands.get(player).map_or(0, Hand::count)
    }

    pub fn total_count(&self) -> usize {
        self.hands.values().map(Hand::count).sum()
    }

    /// The cards of `owner`, but only when `requester` is the owner and the
    /// hand is known to this replica.
    pub fn cards_for(&self, owner: &Username, requester: &Username) -> Option<&[Card]> {
        if owner != requester {
            return None;
        }
        self.hands.get(owner).and_then(Hand::known)
    }

    /// Every card visible in any hand.
    pub fn known_cards(&self) -> impl Iterator<Item = Card> + '_ {
        self.hands
            .values()
            .filter_map(Hand::known)
            .flat_map(|cards| cards.iter().copied())
    }

    /// Fails with `NotOwned` for the first card the (known) hand lacks.
    pub fn ensure_owned(&self, player: &Username, cards: &[Card]) -> Result<(), EngineError> {
        let hand = self.hand(player)?;
        match hand {
            Hand::Known(held) => match cards.iter().find(|c| !held.contains(c)) {
                Some(card) => Err(EngineError::NotOwned {
                    player: player.clone(),
                    card: *card,
                }),
                None => Ok(()),
            },
            Hand::Hidden(count) if *count < cards.len() => Err(EngineError::invariant(format!(
                "{} holds {} cards, cannot give up {}",
                player,
                count,
                cards.len()
            ))),
            Hand::Hidden(_) => Ok(()),
        }
    }

    pub fn remove_cards(&mut self, player: &Username, cards: &[Card]) -> Result<(), EngineError> {
        if let Some(card) = cards.first_duplicate() {
            return Err(EngineError::invariant(format!("{} listed twice", card)));
        }
        match self.hand_mut(player)? {
            Hand::Known(held) => {
                if !held.remove_each(cards) {
                    return Err(EngineError::invariant(format!(
                        "{} does not hold all of {:?}",
                        player, cards
                    )));
                }
            }
            Hand::Hidden(count) => {
                if *count < cards.len() {
                    return Err(EngineError::invariant(format!(
                        "{} holds {} cards, cannot give up {}",
                        player,
                        count,
                        cards.len()
                    )));
                }
                *count -= cards.len();
            }
        }
        Ok(())
    }

    pub fn add_cards(&mut self, player: &Username, cards: &[Card]) -> Result<(), EngineError> {
        if let Some(card) = cards.first_duplicate() {
            return Err(EngineError::invariant(format!("{} listed twice", card)));
        }
        if let Some((owner, card)) = self.find_owner(cards) {
            return Err(EngineError::invariant(format!(
                "{} is already held by {}",
                card, owner
            )));
        }
        match self.hand_mut(player)? {
            Hand::Known(held) => held.extend_from_slice(cards),
            Hand::Hidden(count) => *count += cards.len(),
        }
        Ok(())
    }

    /// Adds `count` unseen cards, e.g. a hidden hand taking from the table.
    pub fn add_hidden(&mut self, player: &Username, count: usize) -> Result<(), EngineError> {
        match self.hand_mut(player)? {
            Hand::Known(_) => Err(EngineError::invariant(format!(
                "cards dealt to {} are missing",
                player
            ))),
            Hand::Hidden(n) => {
                *n += count;
                Ok(())
            }
        }
    }

    fn find_owner<'a>(&'a self, cards: &'a [Card]) -> Option<(&'a Username, &'a Card)> {
        self.hands.iter().find_map(|(owner, hand)| {
            let held = hand.known()?;
            cards.iter().find(|c| held.contains(c)).map(|c| (owner, c))
        })
    }

    fn hand(&self, player: &Username) -> Result<&Hand, EngineError> {
        self.hands
            .get(player)
            .ok_or_else(|| EngineError::invariant(format!("{} has no hand", player)))
    }

    fn hand_mut(&mut self, player: &Username) -> Result<&mut Hand, EngineError> {
        self.hands
            .get_mut(player)
            .ok_or_else(|| EngineError::invariant(format!("{} has no hand", player)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        card::{Card, Rank, Suit},
        error::EngineError,
        hand::{Hand, Hands},
        user_name::Username,
    };

    fn setup() -> (Hands, Username, Username, Card, Card) {
        let alice = Username::from("alice");
        let bob = Username::from("bob");
        let a = Card::new(Rank::Seven, Suit::Hearts);
        let b = Card::new(Rank::Eight, Suit::Clubs);
        let mut hands = Hands::new();
        hands.insert(alice.clone(), Hand::Known(vec![a, b]));
        hands.insert(bob.clone(), Hand::Hidden(3));
        (hands, alice, bob, a, b)
    }

    #[test]
    fn remove_cards_should_fail_for_card_not_in_hand() {
        let (mut hands, alice, _, a, _) = setup();
        let missing = Card::new(Rank::Ace, Suit::Spades);
        let result = hands.remove_cards(&alice, &[a, missing]);
        assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
        assert_eq!(hands.count_for(&alice), 2);
    }

    #[test]
    fn remove_cards_should_decrement_hidden_count() {
        let (mut hands, _, bob, a, _) = setup();
        hands.remove_cards(&bob, &[a]).unwrap();
        assert_eq!(hands.count_for(&bob), 2);
        assert!(hands.remove_cards(&bob, &[a, a]).is_err());
    }

    #[test]
    fn add_cards_should_reject_card_held_elsewhere() {
        let (mut hands, alice, bob, a, _) = setup();
        let result = hands.add_cards(&bob, &[a]);
        assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
        assert_eq!(hands.count_for(&alice), 2);
        assert_eq!(hands.count_for(&bob), 3);
    }

    #[test]
    fn cards_for_should_only_answer_the_owner() {
        let (hands, alice, bob, a, b) = setup();
        assert_eq!(hands.cards_for(&alice, &alice), Some(&[a, b][..]));
        assert_eq!(hands.cards_for(&alice, &bob), None);
        assert_eq!(hands.cards_for(&bob, &bob), None);
    }

    #[test]
    fn ensure_owned_should_name_the_missing_card() {
        let (hands, alice, _, a, _) = setup();
        let missing = Card::new(Rank::Ace, Suit::Spades);
        assert_eq!(hands.ensure_owned(&alice, &[a]), Ok(()));
        assert_eq!(
            hands.ensure_owned(&alice, &[missing]),
            Err(EngineError::NotOwned {
                player: alice.clone(),
                card: missing
            })
        );
    }
}
