use crate::{
    card::{Card, Suit},
    error::EngineError,
    hand::Hands,
    user_name::Username,
};

/// The face-down draw pile (only its size) and the face-up trump card.
///
/// The trump suit is fixed for the whole game even when the trump card is
/// swapped out or drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deck {
    count: usize,
    trump: Option<Card>,
    trump_suit: Option<Suit>,
}

impl Deck {
    pub fn new(count: usize, trump: Option<Card>, trump_suit: Option<Suit>) -> Self {
        Deck {
            count,
            trump,
            trump_suit: trump_suit.or(trump.map(|c| c.suit)),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn trump(&self) -> Option<Card> {
        self.trump
    }

    pub fn trump_suit(&self) -> Option<Suit> {
        self.trump_suit
    }

    /// Pile plus the trump card while it is still lying face up.
    pub fn visible_count(&self) -> usize {
        self.count + usize::from(self.trump.is_some())
    }

    /// Inverse of `visible_count`, as reported in round snapshots.
    pub fn set_visible_count(&mut self, visible: usize) {
        if visible == 0 {
            self.trump = None;
            self.count = 0;
        } else if self.trump.is_some() {
            self.count = visible - 1;
        } else {
            self.count = visible;
        }
    }

    /// Swaps `replacement` from the player's hand with the trump card.
    /// Returns the old trump card, now in the player's hand.
    pub fn steal_trump(
        &mut self,
        hands: &mut Hands,
        player: &Username,
        replacement: Card,
    ) -> Result<Card, EngineError> {
        let old = self
            .trump
            .ok_or_else(|| EngineError::illegal("there is no trump card to steal"))?;
        hands.ensure_owned(player, &[replacement])?;
        hands.remove_cards(player, &[replacement])?;
        self.trump = Some(replacement);
        if let Err(e) = hands.add_cards(player, &[old]) {
            self.trump = Some(old);
            hands.add_cards(player, &[replacement])?;
            return Err(e);
        }
        Ok(old)
    }

    /// Undoes `steal_trump`.
    pub fn restore_trump(
        &mut self,
        hands: &mut Hands,
        player: &Username,
        old: Card,
    ) -> Result<(), EngineError> {
        let replacement = self
            .trump
            .ok_or_else(|| EngineError::invariant("trump card vanished"))?;
        hands.remove_cards(player, &[old])?;
        hands.add_cards(player, &[replacement])?;
        self.trump = Some(old);
        Ok(())
    }

    pub fn put_into_deck(
        &mut self,
        hands: &mut Hands,
        player: &Username,
        cards: &[Card],
    ) -> Result<(), EngineError> {
        if cards.is_empty() {
            return Err(EngineError::illegal("no cards to put into the deck"));
        }
        hands.ensure_owned(player, cards)?;
        hands.remove_cards(player, cards)?;
        self.count += cards.len();
        Ok(())
    }

    /// Undoes `put_into_deck`.
    pub fn take_back(
        &mut self,
        hands: &mut Hands,
        player: &Username,
        cards: &[Card],
    ) -> Result<(), EngineError> {
        if self.count < cards.len() {
            return Err(EngineError::invariant("deck holds fewer cards than were put in"));
        }
        hands.add_cards(player, cards)?;
        self.count -= cards.len();
        Ok(())
    }

    /// One card leaves the pile, or the trump card once the pile is empty.
    /// The caller (the authority) knows which card it was.
    pub fn draw(&mut self) -> Option<DrawSource> {
        if self.count > 0 {
            self.count -= 1;
            Some(DrawSource::Pile)
        } else {
            self.trump.take().map(DrawSource::Trump)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    Pile,
    Trump(Card),
}

#[cfg(test)]
mod tests {
    use crate::{
        card::{Card, Rank, Suit},
        deck::{Deck, DrawSource},
        error::EngineError,
        hand::{Hand, Hands},
        user_name::Username,
    };

    fn setup() -> (Deck, Hands, Username, Card, Card) {
        let alice = Username::from("alice");
        let trump = Card::new(Rank::Six, Suit::Spades);
        let s = Card::new(Rank::Ace, Suit::Hearts);
        let mut hands = Hands::new();
        hands.insert(alice.clone(), Hand::Known(vec![s]));
        (Deck::new(10, Some(trump), None), hands, alice, trump, s)
    }

    #[test]
    fn steal_trump_should_swap_hand_card_and_trump() {
        let (mut deck, mut hands, alice, trump, s) = setup();

        let old = deck.steal_trump(&mut hands, &alice, s).unwrap();

        assert_eq!(old, trump);
        assert_eq!(deck.trump(), Some(s));
        assert_eq!(deck.trump_suit(), Some(Suit::Spades));
        assert_eq!(hands.cards_for(&alice, &alice), Some(&[trump][..]));
    }

    #[test]
    fn steal_trump_should_fail_for_card_not_owned() {
        let (mut deck, mut hands, alice, trump, _) = setup();
        let other = Card::new(Rank::Two, Suit::Clubs);

        let result = deck.steal_trump(&mut hands, &alice, other);

        assert!(matches!(result, Err(EngineError::NotOwned { .. })));
        assert_eq!(deck.trump(), Some(trump));
    }

    #[test]
    fn restore_trump_should_undo_steal() {
        let (mut deck, mut hands, alice, trump, s) = setup();
        let before = (deck.clone(), hands.clone());

        let old = deck.steal_trump(&mut hands, &alice, s).unwrap();
        deck.restore_trump(&mut hands, &alice, old).unwrap();

        assert_eq!(deck, before.0);
        assert_eq!(hands, before.1);
        assert_eq!(deck.trump(), Some(trump));
    }

    #[test]
    fn put_into_deck_should_grow_pile() {
        let (mut deck, mut hands, alice, _, s) = setup();

        deck.put_into_deck(&mut hands, &alice, &[s]).unwrap();

        assert_eq!(deck.count(), 11);
        assert_eq!(hands.count_for(&alice), 0);
        assert!(matches!(
            deck.put_into_deck(&mut hands, &alice, &[s]),
            Err(EngineError::NotOwned { .. })
        ));
    }

    #[test]
    fn visible_count_should_include_trump_card() {
        let (mut deck, _, _, _, _) = setup();
        assert_eq!(deck.visible_count(), 11);
        deck.set_visible_count(4);
        assert_eq!(deck.count(), 3);
        deck.set_visible_count(0);
        assert_eq!(deck.trump(), None);
        assert_eq!(deck.visible_count(), 0);
    }

    #[test]
    fn draw_should_hand_out_trump_last() {
        let trump = Card::new(Rank::Six, Suit::Spades);
        let mut deck = Deck::new(1, Some(trump), None);
        assert_eq!(deck.draw(), Some(DrawSource::Pile));
        assert_eq!(deck.draw(), Some(DrawSource::Trump(trump)));
        assert_eq!(deck.draw(), None);
    }
}
