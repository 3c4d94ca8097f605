use std::{fmt, str::FromStr};

use itertools::iproduct;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::EngineError;

#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Copy,
    Clone,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum Suit {
    #[strum(serialize = "H")]
    #[serde(rename = "H")]
    Hearts,
    #[strum(serialize = "C")]
    #[serde(rename = "C")]
    Clubs,
    #[strum(serialize = "D")]
    #[serde(rename = "D")]
    Diamonds,
    #[strum(serialize = "S")]
    #[serde(rename = "S")]
    Spades,
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, EnumIter, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl From<Rank> for u8 {
    fn from(rank: Rank) -> Self {
        rank.value()
    }
}

impl TryFrom<u8> for Rank {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rank::iter()
            .find(|r| r.value() == value)
            .ok_or_else(|| EngineError::UnknownCard(value.to_string()))
    }
}

/// A playing card. Its identifier on the wire is `card<rank><suit>`,
/// e.g. `card7H` or `card14S`.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Card { rank, suit }
    }

    /// All cards with a rank of at least `lowest`, suit by suit.
    pub fn deck(lowest: Rank) -> Vec<Card> {
        iproduct!(Suit::iter(), Rank::iter().filter(|r| *r >= lowest))
            .map(|(suit, rank)| Card { rank, suit })
            .collect()
    }

    pub fn id(&self) -> String {
        format!("card{}{}", self.rank.value(), self.suit)
    }

    /// Whether this card may legally cover `bottom`.
    pub fn beats(&self, bottom: &Card, trump: Option<Suit>) -> bool {
        if self.suit == bottom.suit {
            return self.rank > bottom.rank;
        }
        trump.map_or(false, |t| self.suit == t)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for Card {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || EngineError::UnknownCard(s.to_string());
        let upper = s.trim().to_uppercase();
        let body = upper.strip_prefix("CARD").unwrap_or(&upper);
        if body.len() < 2 || !body.is_ascii() {
            return Err(unknown());
        }
        let (symbol, suit) = body.split_at(body.len() - 1);
        let suit = Suit::from_str(suit).map_err(|_| unknown())?;
        let rank = symbol
            .parse::<u8>()
            .ok()
            .and_then(|v| Rank::try_from(v).ok())
            .ok_or_else(unknown)?;
        Ok(Card { rank, suit })
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.id()
    }
}

impl TryFrom<String> for Card {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Card::from_str(&value)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::card::{Card, Rank, Suit};

    #[test]
    fn deck_should_contain_52_cards_from_two() {
        assert_eq!(Card::deck(Rank::Two).len(), 52);
    }

    #[test]
    fn deck_should_skip_ranks_below_lowest() {
        let deck = Card::deck(Rank::Six);
        assert_eq!(deck.len(), 36);
        assert!(deck.iter().all(|c| c.rank >= Rank::Six));
    }

    #[test]
    fn from_str_should_accept_ids_with_and_without_prefix() {
        let seven = Card::new(Rank::Seven, Suit::Hearts);
        assert_eq!(Card::from_str("card7H"), Ok(seven));
        assert_eq!(Card::from_str("7h"), Ok(seven));
        assert_eq!(
            Card::from_str("CARD14S"),
            Ok(Card::new(Rank::Ace, Suit::Spades))
        );
    }

    #[test]
    fn from_str_should_reject_garbage() {
        assert!(Card::from_str("card1H").is_err());
        assert!(Card::from_str("card7X").is_err());
        assert!(Card::from_str("H").is_err());
        assert!(Card::from_str("").is_err());
    }

    #[test]
    fn id_should_match_display() {
        let card = Card::new(Rank::Ten, Suit::Diamonds);
        assert_eq!(card.id(), "card10D");
        assert_eq!(card.to_string(), "card10D");
    }

    #[test]
    fn serde_should_use_card_id() {
        let card = Card::new(Rank::Queen, Suit::Clubs);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, "\"card12C\"");
        assert_eq!(serde_json::from_str::<Card>(&json).unwrap(), card);
    }

    #[test]
    fn beats_should_follow_suit_and_trump() {
        let seven_h = Card::new(Rank::Seven, Suit::Hearts);
        let nine_h = Card::new(Rank::Nine, Suit::Hearts);
        let two_s = Card::new(Rank::Two, Suit::Spades);
        assert!(nine_h.beats(&seven_h, None));
        assert!(!seven_h.beats(&nine_h, None));
        assert!(!two_s.beats(&seven_h, Some(Suit::Clubs)));
        assert!(two_s.beats(&seven_h, Some(Suit::Spades)));
    }
}
