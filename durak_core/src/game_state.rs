use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    card::{Card, Suit},
    cheat::RecordedAction,
    deck::{Deck, DrawSource},
    error::EngineError,
    hand::{Hand, Hands},
    pair::Pair,
    table::Table,
    user_name::Username,
    utils::SliceExtensions,
};

/// One replica of the game. Every authoritative event produces a new value
/// through `GameState::apply`; nothing mutates it in between.
///
/// `viewer` decides which hands this replica can see: `None` is the room,
/// which sees all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub(crate) viewer: Option<Username>,
    pub(crate) players: Vec<Username>,
    pub(crate) finished: Vec<Username>,
    pub(crate) current: Option<Username>,
    pub(crate) hands: Hands,
    pub(crate) table: Table,
    pub(crate) deck: Deck,
    pub(crate) allowed_break: BTreeSet<Username>,
    pub(crate) last_actions: BTreeMap<Username, RecordedAction>,
    pub(crate) discarded: usize,
    pub(crate) deck_size: usize,
    pub(crate) over: bool,
}

/// Full per-viewer picture of a game, used to (re)load a replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub players: Vec<Username>,
    pub finished: Vec<Username>,
    pub current: Option<Username>,
    pub cardcounts: BTreeMap<Username, usize>,
    pub cards: Option<Vec<Card>>,
    pub table: Vec<Pair>,
    pub deckcount: usize,
    #[serde(default)]
    pub discarded: usize,
    pub trump: Option<Card>,
    pub trump_suit: Option<Suit>,
    pub deck_size: usize,
    pub allowed_break: Vec<Username>,
}

impl GameState {
    /// Empty state for the room, before dealing.
    pub fn new(deck_size: usize) -> Self {
        GameState {
            viewer: None,
            players: vec![],
            finished: vec![],
            current: None,
            hands: Hands::new(),
            table: Table::new(),
            deck: Deck::default(),
            allowed_break: BTreeSet::new(),
            last_actions: BTreeMap::new(),
            discarded: 0,
            deck_size,
            over: false,
        }
    }

    pub fn viewer(&self) -> Option<&Username> {
        self.viewer.as_ref()
    }

    pub fn players(&self) -> &[Username] {
        &self.players
    }

    pub fn finished(&self) -> &[Username] {
        &self.finished
    }

    pub fn current(&self) -> Option<&Username> {
        self.current.as_ref()
    }

    pub fn is_current(&self, player: &Username) -> bool {
        self.current.as_ref() == Some(player)
    }

    pub fn hands(&self) -> &Hands {
        &self.hands
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Cards broken out of play in earlier rounds.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn deck_size(&self) -> usize {
        self.deck_size
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn allowed_break(&self) -> &BTreeSet<Username> {
        &self.allowed_break
    }

    pub fn last_action(&self, player: &Username) -> Option<&RecordedAction> {
        self.last_actions.get(player)
    }

    pub fn is_seated(&self, player: &Username) -> bool {
        self.players.contains(player)
    }

    pub fn count_for(&self, player: &Username) -> usize {
        self.hands.count_for(player)
    }

    /// The seated player after `player`, wrapping around.
    pub fn next_player(&self, player: &Username) -> Option<&Username> {
        let idx = self.players.iter().position(|p| p == player)?;
        self.players.get((idx + 1) % self.players.len())
    }

    pub fn prev_player(&self, player: &Username) -> Option<&Username> {
        let idx = self.players.iter().position(|p| p == player)?;
        self.players
            .get((idx + self.players.len() - 1) % self.players.len())
    }

    /// Cards of `owner` as `requester` is allowed to see them.
    pub fn cards_for(&self, owner: &Username, requester: &Username) -> Option<&[Card]> {
        self.hands.cards_for(owner, requester)
    }

    /// Deck and trump, every hand, the table and the discard pile.
    pub fn card_total(&self) -> usize {
        self.deck.visible_count()
            + self.hands.total_count()
            + self.table.card_count()
            + self.discarded
    }

    pub fn check_invariants(&self) -> Result<(), EngineError> {
        let total = self.card_total();
        if total != self.deck_size {
            return Err(EngineError::invariant(format!(
                "{} cards accounted for, deck has {}",
                total, self.deck_size
            )));
        }
        let visible: Vec<Card> = self
            .hands
            .known_cards()
            .chain(self.table.cards())
            .chain(self.deck.trump())
            .collect();
        if let Some(card) = visible.first_duplicate() {
            return Err(EngineError::invariant(format!("{} has two owners", card)));
        }
        if let Some(current) = &self.current {
            if !self.over && !self.is_seated(current) {
                return Err(EngineError::invariant(format!(
                    "current player {} is not seated",
                    current
                )));
            }
        }
        Ok(())
    }

    pub fn snapshot_for(&self, viewer: Option<&Username>) -> Snapshot {
        Snapshot {
            players: self.players.clone(),
            finished: self.finished.clone(),
            current: self.current.clone(),
            cardcounts: self.card_counts(),
            cards: viewer.and_then(|v| self.cards_for(v, v)).map(<[Card]>::to_vec),
            table: self.table.pairs().to_vec(),
            deckcount: self.deck.visible_count(),
            discarded: self.discarded,
            trump: self.deck.trump(),
            trump_suit: self.deck.trump_suit(),
            deck_size: self.deck_size,
            allowed_break: self.allowed_break.iter().cloned().collect(),
        }
    }

    /// Builds the replica of `viewer` from a snapshot sent by the room.
    pub fn from_snapshot(snapshot: Snapshot, viewer: Username) -> Result<Self, EngineError> {
        let mut hands = Hands::new();
        for player in &snapshot.players {
            let count = snapshot.cardcounts.get(player).copied().unwrap_or(0);
            let hand = match (&snapshot.cards, player == &viewer) {
                (Some(cards), true) if cards.len() == count => Hand::Known(cards.clone()),
                (Some(cards), true) => {
                    return Err(EngineError::invariant(format!(
                        "snapshot lists {} cards for {} but counts {}",
                        cards.len(),
                        player,
                        count
                    )))
                }
                _ => Hand::Hidden(count),
            };
            hands.insert(player.clone(), hand);
        }
        let trump_count = usize::from(snapshot.trump.is_some());
        let pile = snapshot.deckcount.checked_sub(trump_count).ok_or_else(|| {
            EngineError::invariant("deck count does not cover the trump card")
        })?;
        let state = GameState {
            viewer: Some(viewer),
            players: snapshot.players,
            finished: snapshot.finished,
            current: snapshot.current,
            hands,
            table: Table::from_pairs(snapshot.table),
            deck: Deck::new(pile, snapshot.trump, snapshot.trump_suit),
            allowed_break: snapshot.allowed_break.into_iter().collect(),
            last_actions: BTreeMap::new(),
            discarded: snapshot.discarded,
            deck_size: snapshot.deck_size,
            over: false,
        };
        state.check_invariants()?;
        Ok(state)
    }

    pub fn card_counts(&self) -> BTreeMap<Username, usize> {
        self.players
            .iter()
            .map(|p| (p.clone(), self.count_for(p)))
            .collect()
    }

    // Mutators used by the room while dealing and closing rounds.

    pub fn seat(&mut self, player: Username, cards: Vec<Card>) -> Result<(), EngineError> {
        if self.is_seated(&player) {
            return Err(EngineError::invariant(format!("{} is already seated", player)));
        }
        self.hands.insert(player.clone(), Hand::Known(vec![]));
        self.players.push(player.clone());
        self.hands.add_cards(&player, &cards)
    }

    pub fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }

    pub fn set_current(&mut self, player: Option<Username>) {
        if self.current != player {
            self.allowed_break.clear();
        }
        self.current = player;
    }

    /// Draws one card for `player`; `pile` holds the face-down cards the
    /// room keeps, top of the pile last.
    pub fn draw_for(
        &mut self,
        player: &Username,
        pile: &mut Vec<Card>,
    ) -> Result<Option<Card>, EngineError> {
        let card = match self.deck.draw() {
            None => return Ok(None),
            Some(DrawSource::Pile) => pile
                .pop()
                .ok_or_else(|| EngineError::invariant("pile is shorter than its count"))?,
            Some(DrawSource::Trump(card)) => card,
        };
        self.hands.add_cards(player, &[card])?;
        Ok(Some(card))
    }

    /// Discards what is left on the table and everything that only lives for
    /// one round.
    pub fn clear_round(&mut self) {
        self.discard_table();
        self.allowed_break.clear();
        self.last_actions.clear();
    }

    /// Moves players without cards out of the seating order.
    pub fn retire_empty_hands(&mut self) -> Vec<Username> {
        let (out, staying): (Vec<_>, Vec<_>) = self
            .players
            .drain(..)
            .partition(|p| self.hands.count_for(p) == 0);
        self.players = staying;
        for player in &out {
            self.hands.remove(player);
        }
        self.finished.extend(out.iter().cloned());
        out
    }

    pub fn finish_game(&mut self) {
        self.over = true;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use crate::{
        card::Card,
        deck::Deck,
        error::EngineError,
        game_state::{GameState, Snapshot},
        pair::Pair,
        user_name::Username,
    };

    pub fn name(s: &str) -> Username {
        Username::from(s)
    }

    pub fn c(id: &str) -> Card {
        id.parse().unwrap()
    }

    /// Snapshot for a game with the given hands, table and trump. The rest of
    /// the deck is assumed to be face down in the pile.
    pub fn snapshot(
        hands: &[(&str, Vec<Card>)],
        table: Vec<Pair>,
        trump: Card,
        current: &str,
    ) -> Snapshot {
        let in_hands: usize = hands.iter().map(|(_, cards)| cards.len()).sum();
        let on_table: usize = table.iter().map(|p| p.cards().count()).sum();
        Snapshot {
            players: hands.iter().map(|(p, _)| name(p)).collect(),
            finished: vec![],
            current: Some(name(current)),
            cardcounts: hands
                .iter()
                .map(|(p, cards)| (name(p), cards.len()))
                .collect::<BTreeMap<_, _>>(),
            cards: None,
            table,
            deckcount: 52 - in_hands - on_table,
            discarded: 0,
            trump: Some(trump),
            trump_suit: Some(trump.suit),
            deck_size: 52,
            allowed_break: vec![],
        }
    }

    /// Replica of `viewer`, who sees their own hand.
    pub fn replica_state(
        hands: &[(&str, Vec<Card>)],
        table: Vec<Pair>,
        trump: Card,
        current: &str,
        viewer: &str,
    ) -> GameState {
        let mut snap = snapshot(hands, table, trump, current);
        snap.cards = hands
            .iter()
            .find(|(p, _)| *p == viewer)
            .map(|(_, cards)| cards.clone());
        GameState::from_snapshot(snap, name(viewer)).unwrap()
    }

    #[test]
    fn from_snapshot_should_hide_other_hands() {
        let state = replica_state(
            &[("alice", vec![c("7H"), c("8H")]), ("bob", vec![c("9C")])],
            vec![],
            c("6S"),
            "alice",
            "alice",
        );
        assert_eq!(state.cards_for(&name("alice"), &name("alice")), Some(&[c("7H"), c("8H")][..]));
        assert_eq!(state.cards_for(&name("bob"), &name("alice")), None);
        assert_eq!(state.count_for(&name("bob")), 1);
        assert_eq!(state.card_total(), 52);
    }

    #[test]
    fn from_snapshot_should_reject_count_mismatch() {
        let mut snap = snapshot(&[("alice", vec![c("7H")])], vec![], c("6S"), "alice");
        snap.deckcount += 1;
        let result = GameState::from_snapshot(snap, name("alice"));
        assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
    }

    #[test]
    fn check_invariants_should_detect_double_ownership() {
        let state = replica_state(
            &[("alice", vec![c("7H")]), ("bob", vec![c("9C")])],
            vec![Pair::new(c("8D"))],
            c("6S"),
            "alice",
            "alice",
        );
        let mut broken = state.clone();
        broken.table.throw_pair(c("7H"));
        broken.deck_size += 1;
        assert!(matches!(
            broken.check_invariants(),
            Err(EngineError::InvariantViolation(_))
        ));
        assert_eq!(state.check_invariants(), Ok(()));
    }

    #[test]
    fn snapshot_for_should_round_trip_through_replica() {
        let mut room = GameState::new(52);
        room.seat(name("alice"), vec![c("7H")]).unwrap();
        room.seat(name("bob"), vec![c("9C"), c("10C")]).unwrap();
        room.set_deck(Deck::new(48, Some(c("6S")), None));
        room.set_current(Some(name("bob")));

        let snap = room.snapshot_for(Some(&name("bob")));
        let replica = GameState::from_snapshot(snap, name("bob")).unwrap();

        assert_eq!(replica.cards_for(&name("bob"), &name("bob")), Some(&[c("9C"), c("10C")][..]));
        assert_eq!(replica.count_for(&name("alice")), 1);
        assert_eq!(replica.deck().count(), 48);
        assert_eq!(replica.deck().trump(), Some(c("6S")));
        assert_eq!(replica.card_total(), 52);
    }

    #[test]
    fn next_and_prev_player_should_wrap_around() {
        let mut room = GameState::new(52);
        for p in ["a", "b", "c"] {
            room.seat(name(p), vec![]).unwrap();
        }
        assert_eq!(room.next_player(&name("c")), Some(&name("a")));
        assert_eq!(room.prev_player(&name("a")), Some(&name("c")));
        assert_eq!(room.next_player(&name("x")), None);
    }

    #[test]
    fn draw_for_should_take_pile_then_trump() {
        let mut room = GameState::new(3);
        room.seat(name("a"), vec![]).unwrap();
        room.set_deck(Deck::new(1, Some(c("6S")), None));
        let mut pile = vec![c("2H")];

        assert_eq!(room.draw_for(&name("a"), &mut pile), Ok(Some(c("2H"))));
        assert_eq!(room.draw_for(&name("a"), &mut pile), Ok(Some(c("6S"))));
        assert_eq!(room.draw_for(&name("a"), &mut pile), Ok(None));
        assert_eq!(room.count_for(&name("a")), 2);
    }
}
