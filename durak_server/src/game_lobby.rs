use std::{collections::BTreeMap, time::Instant};

use durak_core::{
    config::EngineConfig,
    deck::Deck,
    error::EngineError,
    event::{Event, EventEntry, Intent},
    game_state::GameState,
    user_name::Username,
};
use log::{info, warn};

use crate::draw_pile::DrawPile;

/// The room: its members, and the authoritative game once one is started.
pub struct GameLobby {
    pub(crate) config: EngineConfig,
    pub(crate) members: Vec<Username>,
    pub(crate) state: Option<GameState>,
    pub(crate) pile: DrawPile,
    /// When each player last cheated, as long as that is their latest move.
    pub(crate) cheats: BTreeMap<Username, Instant>,
}

impl GameLobby {
    pub fn new(config: EngineConfig) -> Self {
        GameLobby {
            config,
            members: vec![],
            state: None,
            pile: DrawPile::default(),
            cheats: BTreeMap::new(),
        }
    }

    pub fn members(&self) -> &[Username] {
        &self.members
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    /// Runs one intent and returns what each member gets to see of it. A
    /// refused intent only produces a private `rejectmove` for its sender.
    pub fn handle(&mut self, player: &Username, intent: Intent, now: Instant) -> Vec<EventEntry> {
        match self.dispatch(player, &intent, now) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{} tried {:?}: {}", player, intent, e);
                vec![EventEntry::private(
                    player.clone(),
                    Event::RejectMove {
                        player: player.clone(),
                        reason: e.to_string(),
                        intent,
                    },
                )]
            }
        }
    }

    fn dispatch(
        &mut self,
        player: &Username,
        intent: &Intent,
        now: Instant,
    ) -> Result<Vec<EventEntry>, EngineError> {
        match intent {
            Intent::Join {} => Ok(self.join(player)),
            Intent::Leave {} => Ok(self.leave(player)),
            Intent::StartGame {} => {
                if self.state.as_ref().map_or(false, |s| !s.is_over()) {
                    return Err(EngineError::illegal("a game is already running"));
                }
                self.start(DrawPile::shuffled(self.config.lowest_rank))
            }
            _ => self.play(player, intent, now),
        }
    }

    fn join(&mut self, player: &Username) -> Vec<EventEntry> {
        if !self.members.contains(player) {
            info!("{} joined", player);
            self.members.push(player.clone());
        }
        let mut entries = vec![EventEntry::public(Event::Joined {
            username: player.clone(),
        })];
        if let Some(state) = &self.state {
            entries.push(EventEntry::private(
                player.clone(),
                Event::GameState {
                    snapshot: state.snapshot_for(Some(player)),
                },
            ));
        }
        entries
    }

    fn leave(&mut self, player: &Username) -> Vec<EventEntry> {
        info!("{} left", player);
        self.members.retain(|m| m != player);
        vec![EventEntry::public(Event::Left {
            username: player.clone(),
        })]
    }

    /// Deals a new game from `pile`.
    pub(crate) fn start(&mut self, mut pile: DrawPile) -> Result<Vec<EventEntry>, EngineError> {
        if self.members.len() < self.config.min_players {
            return Err(EngineError::illegal(format!(
                "{} players needed to start",
                self.config.min_players
            )));
        }
        let deck_size = pile.len();
        if self.members.len() * self.config.cards_per_player >= deck_size {
            return Err(EngineError::illegal("not enough cards for this many players"));
        }
        let mut state = GameState::new(deck_size);
        for member in &self.members {
            state.seat(member.clone(), pile.deal(self.config.cards_per_player))?;
        }
        let trump = pile.turn_up_trump();
        state.set_deck(Deck::new(pile.len(), trump, None));
        state.set_current(lowest_trump_holder(&state).or_else(|| self.members.first().cloned()));
        state.check_invariants()?;
        info!(
            "game starts with {} players, trump {:?}",
            self.members.len(),
            trump
        );

        let mut entries = vec![EventEntry::public(Event::StartGame {})];
        entries.extend(self.snapshots(&state));
        self.state = Some(state);
        self.pile = pile;
        self.cheats.clear();
        Ok(entries)
    }

    /// A private snapshot for every member.
    pub(crate) fn snapshots(&self, state: &GameState) -> Vec<EventEntry> {
        self.members
            .iter()
            .map(|m| {
                EventEntry::private(
                    m.clone(),
                    Event::GameState {
                        snapshot: state.snapshot_for(Some(m)),
                    },
                )
            })
            .collect()
    }
}

fn lowest_trump_holder(state: &GameState) -> Option<Username> {
    let trump_suit = state.deck().trump_suit()?;
    state
        .players()
        .iter()
        .filter_map(|p| {
            let lowest = state
                .cards_for(p, p)?
                .iter()
                .filter(|c| c.suit == trump_suit)
                .map(|c| c.rank)
                .min()?;
            Some((lowest, p))
        })
        .min()
        .map(|(_, p)| p.clone())
}
