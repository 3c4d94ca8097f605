use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use log::{debug, info, warn};

use crate::{
    config::EngineConfig,
    error::EngineError,
    event::{Event, Intent},
    game_state::{GameState, Snapshot},
    play::{PlayerAction, Selection},
    user_name::Username,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaStatus {
    Lobby,
    Synced,
    /// The replica drifted or a game is starting; events are dropped until
    /// the next snapshot arrives.
    AwaitingSnapshot,
    Finished,
}

/// What receiving one event did to the replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    Applied,
    /// The event was the echo of one of our own pending actions.
    Confirmed(Intent),
    Rejected { intent: Option<Intent>, reason: String },
    Roster,
    Resynced,
    Ignored,
}

#[derive(Debug, Clone)]
struct PendingAction {
    intent: Intent,
    predicted: Option<Event>,
    submitted_at: Instant,
}

/// One participant's copy of the game: the state built only from
/// authoritative events, plus the local actions still waiting for their echo.
#[derive(Debug, Clone)]
pub struct Replica {
    me: Username,
    roster: Vec<Username>,
    canonical: Option<GameState>,
    pending: VecDeque<PendingAction>,
    selection: Selection,
    status: ReplicaStatus,
    timeout: Duration,
}

impl Replica {
    pub fn new(me: Username, config: &EngineConfig) -> Self {
        Replica {
            me,
            roster: vec![],
            canonical: None,
            pending: VecDeque::new(),
            selection: Selection::default(),
            status: ReplicaStatus::Lobby,
            timeout: config.optimistic_timeout(),
        }
    }

    pub fn me(&self) -> &Username {
        &self.me
    }

    pub fn roster(&self) -> &[Username] {
        &self.roster
    }

    pub fn status(&self) -> ReplicaStatus {
        self.status
    }

    pub fn canonical(&self) -> Option<&GameState> {
        self.canonical.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The canonical state with every pending prediction laid over it.
    /// Predictions that no longer fit are skipped.
    pub fn view(&self) -> Option<GameState> {
        let mut view = self.canonical.clone()?;
        for predicted in self.pending.iter().filter_map(|p| p.predicted.as_ref()) {
            if let Ok(next) = view.apply(predicted) {
                view = next;
            }
        }
        Some(view)
    }

    /// Checks `action` against the optimistic view and, if legal, queues it
    /// as pending. The returned intent is what must be sent to the room.
    pub fn submit(&mut self, action: &PlayerAction, now: Instant) -> Result<Intent, EngineError> {
        if self.status != ReplicaStatus::Synced {
            return Err(EngineError::illegal("no game in progress"));
        }
        let view = self
            .view()
            .ok_or_else(|| EngineError::illegal("no game in progress"))?;
        let intent = view.check_move(&self.me, action)?;
        let predicted = view.predict(&self.me, &intent);
        debug!("{} submits {:?}", self.me, intent);
        self.pending.push_back(PendingAction {
            intent: intent.clone(),
            predicted,
            submitted_at: now,
        });
        self.selection.retract();
        Ok(intent)
    }

    pub fn receive(&mut self, event: &Event) -> Result<Update, EngineError> {
        match event {
            Event::Joined { username } => {
                if !self.roster.contains(username) {
                    self.roster.push(username.clone());
                }
                Ok(Update::Roster)
            }
            Event::Left { username } => {
                self.roster.retain(|p| p != username);
                Ok(Update::Roster)
            }
            Event::StartGame {} => {
                info!("game starts, waiting for the deal");
                self.pending.clear();
                self.status = ReplicaStatus::AwaitingSnapshot;
                Ok(Update::Applied)
            }
            Event::GameState { snapshot } => {
                self.resync(snapshot.clone())?;
                Ok(Update::Resynced)
            }
            Event::RejectMove {
                player,
                reason,
                intent,
            } if *player == self.me => {
                let rejected = self.pending.iter().position(|p| p.intent == *intent);
                let intent = rejected
                    .and_then(|i| self.pending.remove(i))
                    .map(|p| p.intent);
                warn!("move rejected: {}", reason);
                Ok(Update::Rejected {
                    intent,
                    reason: reason.clone(),
                })
            }
            Event::RejectMove { .. } => Ok(Update::Ignored),
            _ => self.apply_authoritative(event),
        }
    }

    fn apply_authoritative(&mut self, event: &Event) -> Result<Update, EngineError> {
        let canonical = match (&self.canonical, self.status) {
            (Some(state), ReplicaStatus::Synced) => state,
            _ => return Ok(Update::Ignored),
        };
        let current = canonical.current().cloned();
        match canonical.apply(event) {
            Ok(next) => {
                if next.is_over() {
                    info!("game over");
                    self.status = ReplicaStatus::Finished;
                }
                self.canonical = Some(next);
                let echoed = self
                    .pending
                    .iter()
                    .position(|p| p.intent.is_echoed_by(event, &self.me, current.as_ref()));
                Ok(match echoed.and_then(|i| self.pending.remove(i)) {
                    Some(p) => Update::Confirmed(p.intent),
                    None => Update::Applied,
                })
            }
            Err(e) => {
                if e.needs_resync() {
                    warn!("replica of {} out of sync: {}", self.me, e);
                    self.pending.clear();
                    self.status = ReplicaStatus::AwaitingSnapshot;
                }
                Err(e)
            }
        }
    }

    /// Replaces everything with the given snapshot.
    pub fn resync(&mut self, snapshot: Snapshot) -> Result<(), EngineError> {
        let state = GameState::from_snapshot(snapshot, self.me.clone())?;
        for player in state.players() {
            if !self.roster.contains(player) {
                self.roster.push(player.clone());
            }
        }
        self.canonical = Some(state);
        self.pending.clear();
        self.status = ReplicaStatus::Synced;
        Ok(())
    }

    /// Drops pending actions the room never answered in time.
    pub fn expire(&mut self, now: Instant) -> Vec<Intent> {
        let timeout = self.timeout;
        let (expired, kept): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| now.saturating_duration_since(p.submitted_at) >= timeout);
        self.pending = kept.into();
        for p in &expired {
            warn!("no answer for {:?}, rolled back", p.intent);
        }
        expired.into_iter().map(|p| p.intent).collect()
    }
}
