use std::time::Instant;

use durak_core::{
    card::Card,
    cheat::RecordedAction,
    error::EngineError,
    event::{Event, EventEntry, Intent},
    game_state::GameState,
    play::PlayerAction,
    user_name::Username,
};
use itertools::Itertools;
use log::{debug, info, warn};

use crate::game_lobby::GameLobby;

impl GameLobby {
    pub(crate) fn play(
        &mut self,
        actor: &Username,
        intent: &Intent,
        now: Instant,
    ) -> Result<Vec<EventEntry>, EngineError> {
        let state = self
            .state
            .as_ref()
            .filter(|s| !s.is_over())
            .ok_or_else(|| EngineError::illegal("no game in progress"))?;
        let current = state
            .current()
            .cloned()
            .ok_or_else(|| EngineError::invariant("no current player"))?;
        let is_current = *actor == current;
        let only_current = |what: &str| {
            if is_current {
                Ok(())
            } else {
                Err(EngineError::illegal(format!("only {} may {}", current, what)))
            }
        };

        match intent {
            Intent::ThrowCards { cards } => {
                state.check_move(actor, &PlayerAction::Throw { cards: cards.clone() })?;
                if state.table().uncovered_count() + cards.len() > state.count_for(&current) {
                    return Err(EngineError::illegal(format!(
                        "{} cannot break that many cards",
                        current
                    )));
                }
                let cheat = !is_legal_throw(state, actor, &current, cards);
                let event = Event::ThrowCards {
                    player: actor.clone(),
                    cards: cards.clone(),
                };
                self.commit(actor, event, cheat, now)
            }
            Intent::BreakCard {
                bottomcard,
                topcard,
            } => {
                only_current("break cards")?;
                state.check_move(
                    actor,
                    &PlayerAction::Break {
                        selected: vec![*topcard],
                        bottom: *bottomcard,
                    },
                )?;
                let event = Event::BreakCard {
                    player: actor.clone(),
                    bottomcard: *bottomcard,
                    topcard: *topcard,
                };
                self.commit(actor, event, false, now)
            }
            Intent::MoveTopCard {
                topcard,
                new_bottomcard,
            } => {
                state.check_move(
                    actor,
                    &PlayerAction::MoveTopCard {
                        top: Some(*topcard),
                        new_bottom: *new_bottomcard,
                    },
                )?;
                let event = Event::MoveTopCard {
                    player: Some(actor.clone()),
                    topcard: *topcard,
                    new_bottomcard: *new_bottomcard,
                };
                self.commit(actor, event, false, now)
            }
            Intent::TakeCards {} => {
                only_current("take the cards")?;
                state.check_move(actor, &PlayerAction::Take)?;
                let event = Event::TakeCards {
                    player: Some(actor.clone()),
                };
                let mut entries = self.commit(actor, event, false, now)?;
                entries.extend(self.finish_round()?);
                Ok(entries)
            }
            Intent::BreakCards {} => {
                state.check_move(actor, &PlayerAction::BreakOut)?;
                if !state.table().all_broken() {
                    return Err(EngineError::illegal("not every card on the table is covered"));
                }
                if self.config.require_allow_break {
                    let waiting = state
                        .players()
                        .iter()
                        .filter(|p| **p != current && !state.allowed_break().contains(*p))
                        .join(", ");
                    if !waiting.is_empty() {
                        return Err(EngineError::illegal(format!(
                            "waiting for {} to allow the break",
                            waiting
                        )));
                    }
                }
                let trump_suit = state.deck().trump_suit();
                for pair in state.table().pairs() {
                    if let Some(top) = pair.top() {
                        if !top.beats(&pair.bottom(), trump_suit) {
                            warn!("{} broke {} with {}", actor, pair.bottom(), top);
                        }
                    }
                }
                let event = Event::BreakCards {
                    username: actor.clone(),
                };
                let mut entries = self.commit(actor, event, false, now)?;
                entries.extend(self.finish_round()?);
                Ok(entries)
            }
            Intent::PassCards { cards } => {
                only_current("pass")?;
                state.check_move(actor, &PlayerAction::PassWithCards { cards: cards.clone() })?;
                let newplayer = pass_target(state, actor, cards.len())?;
                let cheat = !is_legal_pass(state, cards);
                let event = Event::PassCards {
                    player: actor.clone(),
                    newplayer,
                    cards: cards.clone(),
                };
                self.commit(actor, event, cheat, now)
            }
            Intent::PassTrump {} => {
                only_current("pass")?;
                let newplayer = pass_target(state, actor, 0)?;
                let cheat = !is_legal_pass_with_trump(state, actor);
                let event = Event::PassTrump { newplayer };
                self.commit(actor, event, cheat, now)
            }
            Intent::AllowBreak {} => {
                state.check_move(actor, &PlayerAction::AllowBreak)?;
                let event = Event::AllowBreak {
                    player: actor.clone(),
                };
                self.commit(actor, event, false, now)
            }
            Intent::StealTrump { card } => {
                state.check_move(
                    actor,
                    &PlayerAction::StealTrump {
                        selected: vec![*card],
                    },
                )?;
                let event = Event::StealTrump {
                    player: actor.clone(),
                    card: *card,
                };
                self.commit(actor, event, true, now)
            }
            Intent::PutIntoDeck { cards } => {
                state.check_move(actor, &PlayerAction::PutIntoDeck { cards: cards.clone() })?;
                let event = Event::PutIntoDeck {
                    player: actor.clone(),
                    cards: cards.clone(),
                };
                let entries = self.commit(actor, event, true, now)?;
                self.pile.put_back(cards);
                Ok(entries)
            }
            Intent::CallCheat { cheater } => self.call_cheat(actor, cheater, now),
            Intent::Join {} | Intent::Leave {} | Intent::StartGame {} => {
                Err(EngineError::illegal("not a game move"))
            }
        }
    }

    /// Applies a validated event to the game and keeps the cheat journal.
    fn commit(
        &mut self,
        actor: &Username,
        event: Event,
        cheat: bool,
        now: Instant,
    ) -> Result<Vec<EventEntry>, EngineError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| EngineError::illegal("no game in progress"))?;
        let next = state.apply(&event)?;
        if cheat {
            warn!("{} cheated: {:?}", actor, event);
            self.cheats.insert(actor.clone(), now);
        } else {
            self.cheats.remove(actor);
        }
        self.state = Some(next);
        Ok(vec![EventEntry::public(event)])
    }

    fn call_cheat(
        &mut self,
        accuser: &Username,
        cheater: &Username,
        now: Instant,
    ) -> Result<Vec<EventEntry>, EngineError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| EngineError::illegal("no game in progress"))?;
        if !state.is_seated(cheater) {
            return Err(EngineError::illegal(format!("{} is not playing", cheater)));
        }
        let in_window = self
            .cheats
            .get(cheater)
            .map_or(false, |at| now.saturating_duration_since(*at) <= self.config.cheat_revert_window());
        let last = state.last_action(cheater).cloned();
        let mut revert = in_window && last.as_ref().map_or(false, |a| a.kind().is_revertible());
        let call = |revert: bool| Event::CallCheat {
            player: accuser.clone(),
            cheater: cheater.clone(),
            revert,
        };
        // A cheat that was built upon since stays in play.
        let next = match state.apply(&call(revert)) {
            Err(EngineError::UnresolvedRevert { reason, .. }) if revert => {
                warn!("cheat of {} cannot be undone: {}", cheater, reason);
                revert = false;
                state.apply(&call(false))?
            }
            result => result?,
        };
        info!("{} accuses {}: revert = {}", accuser, cheater, revert);
        let event = call(revert);
        if let Some(RecordedAction::PutIntoDeck { cards }) = last.filter(|_| revert) {
            if !self.pile.pull_out(&cards) {
                return Err(EngineError::invariant("put back cards are missing from the pile"));
            }
        }
        self.cheats.remove(cheater);
        let mut entries = vec![EventEntry::public(event)];
        if revert {
            entries.extend(self.snapshots(&next));
        }
        self.state = Some(next);
        Ok(entries)
    }

    /// Refills the hands, retires players without cards once the pile is
    /// gone and hands the turn to the next seat.
    fn finish_round(&mut self) -> Result<Vec<EventEntry>, EngineError> {
        let mut state = self
            .state
            .clone()
            .ok_or_else(|| EngineError::illegal("no game in progress"))?;
        let current = state
            .current()
            .cloned()
            .ok_or_else(|| EngineError::invariant("no current player"))?;
        let seats = state.players().to_vec();
        let start = seats.iter().position(|p| *p == current).unwrap_or(0);
        let around: Vec<Username> = seats.iter().cycle().skip(start).take(seats.len()).cloned().collect();

        state.clear_round();
        for player in &around {
            while state.count_for(player) < self.config.cards_per_player {
                if state.draw_for(player, self.pile.cards_mut())?.is_none() {
                    break;
                }
            }
        }
        if state.deck().visible_count() == 0 {
            for out in state.retire_empty_hands() {
                info!("{} is out", out);
            }
        }
        let newplayer = around
            .iter()
            .skip(1)
            .chain(around.first())
            .find(|p| state.is_seated(p))
            .cloned();
        state.set_current(newplayer.clone());
        state.check_invariants()?;
        debug!("round over, {} cards left in the deck", state.deck().visible_count());

        let mut entries = vec![];
        if let Some(newplayer) = newplayer {
            entries.extend(self.members.iter().map(|m| {
                EventEntry::private(
                    m.clone(),
                    Event::FinishRound {
                        newplayer: newplayer.clone(),
                        deckcount: state.deck().visible_count(),
                        cardcounts: state.card_counts(),
                        cards: state.cards_for(m, m).map(<[Card]>::to_vec),
                    },
                )
            }));
        }
        if state.players().len() <= 1 {
            let loser = state.players().first().cloned();
            info!("game over, loser: {:?}", loser);
            state.finish_game();
            entries.push(EventEntry::public(Event::FinishGame { loser }));
        }
        self.cheats.clear();
        self.state = Some(state);
        Ok(entries)
    }
}

/// The thrower sits next to the current player and every rank is already on
/// the table. An empty table takes any cards.
fn is_legal_throw(state: &GameState, actor: &Username, current: &Username, cards: &[Card]) -> bool {
    let neighbour =
        state.next_player(current) == Some(actor) || state.prev_player(current) == Some(actor);
    let ranks_fit = state.table().is_empty()
        || cards
            .iter()
            .all(|c| state.table().cards().any(|t| t.rank == c.rank));
    neighbour && ranks_fit
}

/// Passed cards and every card on the table share one rank.
fn is_legal_pass(state: &GameState, cards: &[Card]) -> bool {
    cards
        .iter()
        .copied()
        .chain(state.table().cards())
        .map(|c| c.rank)
        .all_equal()
}

/// The table holds one rank only and the passer owns the trump of that rank.
fn is_legal_pass_with_trump(state: &GameState, actor: &Username) -> bool {
    let Some(rank) = state.table().pairs().first().map(|p| p.bottom().rank) else {
        return false;
    };
    let Some(trump_suit) = state.deck().trump_suit() else {
        return false;
    };
    state.table().cards().all(|c| c.rank == rank)
        && state
            .cards_for(actor, actor)
            .map_or(false, |held| held.iter().any(|c| c.rank == rank && c.suit == trump_suit))
}

/// The next seat, if the table can be passed on to it.
fn pass_target(state: &GameState, actor: &Username, passed: usize) -> Result<Username, EngineError> {
    if state.table().is_empty() {
        return Err(EngineError::illegal("there is nothing to pass"));
    }
    if state.table().has_top_cards() {
        return Err(EngineError::illegal("covered cards cannot be passed"));
    }
    let next = state
        .next_player(actor)
        .ok_or_else(|| EngineError::invariant("passer is not seated"))?;
    if state.table().card_count() + passed > state.count_for(next) {
        return Err(EngineError::illegal(format!("{} cannot take that many cards", next)));
    }
    Ok(next.clone())
}
