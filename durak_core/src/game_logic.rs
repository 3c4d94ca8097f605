use std::collections::BTreeMap;

use log::debug;

use crate::{
    card::Card,
    cheat::{CheatAccusation, RecordedAction},
    error::EngineError,
    event::{Event, Intent},
    game_state::GameState,
    hand::Hand,
    play::PlayerAction,
    user_name::Username,
    utils::SliceExtensions,
};

impl GameState {
    /// Local, advisory legality check. Turns a legal action into the intent
    /// that is sent to the room; nothing in `self` changes.
    pub fn check_move(&self, actor: &Username, action: &PlayerAction) -> Result<Intent, EngineError> {
        if !self.is_seated(actor) {
            return Err(EngineError::illegal(format!("{} is not playing", actor)));
        }
        match action {
            PlayerAction::Throw { cards } => {
                if self.is_current(actor) {
                    return Err(EngineError::illegal("the current player cannot throw"));
                }
                self.ensure_selected(actor, cards)?;
                Ok(Intent::ThrowCards {
                    cards: cards.clone(),
                })
            }
            PlayerAction::Break { selected, bottom } => {
                let top = *selected
                    .single_element()
                    .ok_or_else(|| EngineError::illegal("select exactly one card to break with"))?;
                let pair = self
                    .table
                    .find_bottom(bottom)
                    .ok_or(EngineError::NotFound(*bottom))?;
                if pair.is_broken() {
                    return Err(EngineError::AlreadyBroken(*bottom));
                }
                self.hands.ensure_owned(actor, &[top])?;
                Ok(Intent::BreakCard {
                    bottomcard: *bottom,
                    topcard: top,
                })
            }
            PlayerAction::MoveTopCard { top, new_bottom } => {
                if !self.is_current(actor) {
                    return Err(EngineError::illegal("only the current player moves top cards"));
                }
                let top = top.ok_or_else(|| EngineError::illegal("no top card selected"))?;
                self.table.bottom_of(&top).ok_or(EngineError::NotFound(top))?;
                let target = self
                    .table
                    .find_bottom(new_bottom)
                    .ok_or(EngineError::NotFound(*new_bottom))?;
                if target.is_broken() {
                    return Err(EngineError::AlreadyBroken(*new_bottom));
                }
                Ok(Intent::MoveTopCard {
                    topcard: top,
                    new_bottomcard: *new_bottom,
                })
            }
            PlayerAction::Take => {
                if self.table.is_empty() {
                    return Err(EngineError::NothingToTake);
                }
                Ok(Intent::TakeCards {})
            }
            PlayerAction::BreakOut => {
                if !self.is_current(actor) {
                    return Err(EngineError::illegal("only the current player breaks out"));
                }
                if self.table.is_empty() {
                    return Err(EngineError::illegal("there is nothing to break out of"));
                }
                Ok(Intent::BreakCards {})
            }
            PlayerAction::PassWithCards { cards } => {
                self.ensure_selected(actor, cards)?;
                Ok(Intent::PassCards {
                    cards: cards.clone(),
                })
            }
            PlayerAction::PassWithTrump => Ok(Intent::PassTrump {}),
            PlayerAction::StealTrump { selected } => {
                let card = *selected
                    .single_element()
                    .ok_or_else(|| EngineError::illegal("select exactly one card to swap"))?;
                if self.deck.trump().is_none() {
                    return Err(EngineError::illegal("there is no trump card to steal"));
                }
                self.hands.ensure_owned(actor, &[card])?;
                Ok(Intent::StealTrump { card })
            }
            PlayerAction::PutIntoDeck { cards } => {
                self.ensure_selected(actor, cards)?;
                Ok(Intent::PutIntoDeck {
                    cards: cards.clone(),
                })
            }
            PlayerAction::AllowBreak => {
                if self.is_current(actor) {
                    return Err(EngineError::illegal("the current player cannot allow a break"));
                }
                Ok(Intent::AllowBreak {})
            }
            PlayerAction::CallCheat { cheater } => Ok(Intent::CallCheat {
                cheater: cheater.clone(),
            }),
        }
    }

    fn ensure_selected(&self, actor: &Username, cards: &[Card]) -> Result<(), EngineError> {
        if cards.is_empty() {
            return Err(EngineError::illegal("no cards selected"));
        }
        if let Some(card) = cards.first_duplicate() {
            return Err(EngineError::illegal(format!("{} selected twice", card)));
        }
        self.hands.ensure_owned(actor, cards)
    }

    /// The event the room is expected to broadcast for `intent` sent by `me`.
    /// Intents whose outcome only the room can know have no prediction.
    pub fn predict(&self, me: &Username, intent: &Intent) -> Option<Event> {
        let player = me.clone();
        match intent {
            Intent::ThrowCards { cards } => Some(Event::ThrowCards {
                player,
                cards: cards.clone(),
            }),
            Intent::BreakCard {
                bottomcard,
                topcard,
            } => Some(Event::BreakCard {
                player,
                bottomcard: *bottomcard,
                topcard: *topcard,
            }),
            Intent::MoveTopCard {
                topcard,
                new_bottomcard,
            } => Some(Event::MoveTopCard {
                player: Some(player),
                topcard: *topcard,
                new_bottomcard: *new_bottomcard,
            }),
            Intent::TakeCards {} => Some(Event::TakeCards {
                player: Some(player),
            }),
            Intent::PassCards { cards } => Some(Event::PassCards {
                newplayer: self.next_player(me)?.clone(),
                player,
                cards: cards.clone(),
            }),
            Intent::PassTrump {} => Some(Event::PassTrump {
                newplayer: self.next_player(me)?.clone(),
            }),
            Intent::AllowBreak {} => Some(Event::AllowBreak { player }),
            Intent::StealTrump { card } => Some(Event::StealTrump {
                player,
                card: *card,
            }),
            Intent::PutIntoDeck { cards } => Some(Event::PutIntoDeck {
                player,
                cards: cards.clone(),
            }),
            Intent::Join {}
            | Intent::Leave {}
            | Intent::StartGame {}
            | Intent::BreakCards {}
            | Intent::CallCheat { .. } => None,
        }
    }

    /// Applies one authoritative event and returns the next state. On error
    /// `self` is still the valid prior state.
    ///
    /// Authoritative events are trusted, so every refusal here means the
    /// replica has drifted and is reported as an `InvariantViolation`;
    /// only an unresolvable cheat revert keeps its own kind.
    pub fn apply(&self, event: &Event) -> Result<GameState, EngineError> {
        if let Event::GameState { snapshot } = event {
            let viewer = self
                .viewer
                .clone()
                .ok_or_else(|| EngineError::invariant("the room does not load snapshots"))?;
            return GameState::from_snapshot(snapshot.clone(), viewer);
        }
        let mut next = self.clone();
        next.transition(event).map_err(|e| match e {
            EngineError::InvariantViolation(_) | EngineError::UnresolvedRevert { .. } => e,
            other => EngineError::invariant(other.to_string()),
        })?;
        next.check_invariants()?;
        debug!("applied {:?}", event);
        Ok(next)
    }

    fn actor_or_current(&self, player: &Option<Username>) -> Result<Username, EngineError> {
        player
            .clone()
            .or_else(|| self.current.clone())
            .ok_or_else(|| EngineError::invariant("no current player"))
    }

    fn transition(&mut self, event: &Event) -> Result<(), EngineError> {
        match event {
            Event::Joined { .. }
            | Event::Left { .. }
            | Event::StartGame {}
            | Event::GameState { .. }
            | Event::RejectMove { .. } => {}
            Event::ThrowCards { player, cards } => {
                self.move_to_table(player, cards)?;
                self.record(player, RecordedAction::Throw { cards: cards.clone() });
            }
            Event::BreakCard {
                player,
                bottomcard,
                topcard,
            } => {
                self.hands.remove_cards(player, &[*topcard])?;
                self.table.break_top(*bottomcard, *topcard)?;
                self.record(
                    player,
                    RecordedAction::Break {
                        bottom: *bottomcard,
                        top: *topcard,
                    },
                );
            }
            Event::MoveTopCard {
                player,
                topcard,
                new_bottomcard,
            } => {
                let actor = self.actor_or_current(player)?;
                let from = self
                    .table
                    .bottom_of(topcard)
                    .ok_or(EngineError::NotFound(*topcard))?;
                self.table.relocate_top_card(*topcard, *new_bottomcard)?;
                self.record(&actor, RecordedAction::MoveTopCard { top: *topcard, from });
            }
            Event::TakeCards { player } => {
                let taker = self.actor_or_current(player)?;
                let cards = self.table.take_all()?;
                match self.hands.get(&taker) {
                    Some(Hand::Known(_)) => self.hands.add_cards(&taker, &cards)?,
                    _ => self.hands.add_hidden(&taker, cards.len())?,
                }
                self.set_current(Some(taker.clone()));
                self.record(&taker, RecordedAction::Take);
            }
            Event::BreakCards { username } => {
                if !self.table.all_broken() {
                    return Err(EngineError::invariant("break out with uncovered cards"));
                }
                self.discard_table();
                self.record(username, RecordedAction::BreakOut);
            }
            Event::PassCards {
                player,
                newplayer,
                cards,
            } => {
                if self.table.has_top_cards() {
                    return Err(EngineError::illegal("cannot pass over covered cards"));
                }
                let previous = self.current.clone();
                self.move_to_table(player, cards)?;
                self.set_current(Some(newplayer.clone()));
                self.record(
                    player,
                    RecordedAction::PassCards {
                        cards: cards.clone(),
                        previous,
                    },
                );
            }
            Event::PassTrump { newplayer } => {
                if let Some(previous) = self.current.clone() {
                    self.record(&previous, RecordedAction::PassTrump);
                }
                self.set_current(Some(newplayer.clone()));
            }
            Event::AllowBreak { player } => {
                self.allowed_break.insert(player.clone());
                self.record(player, RecordedAction::AllowBreak);
            }
            Event::StealTrump { player, card } => {
                let old_trump = self.deck.steal_trump(&mut self.hands, player, *card)?;
                self.record(
                    player,
                    RecordedAction::StealTrump {
                        old_trump,
                        replacement: *card,
                    },
                );
            }
            Event::PutIntoDeck { player, cards } => {
                self.deck.put_into_deck(&mut self.hands, player, cards)?;
                self.record(player, RecordedAction::PutIntoDeck { cards: cards.clone() });
            }
            Event::CallCheat {
                player,
                cheater,
                revert,
            } => self.resolve_accusation(&CheatAccusation {
                accuser: player.clone(),
                accused: cheater.clone(),
                revert: *revert,
            })?,
            Event::FinishRound {
                newplayer,
                deckcount,
                cardcounts,
                cards,
            } => self.finish_round(newplayer, *deckcount, cardcounts, cards.as_deref())?,
            Event::FinishGame { .. } => {
                self.clear_round();
                self.over = true;
            }
        }
        Ok(())
    }

    fn move_to_table(&mut self, player: &Username, cards: &[Card]) -> Result<(), EngineError> {
        if cards.is_empty() {
            return Err(EngineError::illegal("no cards"));
        }
        self.hands.ensure_owned(player, cards)?;
        self.hands.remove_cards(player, cards)?;
        for card in cards {
            self.table.throw_pair(*card);
        }
        Ok(())
    }

    pub(crate) fn discard_table(&mut self) {
        self.discarded += self.table.card_count();
        self.table.clear();
    }

    /// Loads the round-end snapshot: refreshed counts for everyone, the
    /// viewer's own cards, and the new current player. Players without a
    /// count, or with none left, are out.
    fn finish_round(
        &mut self,
        newplayer: &Username,
        deckcount: usize,
        cardcounts: &BTreeMap<Username, usize>,
        cards: Option<&[Card]>,
    ) -> Result<(), EngineError> {
        self.clear_round();
        self.deck.set_visible_count(deckcount);
        for player in self.players.clone() {
            let count = cardcounts.get(&player).copied().unwrap_or(0);
            let own = self.viewer.as_ref() == Some(&player);
            let hand = match (self.hands.get(&player), own.then_some(cards).flatten()) {
                (_, Some(fresh)) if fresh.len() == count => Hand::Known(fresh.to_vec()),
                (_, Some(fresh)) => {
                    return Err(EngineError::invariant(format!(
                        "{} cards dealt to {} but counted {}",
                        fresh.len(),
                        player,
                        count
                    )))
                }
                (Some(Hand::Known(held)), None) if held.len() == count => Hand::Known(held.clone()),
                (Some(Hand::Known(_)), None) => {
                    return Err(EngineError::invariant(format!(
                        "new cards of {} are missing",
                        player
                    )))
                }
                _ => Hand::Hidden(count),
            };
            self.hands.insert(player, hand);
        }
        self.retire_empty_hands();
        self.set_current(Some(newplayer.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::{
        error::EngineError,
        event::{Event, Intent},
        game_state::tests::{c, name, replica_state},
        pair::Pair,
        play::PlayerAction,
    };

    #[test]
    fn throw_should_move_cards_to_table() {
        let state = replica_state(
            &[("alice", vec![c("7H"), c("8H")]), ("bob", vec![c("9C")])],
            vec![],
            c("6S"),
            "bob",
            "alice",
        );

        let next = state
            .apply(&Event::ThrowCards {
                player: name("alice"),
                cards: vec![c("7H")],
            })
            .unwrap();

        assert_eq!(next.table().pairs(), &[Pair::new(c("7H"))]);
        assert_eq!(
            next.cards_for(&name("alice"), &name("alice")),
            Some(&[c("8H")][..])
        );
    }

    #[test]
    fn break_should_cover_bottom_once() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![c("9H"), c("10H")])],
            vec![Pair::new(c("7H"))],
            c("6S"),
            "bob",
            "bob",
        );

        let next = state
            .apply(&Event::BreakCard {
                player: name("bob"),
                bottomcard: c("7H"),
                topcard: c("9H"),
            })
            .unwrap();

        assert_eq!(next.table().pairs(), &[Pair::covered(c("7H"), c("9H"))]);
        assert_eq!(
            next.cards_for(&name("bob"), &name("bob")),
            Some(&[c("10H")][..])
        );
        assert_eq!(
            next.check_move(
                &name("bob"),
                &PlayerAction::Break {
                    selected: vec![c("10H")],
                    bottom: c("7H")
                }
            ),
            Err(EngineError::AlreadyBroken(c("7H")))
        );
        assert!(matches!(
            next.apply(&Event::BreakCard {
                player: name("bob"),
                bottomcard: c("7H"),
                topcard: c("10H"),
            }),
            Err(EngineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn steal_trump_should_swap_with_hand_card() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![c("9C")])],
            vec![],
            c("6S"),
            "bob",
            "alice",
        );

        let next = state
            .apply(&Event::StealTrump {
                player: name("alice"),
                card: c("2H"),
            })
            .unwrap();

        assert_eq!(next.deck().trump(), Some(c("2H")));
        assert_eq!(
            next.cards_for(&name("alice"), &name("alice")),
            Some(&[c("6S")][..])
        );
    }

    #[test]
    fn take_should_move_table_in_pair_order_and_make_taker_current() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![]), ("carol", vec![c("3C")])],
            vec![
                Pair::covered(c("7H"), c("9H")),
                Pair::new(c("7D")),
                Pair::covered(c("8S"), c("10S")),
            ],
            c("6S"),
            "bob",
            "carol",
        );

        let next = state
            .apply(&Event::TakeCards {
                player: Some(name("carol")),
            })
            .unwrap();

        assert!(next.table().is_empty());
        assert!(next.is_current(&name("carol")));
        assert_eq!(
            next.cards_for(&name("carol"), &name("carol")),
            Some(&[c("3C"), c("7H"), c("9H"), c("7D"), c("8S"), c("10S")][..])
        );
    }

    #[test]
    fn take_without_player_should_go_to_current() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![c("3C")])],
            vec![Pair::new(c("7D"))],
            c("6S"),
            "bob",
            "alice",
        );

        let next = state.apply(&Event::TakeCards { player: None }).unwrap();

        assert_eq!(next.count_for(&name("bob")), 2);
        assert!(next.is_current(&name("bob")));
    }

    #[test]
    fn pass_should_make_newplayer_current_regardless_of_previous() {
        let state = replica_state(
            &[
                ("alice", vec![c("7C")]),
                ("bob", vec![c("2H")]),
                ("carol", vec![c("9C"), c("10C")]),
            ],
            vec![Pair::new(c("7D"))],
            c("6S"),
            "bob",
            "alice",
        );

        let passed = state
            .apply(&Event::PassCards {
                player: name("alice"),
                newplayer: name("carol"),
                cards: vec![c("7C")],
            })
            .unwrap();
        assert!(passed.is_current(&name("carol")));

        let trumped = passed
            .apply(&Event::PassTrump {
                newplayer: name("alice"),
            })
            .unwrap();
        assert!(trumped.is_current(&name("alice")));
    }

    #[test]
    fn allow_break_should_reset_when_current_changes() {
        let state = replica_state(
            &[("alice", vec![c("7C")]), ("bob", vec![c("2H")])],
            vec![Pair::new(c("7D"))],
            c("6S"),
            "bob",
            "alice",
        );

        let allowed = state
            .apply(&Event::AllowBreak {
                player: name("alice"),
            })
            .unwrap();
        assert!(allowed.allowed_break().contains(&name("alice")));

        let passed = allowed
            .apply(&Event::PassTrump {
                newplayer: name("alice"),
            })
            .unwrap();
        assert!(passed.allowed_break().is_empty());
    }

    #[test]
    fn move_top_card_should_relocate_only_onto_free_pair() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![c("3C")])],
            vec![Pair::covered(c("7D"), c("9D")), Pair::new(c("8D"))],
            c("6S"),
            "bob",
            "bob",
        );

        let next = state
            .apply(&Event::MoveTopCard {
                player: None,
                topcard: c("9D"),
                new_bottomcard: c("8D"),
            })
            .unwrap();

        assert_eq!(
            next.table().pairs(),
            &[Pair::new(c("7D")), Pair::covered(c("8D"), c("9D"))]
        );
        assert_eq!(
            state.check_move(
                &name("bob"),
                &PlayerAction::MoveTopCard {
                    top: Some(c("9D")),
                    new_bottom: c("7D")
                }
            ),
            Err(EngineError::AlreadyBroken(c("7D")))
        );
    }

    #[test]
    fn break_out_should_discard_covered_table() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![c("3C")])],
            vec![Pair::covered(c("7D"), c("9D"))],
            c("6S"),
            "bob",
            "alice",
        );

        let next = state
            .apply(&Event::BreakCards {
                username: name("bob"),
            })
            .unwrap();

        assert!(next.table().is_empty());
        assert_eq!(next.discarded(), 2);
        assert_eq!(next.card_total(), 52);
    }

    #[test]
    fn finish_round_should_refresh_counts_and_retire_missing_players() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![]), ("carol", vec![c("4C")])],
            vec![Pair::covered(c("7D"), c("9D"))],
            c("6S"),
            "bob",
            "alice",
        );
        let state = state
            .apply(&Event::BreakCards {
                username: name("bob"),
            })
            .unwrap();
        let deckcount = state.deck().visible_count();

        let next = state
            .apply(&Event::FinishRound {
                newplayer: name("carol"),
                deckcount: deckcount - 6,
                cardcounts: BTreeMap::from([(name("alice"), 2), (name("carol"), 6)]),
                cards: Some(vec![c("2H"), c("5H")]),
            })
            .unwrap();

        assert_eq!(next.players(), &[name("alice"), name("carol")]);
        assert_eq!(next.finished(), &[name("bob")]);
        assert!(next.is_current(&name("carol")));
        assert_eq!(next.count_for(&name("carol")), 6);
        assert_eq!(
            next.cards_for(&name("alice"), &name("alice")),
            Some(&[c("2H"), c("5H")][..])
        );
        assert_eq!(next.card_total(), 52);
    }

    #[test]
    fn check_move_should_reject_illegal_actions() {
        let state = replica_state(
            &[("alice", vec![c("2H"), c("3H")]), ("bob", vec![c("3C")])],
            vec![],
            c("6S"),
            "alice",
            "alice",
        );
        let alice = name("alice");

        assert!(matches!(
            state.check_move(&alice, &PlayerAction::Throw { cards: vec![c("2H")] }),
            Err(EngineError::IllegalMove(_))
        ));
        assert_eq!(
            state.check_move(&alice, &PlayerAction::Take),
            Err(EngineError::NothingToTake)
        );
        assert!(matches!(
            state.check_move(&alice, &PlayerAction::StealTrump { selected: vec![c("2H"), c("3H")] }),
            Err(EngineError::IllegalMove(_))
        ));
        assert!(matches!(
            state.check_move(&alice, &PlayerAction::PutIntoDeck { cards: vec![c("9S")] }),
            Err(EngineError::NotOwned { .. })
        ));
        assert!(matches!(
            state.check_move(&alice, &PlayerAction::AllowBreak),
            Err(EngineError::IllegalMove(_))
        ));
        assert!(matches!(
            state.check_move(&alice, &PlayerAction::PassWithCards { cards: vec![] }),
            Err(EngineError::IllegalMove(_))
        ));
        assert!(matches!(
            state.check_move(
                &alice,
                &PlayerAction::Break {
                    selected: vec![c("2H")],
                    bottom: c("7D")
                }
            ),
            Err(EngineError::NotFound(_))
        ));
        for selected in [vec![], vec![c("2H"), c("3H")]] {
            assert!(matches!(
                state.check_move(
                    &alice,
                    &PlayerAction::Break {
                        selected,
                        bottom: c("7D")
                    }
                ),
                Err(EngineError::IllegalMove(_))
            ));
        }
        assert!(matches!(
            state.check_move(&alice, &PlayerAction::MoveTopCard { top: None, new_bottom: c("7D") }),
            Err(EngineError::IllegalMove(_))
        ));
        assert!(matches!(
            state.check_move(
                &name("bob"),
                &PlayerAction::MoveTopCard {
                    top: Some(c("3C")),
                    new_bottom: c("7D")
                }
            ),
            Err(EngineError::IllegalMove(_))
        ));
    }

    #[test]
    fn check_move_should_build_intents_for_legal_actions() {
        let state = replica_state(
            &[("alice", vec![c("2H"), c("3H")]), ("bob", vec![c("3C")])],
            vec![Pair::new(c("7D"))],
            c("6S"),
            "bob",
            "alice",
        );
        let alice = name("alice");

        assert_eq!(
            state.check_move(&alice, &PlayerAction::Throw { cards: vec![c("3H")] }),
            Ok(Intent::ThrowCards { cards: vec![c("3H")] })
        );
        assert_eq!(
            state.check_move(&alice, &PlayerAction::StealTrump { selected: vec![c("2H")] }),
            Ok(Intent::StealTrump { card: c("2H") })
        );
        assert_eq!(
            state.check_move(&alice, &PlayerAction::Take),
            Ok(Intent::TakeCards {})
        );
        assert_eq!(
            state.check_move(&alice, &PlayerAction::CallCheat { cheater: name("bob") }),
            Ok(Intent::CallCheat { cheater: name("bob") })
        );
    }

    #[test]
    fn apply_should_leave_state_untouched_on_error() {
        let state = replica_state(
            &[("alice", vec![c("2H")]), ("bob", vec![c("3C")])],
            vec![],
            c("6S"),
            "bob",
            "alice",
        );
        let before = state.clone();

        let result = state.apply(&Event::ThrowCards {
            player: name("alice"),
            cards: vec![c("9S")],
        });

        assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
        assert_eq!(state, before);
    }
}
