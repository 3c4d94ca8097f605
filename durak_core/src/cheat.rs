use strum_macros::Display;

use crate::{
    card::Card,
    error::EngineError,
    game_state::GameState,
    user_name::Username,
};

/// The most recent state-changing action of one player, kept until the end
/// of the round so that an accusation can undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Throw {
        cards: Vec<Card>,
    },
    Break {
        bottom: Card,
        top: Card,
    },
    MoveTopCard {
        top: Card,
        from: Card,
    },
    PassCards {
        cards: Vec<Card>,
        previous: Option<Username>,
    },
    PassTrump,
    Take,
    BreakOut,
    AllowBreak,
    StealTrump {
        old_trump: Card,
        replacement: Card,
    },
    PutIntoDeck {
        cards: Vec<Card>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ActionKind {
    Throw,
    Break,
    MoveTopCard,
    PassCards,
    PassTrump,
    Take,
    BreakOut,
    AllowBreak,
    StealTrump,
    PutIntoDeck,
}

impl RecordedAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            RecordedAction::Throw { .. } => ActionKind::Throw,
            RecordedAction::Break { .. } => ActionKind::Break,
            RecordedAction::MoveTopCard { .. } => ActionKind::MoveTopCard,
            RecordedAction::PassCards { .. } => ActionKind::PassCards,
            RecordedAction::PassTrump => ActionKind::PassTrump,
            RecordedAction::Take => ActionKind::Take,
            RecordedAction::BreakOut => ActionKind::BreakOut,
            RecordedAction::AllowBreak => ActionKind::AllowBreak,
            RecordedAction::StealTrump { .. } => ActionKind::StealTrump,
            RecordedAction::PutIntoDeck { .. } => ActionKind::PutIntoDeck,
        }
    }
}

impl ActionKind {
    pub fn is_revertible(&self) -> bool {
        matches!(
            self,
            ActionKind::Throw
                | ActionKind::PassCards
                | ActionKind::MoveTopCard
                | ActionKind::StealTrump
                | ActionKind::PutIntoDeck
        )
    }
}

/// A resolved `callcheat`. Lives only while it is being applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatAccusation {
    pub accuser: Username,
    pub accused: Username,
    pub revert: bool,
}

impl GameState {
    pub(crate) fn record(&mut self, player: &Username, action: RecordedAction) {
        self.last_actions.insert(player.clone(), action);
    }

    pub(crate) fn resolve_accusation(
        &mut self,
        accusation: &CheatAccusation,
    ) -> Result<(), EngineError> {
        if !accusation.revert {
            return Ok(());
        }
        let player = &accusation.accused;
        let unresolved = |reason: String| EngineError::UnresolvedRevert {
            player: player.clone(),
            reason,
        };
        let action = self
            .last_actions
            .remove(player)
            .ok_or_else(|| unresolved("no action on record".to_string()))?;
        if !action.kind().is_revertible() {
            return Err(unresolved(format!("{} cannot be undone", action.kind())));
        }
        self.undo(player, &action)
            .map_err(|e| unresolved(format!("undoing {} failed: {}", action.kind(), e)))
    }

    fn undo(&mut self, player: &Username, action: &RecordedAction) -> Result<(), EngineError> {
        match action {
            RecordedAction::Throw { cards } => {
                self.table.remove_pairs(cards)?;
                self.hands.add_cards(player, cards)
            }
            RecordedAction::PassCards { cards, previous } => {
                self.table.remove_pairs(cards)?;
                self.hands.add_cards(player, cards)?;
                self.set_current(previous.clone());
                Ok(())
            }
            RecordedAction::MoveTopCard { top, from } => self.table.relocate_top_card(*top, *from),
            RecordedAction::StealTrump { old_trump, .. } => {
                self.deck.restore_trump(&mut self.hands, player, *old_trump)
            }
            RecordedAction::PutIntoDeck { cards } => {
                self.deck.take_back(&mut self.hands, player, cards)
            }
            other => Err(EngineError::illegal(format!("{} cannot be undone", other.kind()))),
        }
    }
}
