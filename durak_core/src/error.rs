use thiserror::Error;

use crate::{card::Card, user_name::Username};

/// Every way an engine operation can refuse to run.
///
/// Only `InvariantViolation` and `UnresolvedRevert` put a replica out of
/// sync; all other variants leave the state untouched and are reported to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("replica is inconsistent: {0}")]
    InvariantViolation(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("card {0} is not on the table")]
    NotFound(Card),

    #[error("card {0} is already covered")]
    AlreadyBroken(Card),

    #[error("{player} does not hold {card}")]
    NotOwned { player: Username, card: Card },

    #[error("there are no cards on the table")]
    NothingToTake,

    #[error("cannot revert the last action of {player}: {reason}")]
    UnresolvedRevert { player: Username, reason: String },

    #[error("unknown card identifier {0:?}")]
    UnknownCard(String),
}

impl EngineError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        EngineError::InvariantViolation(msg.into())
    }

    pub fn illegal(msg: impl Into<String>) -> Self {
        EngineError::IllegalMove(msg.into())
    }

    /// Whether the replica that hit this error must resync from a snapshot.
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            EngineError::InvariantViolation(_) | EngineError::UnresolvedRevert { .. }
        )
    }
}
