use thiserror::Error;
use uuid::Uuid;

/// Failure modes of the match write path. Everything except `Storage` is
/// raised before any write; `Storage` means the transaction was aborted and
/// nothing was persisted.
#[derive(Debug, Error)]
pub enum RecordMatchError {
    #[error("{0}")]
    Validation(String),

    #[error("player with ID {0} not found")]
    PlayerNotFound(Uuid),

    #[error("user {0} is not a player")]
    PlayerNotEligible(String),

    #[error("no players from winning team \"{0}\" found in the match")]
    NoWinningParticipants(String),

    #[error("storage error")]
    Storage(#[from] mongodb::error::Error),
}

impl RecordMatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        RecordMatchError::Validation(message.into())
    }
}
