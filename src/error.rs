use thiserror::Error;

/// Failure taxonomy of a play session.
///
/// Only [`PlayError::Perception`] is recoverable: the loop logs it and treats the
/// pass as "nothing new". Every other variant means the model may no longer match
/// the screen, so the run stops.
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("perception miss: {0}")]
    Perception(String),
    #[error("invalid move: {0}")]
    InvalidMove(String),
    #[error("input delivery failed: {0}")]
    Actuation(#[from] enigo::InputError),
    #[error("deck bookkeeping anomaly: {0}")]
    DeckAnomaly(String),
}

impl PlayError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PlayError::Perception(_))
    }
}
