//! Memory-network errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemnetError {
    /// The serving side has not started accepting connections yet.
    #[error("listener {0} is not accepting connections")]
    NotListening(String),

    /// The listener was shut down.
    #[error("listener {0} is closed")]
    Closed(String),
}
