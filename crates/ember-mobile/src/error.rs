//! Error types of the embedded stack.

use ember_memnet::MemnetError;
use thiserror::Error;

/// Errors reported by daemon entry points.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The daemon's argument parser printed help text instead of starting.
    #[error("help requested")]
    HelpRequested,

    /// The daemon failed to start.
    #[error("startup failed: {0}")]
    Startup(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors delivered through a readiness callback's error path.
#[derive(Debug, Error)]
pub enum MobileError {
    #[error("connection error: {0}")]
    Net(#[from] MemnetError),

    #[error("daemon error: {0}")]
    Daemon(#[from] DaemonError),
}
