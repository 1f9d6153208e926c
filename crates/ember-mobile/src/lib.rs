//! Startup sequencing and readiness callbacks for embedding the ember
//! node daemon and its relay companion inside a single host process.
//!
//! Hosts that cannot block on synchronous calls hand [`Launcher::start`]
//! two per-daemon argument override strings and two one-shot callbacks.
//! The node daemon is started over in-memory listeners, the relay daemon
//! is started on top of an authenticated in-process connection to it, and
//! each callback fires exactly once when its service becomes usable.

pub mod args;
pub mod callback;
pub mod daemon;
pub mod error;
pub mod launcher;
#[cfg(feature = "mock")]
pub mod mock;

pub use callback::Callback;
pub use daemon::{NodeDaemon, NodeListeners, RelayConfig, RelayDaemon};
pub use error::{DaemonError, MobileError};
pub use launcher::{Launcher, ListenerSet};
