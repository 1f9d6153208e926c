//! In-memory duplex listeners and readiness signalling for the embedded
//! ember stack.
//!
//! Services that would normally bind network sockets bind these endpoints
//! instead; clients inside the same process dial them through
//! [`MemoryListener::dial`] and wait for [`ReadySignal`]s to learn when a
//! service has started accepting calls.

pub mod error;
pub mod listener;
pub mod ready;

pub use error::MemnetError;
pub use listener::{DialOption, MemoryConn, MemoryListener};
pub use ready::ReadySignal;
