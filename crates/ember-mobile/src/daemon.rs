//! Entry-point seams for the two embedded daemons.
//!
//! The daemons' RPC surfaces and business logic live elsewhere; the
//! launcher only needs to run them over in-memory listeners and, for the
//! node, fetch the credentials internal calls must carry.

use async_trait::async_trait;
use ember_memnet::{DialOption, MemoryConn, MemoryListener};

use crate::error::DaemonError;

/// Listener endpoints the node daemon binds instead of network sockets.
pub struct NodeListeners {
    /// Pre-authentication unlock service.
    pub unlock: MemoryListener,
    /// Authenticated main RPC service.
    pub rpc: MemoryListener,
}

/// Everything the relay daemon needs to serve on top of a running node.
pub struct RelayConfig {
    /// Listener for the relay daemon's own RPC surface.
    pub rpc: MemoryListener,
    /// Established in-process connection to the node daemon.
    pub node_conn: MemoryConn,
}

/// The node daemon: owns the unlock and rpc services.
#[async_trait]
pub trait NodeDaemon: Send + Sync {
    /// Run the daemon until it shuts down, binding its services to the
    /// given listeners. `argv` is the daemon's complete effective argument
    /// list, program name included.
    async fn run(&self, argv: Vec<String>, listeners: NodeListeners) -> Result<(), DaemonError>;

    /// Produce the credentials authenticated internal calls must carry.
    /// Valid once the rpc service is listening.
    async fn authenticate(&self) -> Result<Vec<DialOption>, DaemonError>;
}

/// The relay daemon: requires an established connection to the node.
#[async_trait]
pub trait RelayDaemon: Send + Sync {
    /// Run the daemon until it shuts down.
    async fn run(&self, argv: Vec<String>, config: RelayConfig) -> Result<(), DaemonError>;
}
