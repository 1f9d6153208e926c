//! Bootstrap sequencing for the embedded stack.

use std::sync::Arc;

use ember_memnet::MemoryListener;
use tracing::{debug, error, info};

use crate::args;
use crate::callback::{Callback, OnceCallback};
use crate::daemon::{NodeDaemon, NodeListeners, RelayConfig, RelayDaemon};
use crate::error::DaemonError;

/// The in-memory endpoints the embedded services bind, keyed by role.
#[derive(Clone)]
pub struct ListenerSet {
    /// Pre-authentication unlock service of the node daemon.
    pub unlock: MemoryListener,
    /// Authenticated main RPC service of the node daemon.
    pub rpc: MemoryListener,
    /// RPC surface of the relay daemon.
    pub relay: MemoryListener,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self {
            unlock: MemoryListener::new("unlock"),
            rpc: MemoryListener::new("rpc"),
            relay: MemoryListener::new("relay"),
        }
    }
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Launches the node daemon and the relay daemon inside the host process
/// and reports the two readiness milestones through one-shot callbacks.
pub struct Launcher {
    node: Arc<dyn NodeDaemon>,
    relay: Arc<dyn RelayDaemon>,
    listeners: ListenerSet,
    base_args: Vec<String>,
    exit: Arc<dyn Fn(i32) + Send + Sync>,
}

impl Launcher {
    /// Create a launcher over the given daemons and listener endpoints.
    ///
    /// The base argument list both daemon argvs are spliced onto defaults
    /// to the process arguments.
    pub fn new(
        node: Arc<dyn NodeDaemon>,
        relay: Arc<dyn RelayDaemon>,
        listeners: ListenerSet,
    ) -> Self {
        Self {
            node,
            relay,
            listeners,
            base_args: std::env::args().collect(),
            exit: Arc::new(|code| std::process::exit(code)),
        }
    }

    /// Replace the base argument list.
    pub fn with_base_args(mut self, base_args: Vec<String>) -> Self {
        self.base_args = base_args;
        self
    }

    /// Replace the handler invoked when the node daemon exits with an
    /// error. The default terminates the process; hosts that must survive
    /// a failed bootstrap (and tests) can install their own.
    pub fn with_exit_hook(mut self, hook: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.exit = Arc::new(hook);
        self
    }

    /// Start the embedded stack.
    ///
    /// `node_args` and `relay_args` are override strings spliced onto the
    /// base arguments of the respective daemon (see [`crate::args`]).
    /// `unlock_ready` fires once the unlock service accepts calls;
    /// `rpc_ready` fires once the rpc service accepts calls and the dial
    /// options for authenticated internal calls are published.
    ///
    /// Returns as soon as the bootstrap tasks are spawned; results arrive
    /// through the callbacks.
    pub async fn start<U, R>(self, node_args: &str, relay_args: &str, unlock_ready: U, rpc_ready: R)
    where
        U: Callback,
        R: Callback,
    {
        let node_argv = args::splice(&self.base_args, node_args);
        let relay_argv = args::splice(&self.base_args, relay_args);

        let unlock_ready = OnceCallback::new("unlock", unlock_ready);
        let rpc_ready = Arc::new(OnceCallback::new("rpc", rpc_ready));

        info!("starting embedded node stack");

        // Node daemon task. Startup failure here is unrecoverable: nothing
        // restarts the stack, so the whole process goes down with it. A
        // help request exits just as the daemon's own binary would, minus
        // the stderr noise.
        let node = self.node.clone();
        let node_listeners = NodeListeners {
            unlock: self.listeners.unlock.clone(),
            rpc: self.listeners.rpc.clone(),
        };
        let exit = self.exit.clone();
        tokio::spawn(async move {
            if let Err(err) = node.run(node_argv, node_listeners).await {
                if matches!(err, DaemonError::HelpRequested) {
                    debug!("node daemon exited after help request");
                } else {
                    eprintln!("{err}");
                }
                (*exit)(1);
            }
        });

        // Relay branch: once the rpc service is up, dial an internal
        // connection and start the relay daemon on top of it. A relay
        // failure is not fatal: the node keeps serving without it.
        let relay = self.relay.clone();
        let rpc = self.listeners.rpc.clone();
        let relay_listener = self.listeners.relay.clone();
        let rpc_ready_dial = rpc_ready.clone();
        tokio::spawn(async move {
            rpc.wait_listening().await;

            let node_conn = match rpc.dial().await {
                Ok(conn) => conn,
                Err(err) => {
                    error!(error = %err, "failed to dial node rpc service");
                    rpc_ready_dial.reject(err.into());
                    return;
                }
            };

            info!("starting relay daemon");
            let config = RelayConfig {
                rpc: relay_listener,
                node_conn,
            };
            if let Err(err) = relay.run(relay_argv, config).await {
                eprintln!("{err}");
            }
        });

        // Auth branch: once the rpc service is up, fetch the credentials
        // internal calls must carry, publish them on the rpc listener, and
        // report rpc-readiness.
        let node = self.node.clone();
        let rpc = self.listeners.rpc.clone();
        tokio::spawn(async move {
            rpc.wait_listening().await;

            match node.authenticate().await {
                Ok(options) => {
                    rpc.add_dial_options(options);
                    rpc_ready.resolve(Vec::new());
                }
                Err(err) => {
                    error!(error = %err, "node authentication failed");
                    rpc_ready.reject(err.into());
                }
            }
        });

        // Unlock branch: nothing can fail between here and the unlock
        // service accepting calls, so readiness is the only outcome.
        let unlock = self.listeners.unlock.clone();
        tokio::spawn(async move {
            unlock.wait_listening().await;
            unlock_ready.resolve(Vec::new());
        });
    }
}
