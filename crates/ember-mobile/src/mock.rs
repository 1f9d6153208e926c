//! Mock daemons for tests and the demo harness.
//!
//! Both daemons record what they were launched with and expose cloneable
//! observation handles, so tests can assert on the bootstrap sequence
//! without real node internals.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::error::ErrorKind;
use clap::Parser;
use ember_memnet::DialOption;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::daemon::{NodeDaemon, NodeListeners, RelayConfig, RelayDaemon};
use crate::error::DaemonError;

// ---------------------------------------------------------------------------
// MockNode
// ---------------------------------------------------------------------------

/// Flags the mock node daemon understands.
#[derive(Debug, Parser)]
#[command(name = "ember-node")]
struct NodeFlags {
    /// Network to run on.
    #[arg(long)]
    network: Option<String>,

    /// Port to serve runtime profiling on.
    #[arg(long)]
    profile: Option<u16>,
}

/// Observed state of a [`MockNode`], shared with its handle.
#[derive(Debug, Default)]
struct MockNodeState {
    argv: Option<Vec<String>>,
    network: Option<String>,
    profile: Option<u16>,
    authenticated: bool,
}

/// Handle for observing what a [`MockNode`] did.
#[derive(Clone)]
pub struct MockNodeHandle {
    state: Arc<Mutex<MockNodeState>>,
}

impl MockNodeHandle {
    /// Argument list the node was launched with, once launched.
    pub fn argv(&self) -> Option<Vec<String>> {
        self.state.lock().unwrap().argv.clone()
    }

    /// Parsed `--network` flag.
    pub fn network(&self) -> Option<String> {
        self.state.lock().unwrap().network.clone()
    }

    /// Parsed `--profile` flag.
    pub fn profile(&self) -> Option<u16> {
        self.state.lock().unwrap().profile
    }

    /// Whether `authenticate` was called.
    pub fn authenticated(&self) -> bool {
        self.state.lock().unwrap().authenticated
    }
}

/// Mock node daemon.
///
/// Parses its argv, binds the unlock and rpc listeners, then echoes every
/// byte received on accepted rpc connections.
pub struct MockNode {
    /// Close the rpc listener before binding it, so internal dials fail.
    pub close_rpc_listener: bool,
    /// Fail the `authenticate` call.
    pub fail_authenticate: bool,
    /// Bind the rpc listener before the unlock listener.
    pub bind_rpc_first: bool,
    /// Dial options `authenticate` returns.
    pub auth_options: Vec<DialOption>,
    state: Arc<Mutex<MockNodeState>>,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            close_rpc_listener: false,
            fail_authenticate: false,
            bind_rpc_first: false,
            auth_options: vec![DialOption::AuthToken(b"mock-token".to_vec())],
            state: Arc::new(Mutex::new(MockNodeState::default())),
        }
    }

    /// Get an observation handle.
    pub fn handle(&self) -> MockNodeHandle {
        MockNodeHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeDaemon for MockNode {
    async fn run(&self, argv: Vec<String>, listeners: NodeListeners) -> Result<(), DaemonError> {
        let flags = match NodeFlags::try_parse_from(&argv) {
            Ok(flags) => flags,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return Err(DaemonError::HelpRequested);
            }
            Err(err) => return Err(DaemonError::Startup(err.to_string())),
        };

        {
            let mut state = self.state.lock().unwrap();
            state.argv = Some(argv);
            state.network = flags.network.clone();
            state.profile = flags.profile;
        }

        if self.close_rpc_listener {
            listeners.rpc.close();
        }

        if self.bind_rpc_first {
            listeners.rpc.start_listening();
            listeners.unlock.start_listening();
        } else {
            listeners.unlock.start_listening();
            listeners.rpc.start_listening();
        }

        // Echo server standing in for the node's rpc surface.
        loop {
            let stream = match listeners.rpc.accept().await {
                Ok(stream) => stream,
                Err(err) => {
                    debug!(error = %err, "mock node accept loop ended");
                    return Ok(());
                }
            };
            tokio::spawn(async move {
                let (mut reader, mut writer) = tokio::io::split(stream);
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    }

    async fn authenticate(&self) -> Result<Vec<DialOption>, DaemonError> {
        if self.fail_authenticate {
            return Err(DaemonError::Other(anyhow::anyhow!(
                "credential store locked"
            )));
        }

        self.state.lock().unwrap().authenticated = true;
        Ok(self.auth_options.clone())
    }
}

// ---------------------------------------------------------------------------
// MockRelay
// ---------------------------------------------------------------------------

/// Observed state of a [`MockRelay`], shared with its handle.
#[derive(Debug, Default)]
struct MockRelayState {
    argv: Option<Vec<String>>,
    runs: usize,
    conn_options: Option<Vec<DialOption>>,
    echo_ok: bool,
}

/// Handle for observing what a [`MockRelay`] did.
#[derive(Clone)]
pub struct MockRelayHandle {
    state: Arc<Mutex<MockRelayState>>,
}

impl MockRelayHandle {
    /// Argument list the relay was launched with, once launched.
    pub fn argv(&self) -> Option<Vec<String>> {
        self.state.lock().unwrap().argv.clone()
    }

    /// How many times the relay entry point ran.
    pub fn runs(&self) -> usize {
        self.state.lock().unwrap().runs
    }

    /// Dial options carried by the node connection the relay received.
    pub fn conn_options(&self) -> Option<Vec<DialOption>> {
        self.state.lock().unwrap().conn_options.clone()
    }

    /// Whether the byte round-trip over the node connection came back.
    pub fn echo_ok(&self) -> bool {
        self.state.lock().unwrap().echo_ok
    }
}

/// Mock relay daemon.
///
/// Records its argv, proves the node connection is live with a byte
/// round-trip, then binds its own rpc listener.
pub struct MockRelay {
    /// Fail startup instead of serving.
    pub fail_startup: bool,
    state: Arc<Mutex<MockRelayState>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self {
            fail_startup: false,
            state: Arc::new(Mutex::new(MockRelayState::default())),
        }
    }

    /// Get an observation handle.
    pub fn handle(&self) -> MockRelayHandle {
        MockRelayHandle {
            state: self.state.clone(),
        }
    }
}

impl Default for MockRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayDaemon for MockRelay {
    async fn run(&self, argv: Vec<String>, config: RelayConfig) -> Result<(), DaemonError> {
        {
            let mut state = self.state.lock().unwrap();
            state.runs += 1;
            state.argv = Some(argv);
            state.conn_options = Some(config.node_conn.options().to_vec());
        }

        if self.fail_startup {
            return Err(DaemonError::Startup("relay configured to fail".to_string()));
        }

        let mut conn = config.node_conn;
        conn.write_all(b"ping")
            .await
            .map_err(|err| DaemonError::Startup(err.to_string()))?;

        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf)
            .await
            .map_err(|err| DaemonError::Startup(err.to_string()))?;
        self.state.lock().unwrap().echo_ok = &buf == b"ping";

        config.rpc.start_listening();
        Ok(())
    }
}
