//! Named in-memory duplex listeners.
//!
//! A [`MemoryListener`] stands in for a network socket when a service runs
//! inside the host process: the serving side accepts in-memory streams,
//! in-process clients dial them, and the listener's [`ReadySignal`] tells
//! waiters when the service has started accepting.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::error::MemnetError;
use crate::ready::ReadySignal;

/// Per-direction buffer size of each in-memory stream.
const STREAM_BUFFER: usize = 64 * 1024;

/// Dialed connections queued before `dial` waits for an accept.
const ACCEPT_BACKLOG: usize = 16;

/// An option attached to connections dialed through a [`MemoryListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOption {
    /// Bearer token the dialer presents on every call.
    AuthToken(Vec<u8>),
    /// Certificate the dialer pins for the in-process endpoint.
    TransportCert(Vec<u8>),
}

/// A named in-memory listener endpoint.
///
/// Cloning yields another handle to the same endpoint.
#[derive(Clone)]
pub struct MemoryListener {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    ready: ReadySignal,
    conn_tx: mpsc::Sender<DuplexStream>,
    conn_rx: Mutex<mpsc::Receiver<DuplexStream>>,
    options: StdMutex<Vec<DialOption>>,
    closed: AtomicBool,
}

impl MemoryListener {
    pub fn new(name: impl Into<String>) -> Self {
        let (conn_tx, conn_rx) = mpsc::channel(ACCEPT_BACKLOG);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                ready: ReadySignal::new(),
                conn_tx,
                conn_rx: Mutex::new(conn_rx),
                options: StdMutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Mark the listener as accepting connections and fire its readiness
    /// signal. Idempotent.
    pub fn start_listening(&self) {
        if self.inner.ready.fire() {
            info!(listener = %self.inner.name, "listener accepting connections");
        } else {
            debug!(listener = %self.inner.name, "listener already accepting");
        }
    }

    /// Whether the serving side has started accepting connections.
    pub fn is_listening(&self) -> bool {
        self.inner.ready.fired()
    }

    /// Wait until the serving side starts accepting connections.
    pub async fn wait_listening(&self) {
        self.inner.ready.wait().await;
    }

    /// Accept the next dialed connection.
    pub async fn accept(&self) -> Result<DuplexStream, MemnetError> {
        let mut conn_rx = self.inner.conn_rx.lock().await;
        conn_rx
            .recv()
            .await
            .ok_or_else(|| MemnetError::Closed(self.inner.name.clone()))
    }

    /// Dial the listener, producing the client end of a fresh in-memory
    /// stream together with the currently published dial options.
    ///
    /// Valid only while the service is listening; fails with
    /// [`MemnetError::NotListening`] before readiness and
    /// [`MemnetError::Closed`] after [`MemoryListener::close`].
    pub async fn dial(&self) -> Result<MemoryConn, MemnetError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(MemnetError::Closed(self.inner.name.clone()));
        }
        if !self.is_listening() {
            return Err(MemnetError::NotListening(self.inner.name.clone()));
        }

        let (client, server) = tokio::io::duplex(STREAM_BUFFER);
        self.inner
            .conn_tx
            .send(server)
            .await
            .map_err(|_| MemnetError::Closed(self.inner.name.clone()))?;

        let options = self.dial_options();
        debug!(
            listener = %self.inner.name,
            options = options.len(),
            "dialed in-memory connection"
        );
        Ok(MemoryConn {
            stream: client,
            options,
        })
    }

    /// Append options carried by every subsequent dial.
    pub fn add_dial_options(&self, options: Vec<DialOption>) {
        debug!(
            listener = %self.inner.name,
            added = options.len(),
            "dial options published"
        );
        self.inner
            .options
            .lock()
            .expect("dial option slot poisoned")
            .extend(options);
    }

    /// Snapshot of the options currently attached to dials.
    pub fn dial_options(&self) -> Vec<DialOption> {
        self.inner
            .options
            .lock()
            .expect("dial option slot poisoned")
            .clone()
    }

    /// Close the listener: subsequent dials fail with
    /// [`MemnetError::Closed`].
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            info!(listener = %self.inner.name, "listener closed");
        }
    }
}

/// The client end of a dialed in-memory connection.
pub struct MemoryConn {
    stream: DuplexStream,
    options: Vec<DialOption>,
}

impl MemoryConn {
    /// Options that were published on the listener when this connection
    /// was dialed.
    pub fn options(&self) -> &[DialOption] {
        &self.options
    }

    /// Consume the connection, yielding the raw byte stream.
    pub fn into_stream(self) -> DuplexStream {
        self.stream
    }
}

impl AsyncRead for MemoryConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
