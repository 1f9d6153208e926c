//! ember-harness: runs the embedded ember stack end to end with mock
//! daemons, printing each readiness milestone as an embedding host would
//! see it.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ember_mobile::mock::{MockNode, MockRelay};
use ember_mobile::{Callback, Launcher, ListenerSet, MobileError};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Parser)]
#[command(
    name = "ember-harness",
    about = "Run the embedded ember stack with mock daemons",
    version
)]
struct Cli {
    /// Override string spliced onto the node daemon's arguments.
    #[arg(long, default_value = "")]
    node_args: String,

    /// Override string spliced onto the relay daemon's arguments.
    #[arg(long, default_value = "")]
    relay_args: String,

    /// Seconds to wait for each readiness milestone.
    #[arg(long, default_value_t = 10)]
    wait_secs: u64,
}

struct PrintingCallback {
    milestone: &'static str,
    tx: mpsc::UnboundedSender<bool>,
}

impl Callback for PrintingCallback {
    fn on_response(&self, payload: Vec<u8>) {
        println!("{} ready ({} payload bytes)", self.milestone, payload.len());
        let _ = self.tx.send(true);
    }

    fn on_error(&self, error: MobileError) {
        eprintln!("{} failed: {error}", self.milestone);
        let _ = self.tx.send(false);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let node = MockNode::new();
    let relay = MockRelay::new();
    let relay_handle = relay.handle();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let unlock_ready = PrintingCallback {
        milestone: "unlock service",
        tx: tx.clone(),
    };
    let rpc_ready = PrintingCallback {
        milestone: "rpc service",
        tx,
    };

    // The harness's own flags mean nothing to the daemons, so the base
    // argument list is reduced to a program name.
    Launcher::new(Arc::new(node), Arc::new(relay), ListenerSet::new())
        .with_base_args(vec!["ember".to_string()])
        .start(&cli.node_args, &cli.relay_args, unlock_ready, rpc_ready)
        .await;

    let mut ok = true;
    for _ in 0..2 {
        match timeout(Duration::from_secs(cli.wait_secs), rx.recv()).await {
            Ok(Some(success)) => ok &= success,
            Ok(None) | Err(_) => anyhow::bail!("timed out waiting for readiness milestones"),
        }
    }

    // Give the relay a moment to finish its connection check.
    tokio::time::sleep(Duration::from_millis(100)).await;
    if relay_handle.echo_ok() {
        println!("relay daemon verified its node connection");
    }

    if ok {
        Ok(())
    } else {
        anyhow::bail!("one or more services failed to become ready")
    }
}
