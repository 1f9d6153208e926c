//! Integration tests exercising the full bootstrap sequence with mock
//! daemons.

use std::sync::Arc;
use std::time::Duration;

use ember_memnet::DialOption;
use ember_mobile::mock::{MockNode, MockRelay};
use ember_mobile::{Callback, Launcher, ListenerSet, MobileError};
use tokio::sync::mpsc;
use tokio::time::timeout;

const MILESTONE_TIMEOUT: Duration = Duration::from_secs(5);

/// What a recording callback observed.
#[derive(Debug)]
enum Milestone {
    Response(Vec<u8>),
    Error(String),
}

struct RecordingCallback {
    tx: mpsc::UnboundedSender<Milestone>,
}

impl RecordingCallback {
    fn new() -> (Self, mpsc::UnboundedReceiver<Milestone>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Callback for RecordingCallback {
    fn on_response(&self, payload: Vec<u8>) {
        let _ = self.tx.send(Milestone::Response(payload));
    }

    fn on_error(&self, error: MobileError) {
        let _ = self.tx.send(Milestone::Error(error.to_string()));
    }
}

async fn next_milestone(rx: &mut mpsc::UnboundedReceiver<Milestone>) -> Milestone {
    timeout(MILESTONE_TIMEOUT, rx.recv())
        .await
        .expect("milestone should arrive before timeout")
        .expect("callback channel should not close unresolved")
}

/// Poll a condition until it holds or the timeout hits.
async fn wait_until(pred: impl Fn() -> bool) {
    timeout(MILESTONE_TIMEOUT, async {
        while !pred() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should hold before timeout");
}

fn launcher(node: MockNode, relay: MockRelay, listeners: ListenerSet) -> Launcher {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();

    Launcher::new(Arc::new(node), Arc::new(relay), listeners)
        .with_base_args(vec!["ember".to_string()])
}

#[tokio::test]
async fn full_bootstrap_reports_both_milestones() {
    let node = MockNode::new();
    let node_handle = node.handle();
    let relay = MockRelay::new();
    let relay_handle = relay.handle();
    let listeners = ListenerSet::new();
    let rpc = listeners.rpc.clone();

    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, listeners)
        .start("", "", unlock_cb, rpc_cb)
        .await;

    let unlock = next_milestone(&mut unlock_rx).await;
    assert!(matches!(unlock, Milestone::Response(ref payload) if payload.is_empty()));

    let rpc_milestone = next_milestone(&mut rpc_rx).await;
    assert!(matches!(rpc_milestone, Milestone::Response(ref payload) if payload.is_empty()));

    // The relay ran exactly once, over a live connection.
    wait_until(|| relay_handle.echo_ok()).await;
    assert_eq!(relay_handle.runs(), 1);
    assert_eq!(relay_handle.argv(), Some(vec!["ember".to_string()]));

    // The published credentials are attached to internal dials from now on.
    assert!(node_handle.authenticated());
    let conn = rpc.dial().await.expect("dial after readiness");
    assert_eq!(
        conn.options(),
        &[DialOption::AuthToken(b"mock-token".to_vec())][..]
    );
}

#[tokio::test]
async fn spliced_arguments_stay_per_daemon() {
    let node = MockNode::new();
    let node_handle = node.handle();
    let relay = MockRelay::new();
    let relay_handle = relay.handle();

    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, ListenerSet::new())
        .start(
            "network=testnet --profile=5050",
            "network=testnet",
            unlock_cb,
            rpc_cb,
        )
        .await;

    assert!(matches!(
        next_milestone(&mut unlock_rx).await,
        Milestone::Response(_)
    ));
    assert!(matches!(
        next_milestone(&mut rpc_rx).await,
        Milestone::Response(_)
    ));

    assert_eq!(
        node_handle.argv(),
        Some(vec![
            "ember".to_string(),
            "--network=testnet".to_string(),
            "--profile=5050".to_string(),
        ])
    );
    assert_eq!(node_handle.network(), Some("testnet".to_string()));
    assert_eq!(node_handle.profile(), Some(5050));

    // The relay never sees the node's flags.
    wait_until(|| relay_handle.runs() == 1).await;
    assert_eq!(
        relay_handle.argv(),
        Some(vec!["ember".to_string(), "--network=testnet".to_string()])
    );
}

#[tokio::test]
async fn help_request_terminates_without_callbacks() {
    let node = MockNode::new();
    let relay = MockRelay::new();
    let relay_handle = relay.handle();

    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, ListenerSet::new())
        .with_exit_hook(move |code| {
            let _ = exit_tx.send(code);
        })
        .start("help", "", unlock_cb, rpc_cb)
        .await;

    let code = timeout(MILESTONE_TIMEOUT, exit_rx.recv())
        .await
        .expect("exit hook should fire")
        .expect("exit channel should stay open");
    assert_eq!(code, 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(unlock_rx.try_recv().is_err());
    assert!(rpc_rx.try_recv().is_err());
    assert_eq!(relay_handle.runs(), 0);
}

#[tokio::test]
async fn startup_failure_terminates_without_callbacks() {
    let node = MockNode::new();
    let relay = MockRelay::new();
    let relay_handle = relay.handle();

    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();
    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, ListenerSet::new())
        .with_exit_hook(move |code| {
            let _ = exit_tx.send(code);
        })
        .start("bogus-flag", "", unlock_cb, rpc_cb)
        .await;

    let code = timeout(MILESTONE_TIMEOUT, exit_rx.recv())
        .await
        .expect("exit hook should fire")
        .expect("exit channel should stay open");
    assert_eq!(code, 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(unlock_rx.try_recv().is_err());
    assert!(rpc_rx.try_recv().is_err());
    assert_eq!(relay_handle.runs(), 0);
}

#[tokio::test]
async fn failed_internal_dial_reports_rpc_error() {
    let mut node = MockNode::new();
    node.close_rpc_listener = true;
    // Keep the auth branch from resolving the milestone first.
    node.fail_authenticate = true;
    let relay = MockRelay::new();
    let relay_handle = relay.handle();

    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, ListenerSet::new())
        .start("", "", unlock_cb, rpc_cb)
        .await;

    assert!(matches!(
        next_milestone(&mut rpc_rx).await,
        Milestone::Error(_)
    ));
    assert!(matches!(
        next_milestone(&mut unlock_rx).await,
        Milestone::Response(_)
    ));

    // Exactly one terminal notification, even with two failing branches.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rpc_rx.try_recv().is_err());
    assert_eq!(relay_handle.runs(), 0);
}

#[tokio::test]
async fn failed_authentication_still_starts_the_relay() {
    let mut node = MockNode::new();
    node.fail_authenticate = true;
    let relay = MockRelay::new();
    let relay_handle = relay.handle();

    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, ListenerSet::new())
        .start("", "", unlock_cb, rpc_cb)
        .await;

    assert!(matches!(
        next_milestone(&mut rpc_rx).await,
        Milestone::Error(_)
    ));
    assert!(matches!(
        next_milestone(&mut unlock_rx).await,
        Milestone::Response(_)
    ));

    // The dial branch is independent of the auth failure.
    wait_until(|| relay_handle.runs() == 1).await;
    wait_until(|| relay_handle.echo_ok()).await;
}

#[tokio::test]
async fn relay_failure_does_not_gate_rpc_readiness() {
    let node = MockNode::new();
    let mut relay = MockRelay::new();
    relay.fail_startup = true;
    let relay_handle = relay.handle();

    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, ListenerSet::new())
        .start("", "", unlock_cb, rpc_cb)
        .await;

    assert!(matches!(
        next_milestone(&mut rpc_rx).await,
        Milestone::Response(_)
    ));
    assert!(matches!(
        next_milestone(&mut unlock_rx).await,
        Milestone::Response(_)
    ));

    wait_until(|| relay_handle.runs() == 1).await;

    // The relay error stays off the callback surface.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rpc_rx.try_recv().is_err());
}

#[tokio::test]
async fn readiness_order_does_not_matter() {
    let mut node = MockNode::new();
    node.bind_rpc_first = true;
    let relay = MockRelay::new();

    let (unlock_cb, mut unlock_rx) = RecordingCallback::new();
    let (rpc_cb, mut rpc_rx) = RecordingCallback::new();

    launcher(node, relay, ListenerSet::new())
        .start("", "", unlock_cb, rpc_cb)
        .await;

    assert!(matches!(
        next_milestone(&mut rpc_rx).await,
        Milestone::Response(_)
    ));
    assert!(matches!(
        next_milestone(&mut unlock_rx).await,
        Milestone::Response(_)
    ));
}
