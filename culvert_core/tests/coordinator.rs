use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use culvert_core::coordinator::{Coordinator, Dial};
use culvert_core::relay::FrameRelay;
use culvert_core::session::{Leg, Role, SessionPair, QUEUE_CAPACITY};
use testresult::TestResult;
use tokio_util::sync::CancellationToken;

static TRACING: OnceLock<()> = OnceLock::new();

fn init_tracing() {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    });
}

/// The far side of an in-memory leg: inject inbound frames, observe outbound.
struct RemoteEnd {
    to_leg: async_channel::Sender<String>,
    from_leg: async_channel::Receiver<String>,
    teardown: CancellationToken,
}

/// Build a leg backed by in-memory queues. Mimics the transport pumps:
/// teardown closes both queues.
fn test_leg(role: Role, shutdown: &CancellationToken) -> (Leg, RemoteEnd) {
    let (out_tx, out_rx) = async_channel::bounded(QUEUE_CAPACITY);
    let (in_tx, in_rx) = async_channel::bounded(QUEUE_CAPACITY);
    let teardown = shutdown.child_token();

    tokio::spawn({
        let teardown = teardown.clone();
        let in_tx = in_tx.clone();
        let out_rx = out_rx.clone();
        async move {
            teardown.cancelled().await;
            in_tx.close();
            out_rx.close();
        }
    });

    (
        Leg::new(role, out_tx, in_rx, teardown.clone()),
        RemoteEnd {
            to_leg: in_tx,
            from_leg: out_rx,
            teardown,
        },
    )
}

fn test_pair(shutdown: &CancellationToken) -> (SessionPair, RemoteEnd, RemoteEnd) {
    let (device, device_remote) = test_leg(Role::Device, shutdown);
    let (cloud, cloud_remote) = test_leg(Role::Cloud, shutdown);
    (SessionPair { device, cloud }, device_remote, cloud_remote)
}

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct Refused;

enum Outcome {
    Refused,
    Connected(SessionPair),
}

/// Plays back a fixed list of dial outcomes, then blocks forever.
#[derive(Clone)]
struct ScriptedDialer {
    attempts: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Outcome>>>,
}

impl ScriptedDialer {
    fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            attempts: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(outcomes.into_iter().collect())),
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Dial for ScriptedDialer {
    type Error = Refused;

    async fn dial(&self) -> Result<SessionPair, Refused> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        match next {
            Some(Outcome::Refused) => Err(Refused),
            Some(Outcome::Connected(pair)) => Ok(pair),
            None => std::future::pending().await,
        }
    }
}

#[tokio::test]
async fn refused_dial_arms_the_backoff() -> TestResult {
    init_tracing();
    let shutdown = CancellationToken::new();
    let dialer = ScriptedDialer::new([Outcome::Refused, Outcome::Refused]);

    let coordinator = Coordinator::new(dialer.clone(), FrameRelay, shutdown.clone())
        .with_reconnect_delay(Duration::from_millis(200));
    let run = tokio::spawn(coordinator.run());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(dialer.attempts(), 1, "no second dial before the delay fires");

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(dialer.attempts(), 2, "exactly one retry after the delay");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), run).await??;
    Ok(())
}

#[tokio::test]
async fn first_cloud_message_starts_a_standby_attempt() -> TestResult {
    init_tracing();
    let shutdown = CancellationToken::new();
    let (pair, device_remote, cloud_remote) = test_pair(&shutdown);
    let dialer = ScriptedDialer::new([Outcome::Connected(pair)]);

    let coordinator = Coordinator::new(dialer.clone(), FrameRelay, shutdown.clone())
        .with_reconnect_delay(Duration::from_millis(100));
    let run = tokio::spawn(coordinator.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dialer.attempts(), 1);

    cloud_remote.to_leg.send("hello".into()).await?;
    let crossed =
        tokio::time::timeout(Duration::from_secs(2), device_remote.from_leg.recv()).await??;
    assert_eq!(crossed, "hello");

    // A warm replacement attempt begins while the first session keeps relaying.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(dialer.attempts(), 2);

    device_remote.to_leg.send("status".into()).await?;
    let crossed =
        tokio::time::timeout(Duration::from_secs(2), cloud_remote.from_leg.recv()).await??;
    assert_eq!(crossed, "status");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), run).await??;
    Ok(())
}

#[tokio::test]
async fn unclaimed_session_death_releases_after_the_delay() -> TestResult {
    init_tracing();
    let shutdown = CancellationToken::new();
    let (pair, _device_remote, cloud_remote) = test_pair(&shutdown);
    let dialer = ScriptedDialer::new([Outcome::Connected(pair)]);

    let coordinator = Coordinator::new(dialer.clone(), FrameRelay, shutdown.clone())
        .with_reconnect_delay(Duration::from_millis(150));
    let run = tokio::spawn(coordinator.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dialer.attempts(), 1);

    // The session dies before the cloud ever spoke.
    cloud_remote.teardown.cancel();

    tokio::time::sleep(Duration::from_millis(75)).await;
    assert_eq!(dialer.attempts(), 1, "claim must not return before the delay");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(dialer.attempts(), 2, "claim returns once after the delay");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), run).await??;
    Ok(())
}

#[tokio::test]
async fn shutdown_joins_every_session() -> TestResult {
    init_tracing();
    let shutdown = CancellationToken::new();
    let (pair, device_remote, cloud_remote) = test_pair(&shutdown);
    let dialer = ScriptedDialer::new([Outcome::Connected(pair)]);

    let coordinator = Coordinator::new(dialer, FrameRelay, shutdown.clone());
    let run = tokio::spawn(coordinator.run());

    // Session is live and relaying.
    cloud_remote.to_leg.send("hello".into()).await?;
    let _ = tokio::time::timeout(Duration::from_secs(2), device_remote.from_leg.recv()).await??;

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), run).await??;
    assert!(device_remote.teardown.is_cancelled());
    assert!(cloud_remote.teardown.is_cancelled());
    Ok(())
}
