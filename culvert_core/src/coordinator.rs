//! The reconnection loop.
//!
//! The [`Coordinator`] owns the claim pool and drives the connect cycle:
//! acquire a claim, dial both legs, and either hand the live pair to the
//! session runner or arm the delayed claim return. Shutdown is a broadcast
//! cancellation; the coordinator stops dialing the moment it fires and
//! joins every spawned session before returning.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::claim::{ClaimHandle, ClaimPool};
use crate::session::{SessionId, SessionPair};
use crate::RECONNECT_DELAY;

/// Establishes one device/cloud connection pair per call.
pub trait Dial {
    /// A problem establishing either leg.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Dial both legs. Implementations must not leak a half-dialed pair:
    /// if one leg fails, the other must be closed before returning.
    fn dial(&self) -> impl Future<Output = Result<SessionPair, Self::Error>> + Send;
}

/// Runs one live session to completion.
///
/// The runner owns the pair until either leg fails or shutdown tears it
/// down, and fires the claim handle on the cloud leg's first message.
pub trait SessionRunner {
    fn run(&self, session: SessionPair, claim: ClaimHandle) -> impl Future<Output = ()> + Send;
}

pub struct Coordinator<D, R> {
    dialer: D,
    runner: R,
    pool: ClaimPool,
    reconnect_delay: Duration,
    shutdown: CancellationToken,
}

impl<D, R> Coordinator<D, R>
where
    D: Dial,
    R: SessionRunner + Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(dialer: D, runner: R, shutdown: CancellationToken) -> Self {
        Self {
            dialer,
            runner,
            pool: ClaimPool::new(),
            reconnect_delay: RECONNECT_DELAY,
            shutdown,
        }
    }

    /// Override the claim-return delay, for tests.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Drive the connect cycle until shutdown, then join every session.
    pub async fn run(self) {
        let mut sessions: JoinSet<()> = JoinSet::new();
        let mut session_counter = 0u64;

        loop {
            let claim = tokio::select! {
                () = self.shutdown.cancelled() => break,
                claim = self.pool.acquire() => match claim {
                    Some(claim) => claim,
                    None => break,
                },
            };

            let dialed = tokio::select! {
                () = self.shutdown.cancelled() => break,
                dialed = self.dialer.dial() => dialed,
            };

            match dialed {
                Err(e) => {
                    tracing::warn!(error = %e, "dial attempt failed, arming reconnect");
                    self.pool.release_after(claim, self.reconnect_delay);
                }
                Ok(pair) => {
                    session_counter += 1;
                    let id = SessionId::new(session_counter);
                    tracing::info!(%id, "session established");

                    let handle = self.pool.handle(claim);
                    let runner = self.runner.clone();
                    let reconnect_delay = self.reconnect_delay;
                    sessions.spawn(async move {
                        runner.run(pair, handle.clone()).await;
                        // A session that died before the cloud ever spoke
                        // still owes its claim back; the once-guard makes
                        // this a no-op for claimed sessions.
                        handle.release_after(reconnect_delay);
                        tracing::info!(%id, "session ended");
                    });
                }
            }

            while sessions.try_join_next().is_some() {}
        }

        tracing::debug!("coordinator stopping, waiting for sessions");
        while sessions.join_next().await.is_some() {}
    }
}
