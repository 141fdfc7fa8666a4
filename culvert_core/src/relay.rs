//! Untyped passthrough between two live legs.
//!
//! The fallback mode when payload semantics are irrelevant: every message
//! read from one leg is pushed into the other leg's write queue unchanged.
//! No correlation, no timeout, no selective routing.

use crate::claim::ClaimHandle;
use crate::coordinator::SessionRunner;
use crate::session::{Leg, SessionPair};

/// Byte-passthrough session runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameRelay;

impl SessionRunner for FrameRelay {
    async fn run(&self, session: SessionPair, claim: ClaimHandle) {
        let device_to_cloud = pump(&session, session.device.clone(), session.cloud.clone(), None);
        let cloud_to_device = pump(
            &session,
            session.cloud.clone(),
            session.device.clone(),
            Some(claim),
        );
        futures::join!(device_to_cloud, cloud_to_device);
    }
}

/// Forward `from`'s inbound queue into `to`'s outbound queue until either
/// queue closes, then tear down the whole pair.
async fn pump(session: &SessionPair, from: Leg, to: Leg, claim: Option<ClaimHandle>) {
    let mut claim = claim;
    loop {
        let Ok(message) = from.inbound().recv().await else {
            break;
        };
        if let Some(claim) = claim.take() {
            tracing::debug!(leg = %from.role(), "first message, connection claimed");
            claim.release_now();
        }
        if to.outbound().send(message).await.is_err() {
            break;
        }
    }
    tracing::debug!(from = %from.role(), to = %to.role(), "relay pump stopped");
    session.close();
}
