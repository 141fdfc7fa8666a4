//! # Culvert core
//!
//! Transport-agnostic engine of the culvert tunnel. A [`Coordinator`] owns
//! the reconnection loop: it borrows a permit from the [`ClaimPool`], asks a
//! [`Dial`] implementation for a device/cloud connection pair, and hands the
//! live pair to a [`SessionRunner`] — either the untyped [`FrameRelay`] or
//! the typed [`RpcBridge`] — until one leg fails or shutdown fires.
//!
//! [`Coordinator`]: coordinator::Coordinator
//! [`ClaimPool`]: claim::ClaimPool
//! [`Dial`]: coordinator::Dial
//! [`SessionRunner`]: coordinator::SessionRunner
//! [`FrameRelay`]: relay::FrameRelay
//! [`RpcBridge`]: bridge::RpcBridge

use std::time::Duration;

pub mod bridge;
pub mod claim;
pub mod coordinator;
pub mod error;
pub mod message;
pub mod method;
pub mod relay;
pub mod session;
pub mod upload;

/// Deadline for a forwarded call to be answered by the other leg.
pub const CALL_DEADLINE: Duration = Duration::from_secs(15);

/// Delay before a failed dial attempt's permit is returned to the pool.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
