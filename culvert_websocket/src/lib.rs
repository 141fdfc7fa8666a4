//! # Culvert WebSocket transport
//!
//! Dials one WebSocket per leg and runs its read/write pumps: read deadlines
//! reset by pongs, periodic keepalive probes, per-write deadlines, and
//! idempotent teardown through a cancellation token. [`PairDialer`]
//! establishes both legs as a unit for the core's reconnection loop.

pub mod credentials;
pub mod error;
pub mod pair;
pub mod socket;

pub use credentials::Credentials;
pub use error::DialError;
pub use pair::PairDialer;
pub use socket::{dial, SocketConfig, MAX_MESSAGE_SIZE};
