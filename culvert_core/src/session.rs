//! Session handles: one [`Leg`] per connection, paired into a
//! [`SessionPair`].
//!
//! A leg is the transport-agnostic face of one live connection: a bounded
//! outbound queue feeding the connection's write pump, a bounded inbound
//! queue fed by its read pump, and the teardown token both pumps observe.
//! Whoever holds a leg may close it; closing is idempotent.

use tokio_util::sync::CancellationToken;

/// Capacity of each leg's inbound and outbound queue.
pub const QUEUE_CAPACITY: usize = 256;

/// Which side of the tunnel a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Device,
    Cloud,
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Role::Device => write!(f, "device"),
            Role::Cloud => write!(f, "cloud"),
        }
    }
}

/// One side of a bridge session.
#[derive(Debug, Clone)]
pub struct Leg {
    role: Role,
    outbound: async_channel::Sender<String>,
    inbound: async_channel::Receiver<String>,
    closed: CancellationToken,
}

impl Leg {
    #[must_use]
    pub fn new(
        role: Role,
        outbound: async_channel::Sender<String>,
        inbound: async_channel::Receiver<String>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            role,
            outbound,
            inbound,
            closed,
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The queue feeding this connection's write pump. Sends block once the
    /// queue is full and fail once the write pump has stopped.
    #[must_use]
    pub fn outbound(&self) -> &async_channel::Sender<String> {
        &self.outbound
    }

    /// The queue fed by this connection's read pump. Receives fail once the
    /// read pump has stopped and the queue has drained.
    #[must_use]
    pub fn inbound(&self) -> &async_channel::Receiver<String> {
        &self.inbound
    }

    /// Tear this connection down. Safe to call from any number of failure
    /// paths; only the first has any effect.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

/// A device leg and a cloud leg, alive together or not at all.
#[derive(Debug, Clone)]
pub struct SessionPair {
    pub device: Leg,
    pub cloud: Leg,
}

impl SessionPair {
    /// Tear down both legs. Idempotent.
    pub fn close(&self) {
        self.device.close();
        self.cloud.close();
    }
}

/// Monotonic session number, for log context only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub fn new(n: u64) -> Self {
        Self(n)
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}
