//! The claim protocol: a bounded pool of connection-attempt permits.
//!
//! Every dial attempt consumes one [`Claim`] from the [`ClaimPool`]. A
//! consumed claim comes back exactly one way:
//!
//! - a failed dial arms a one-shot delayed return ([`ClaimPool::release_after`]),
//!   bounding the retry rate to one attempt per delay period;
//! - a live session holds a [`ClaimHandle`], which returns the claim the
//!   moment the cloud leg receives its first message (hot standby), or —
//!   if the session dies unclaimed — after the same delay.
//!
//! The pool and the per-session release are deliberately separate
//! constructs, so the capacity bound stays auditable: claims are only
//! minted at construction, and a handle can fire at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Maximum claims in circulation: one active attempt plus standby headroom.
pub const CLAIM_CAPACITY: usize = 2;

/// Claims seeded at startup. Only one attempt begins immediately; the rest
/// of the capacity is headroom for hot-standby returns.
pub const INITIAL_CLAIMS: usize = 1;

/// A permit for one connection-pair attempt. Not clonable; minted only by
/// [`ClaimPool::new`] and conserved thereafter.
#[derive(Debug)]
pub struct Claim {
    _permit: (),
}

/// The bounded permit pool.
#[derive(Debug, Clone)]
pub struct ClaimPool {
    slots: async_channel::Sender<Claim>,
    free: async_channel::Receiver<Claim>,
}

impl ClaimPool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(CLAIM_CAPACITY, INITIAL_CLAIMS)
    }

    /// A pool with explicit capacity and seed, for tests.
    #[must_use]
    pub fn with_capacity(capacity: usize, seed: usize) -> Self {
        let (slots, free) = async_channel::bounded(capacity);
        for _ in 0..seed.min(capacity) {
            if slots.try_send(Claim { _permit: () }).is_err() {
                tracing::error!("claim pool seeded past capacity");
            }
        }
        Self { slots, free }
    }

    /// Wait for a claim to become available. `None` only if the pool has
    /// been dropped entirely.
    pub async fn acquire(&self) -> Option<Claim> {
        self.free.recv().await.ok()
    }

    /// Return a claim immediately.
    pub fn release(&self, claim: Claim) {
        if self.slots.try_send(claim).is_err() {
            tracing::error!("claim released into a full pool");
        }
    }

    /// Return a claim after `delay`, exactly once, no earlier.
    pub fn release_after(&self, claim: Claim, delay: Duration) {
        let slots = self.slots.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if slots.try_send(claim).is_err() {
                tracing::error!("claim released into a full pool");
            }
        });
    }

    /// Wrap a claim for a live session. The handle releases it at most once.
    #[must_use]
    pub fn handle(&self, claim: Claim) -> ClaimHandle {
        ClaimHandle {
            inner: Arc::new(HandleInner {
                released: AtomicBool::new(false),
                claim: std::sync::Mutex::new(Some(claim)),
                slots: self.slots.clone(),
            }),
        }
    }

    /// Claims currently idle in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.len()
    }
}

impl Default for ClaimPool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct HandleInner {
    released: AtomicBool,
    claim: std::sync::Mutex<Option<Claim>>,
    slots: async_channel::Sender<Claim>,
}

/// A once-guarded release for the claim held by a live session.
#[derive(Debug, Clone)]
pub struct ClaimHandle {
    inner: Arc<HandleInner>,
}

impl ClaimHandle {
    fn take(&self) -> Option<Claim> {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.inner
            .claim
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
    }

    /// Return the claim now. Later calls, on any clone, are no-ops.
    pub fn release_now(&self) {
        if let Some(claim) = self.take() {
            if self.inner.slots.try_send(claim).is_err() {
                tracing::error!("claim released into a full pool");
            }
        }
    }

    /// Return the claim after `delay`. Later calls, on any clone, are no-ops.
    pub fn release_after(&self, delay: Duration) {
        if let Some(claim) = self.take() {
            let slots = self.inner.slots.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if slots.try_send(claim).is_err() {
                    tracing::error!("claim released into a full pool");
                }
            });
        }
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}
