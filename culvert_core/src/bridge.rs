//! The typed forwarding mode.
//!
//! One dispatch loop per leg classifies inbound frames against the
//! [`MethodTable`]: requests become correlated calls to the other leg,
//! notifications cross one-way, responses settle pending calls. The upload
//! trigger is acknowledged immediately and its transfer runs out of band.
//!
//! A forwarded call that times out or cannot be delivered answers the
//! original caller with the method's registered zero-value response; a
//! downstream *error response* is an answer, and crosses back verbatim.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{self, Either};
use futures::lock::Mutex;
use futures_timer::Delay;
use serde_json::{json, Value};

use crate::claim::ClaimHandle;
use crate::coordinator::SessionRunner;
use crate::error::CallError;
use crate::message::{CallId, Frame};
use crate::method::{Flow, MethodBinding, MethodTable};
use crate::session::{Leg, Role, SessionPair};
use crate::upload::{FileRelay, UploadJob};
use crate::CALL_DEADLINE;

/// A settled downstream answer, result or error, as received.
#[derive(Debug)]
struct Answer {
    result: Option<Value>,
    error: Option<Value>,
}

type Pending = Mutex<HashMap<u64, oneshot::Sender<Answer>>>;

/// Bookkeeping for one live session.
struct SessionState<F> {
    table: Arc<MethodTable>,
    relay: Arc<F>,
    call_deadline: Duration,
    id_counter: Mutex<u64>,
    /// Calls forwarded to the device leg, keyed by downstream id.
    pending_to_device: Pending,
    /// Calls forwarded to the cloud leg, keyed by downstream id.
    pending_to_cloud: Pending,
}

impl<F> SessionState<F> {
    fn pending_to(&self, role: Role) -> &Pending {
        match role {
            Role::Device => &self.pending_to_device,
            Role::Cloud => &self.pending_to_cloud,
        }
    }

    async fn next_id(&self) -> u64 {
        let mut counter = self.id_counter.lock().await;
        *counter = counter.wrapping_add(1);
        *counter
    }
}

/// Typed session runner over a static [`MethodTable`].
#[derive(Debug)]
pub struct RpcBridge<F> {
    table: Arc<MethodTable>,
    relay: Arc<F>,
    call_deadline: Duration,
}

impl<F> Clone for RpcBridge<F> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            relay: self.relay.clone(),
            call_deadline: self.call_deadline,
        }
    }
}

impl<F> RpcBridge<F> {
    #[must_use]
    pub fn new(table: MethodTable, relay: F) -> Self {
        Self {
            table: Arc::new(table),
            relay: Arc::new(relay),
            call_deadline: CALL_DEADLINE,
        }
    }

    /// Override the forwarded-call deadline, for tests.
    #[must_use]
    pub fn with_call_deadline(mut self, deadline: Duration) -> Self {
        self.call_deadline = deadline;
        self
    }
}

impl<F: FileRelay + Send + Sync + 'static> SessionRunner for RpcBridge<F> {
    async fn run(&self, session: SessionPair, claim: ClaimHandle) {
        let state = Arc::new(SessionState {
            table: self.table.clone(),
            relay: self.relay.clone(),
            call_deadline: self.call_deadline,
            id_counter: Mutex::new(rand::random::<u64>()),
            pending_to_device: Mutex::new(HashMap::new()),
            pending_to_cloud: Mutex::new(HashMap::new()),
        });

        let device_loop = dispatch(
            state.clone(),
            session.device.clone(),
            session.cloud.clone(),
            None,
            session.clone(),
        );
        let cloud_loop = dispatch(
            state,
            session.cloud.clone(),
            session.device.clone(),
            Some(claim),
            session.clone(),
        );
        futures::join!(device_loop, cloud_loop);
    }
}

/// Classify frames arriving on `from` until its inbound queue closes, then
/// tear down the pair.
async fn dispatch<F: FileRelay + Send + Sync + 'static>(
    state: Arc<SessionState<F>>,
    from: Leg,
    to: Leg,
    claim: Option<ClaimHandle>,
    session: SessionPair,
) {
    let mut claim = claim;
    loop {
        let Ok(raw) = from.inbound().recv().await else {
            break;
        };
        if let Some(claim) = claim.take() {
            tracing::debug!("first cloud message, connection claimed");
            claim.release_now();
        }

        let frame = match Frame::decode(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(leg = %from.role(), error = %e, "dropping undecodable frame");
                continue;
            }
        };

        match frame {
            Frame::Request { id, method, params } => match state.table.get(&method) {
                Some(MethodBinding::Call { flow, zero_response })
                    if *flow == Flow::from_role(from.role()) =>
                {
                    let state = state.clone();
                    let from = from.clone();
                    let to = to.clone();
                    let zero = zero_response.clone();
                    tokio::spawn(async move {
                        forward_call(state, from, to, id, method, params, zero).await;
                    });
                }
                Some(MethodBinding::Upload) if from.role() == Role::Cloud => {
                    handle_upload(&state, &from, id, params).await;
                }
                Some(_) => {
                    tracing::warn!(leg = %from.role(), %method, "request bound the other way, dropping");
                }
                None => {
                    tracing::warn!(leg = %from.role(), %method, "request for unbound method, dropping");
                }
            },
            Frame::Notification { ref method, .. } => match state.table.get(method) {
                Some(MethodBinding::Notify { flow }) if *flow == Flow::from_role(from.role()) => {
                    if to.outbound().send(raw).await.is_err() {
                        break;
                    }
                }
                Some(_) => {
                    tracing::warn!(leg = %from.role(), %method, "notification bound the other way, dropping");
                }
                None => {
                    tracing::warn!(leg = %from.role(), %method, "notification for unbound method, dropping");
                }
            },
            Frame::Response { id, result, error } => {
                let CallId::Number(id) = id else {
                    tracing::debug!(leg = %from.role(), %id, "unmatched response, dropping");
                    continue;
                };
                match state.pending_to(from.role()).lock().await.remove(&id) {
                    Some(waiting) => {
                        let _ = waiting.send(Answer { result, error });
                    }
                    None => {
                        tracing::debug!(leg = %from.role(), id, "unmatched response, dropping");
                    }
                }
            }
        }
    }

    tracing::debug!(leg = %from.role(), "bridge dispatch stopped");
    session.close();
}

/// Forward one request from `from` to `to` and deliver the answer back under
/// the original caller id.
async fn forward_call<F: FileRelay>(
    state: Arc<SessionState<F>>,
    from: Leg,
    to: Leg,
    caller_id: CallId,
    method: String,
    params: Option<Value>,
    zero_response: Value,
) {
    let answer = match call_downstream(&state, &to, &method, params).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(%method, error = %e, "forwarded call failed, answering with zero value");
            Answer {
                result: Some(zero_response),
                error: None,
            }
        }
    };

    let reply = Frame::Response {
        id: caller_id,
        result: answer.result,
        error: answer.error,
    };
    match reply.encode() {
        Ok(raw) => {
            if from.outbound().send(raw).await.is_err() {
                tracing::debug!(%method, "caller leg gone before the response could be delivered");
            }
        }
        Err(e) => tracing::warn!(%method, error = %e, "failed to encode response"),
    }
}

/// Issue a fresh correlated request on `to` and wait out its deadline.
async fn call_downstream<F>(
    state: &SessionState<F>,
    to: &Leg,
    method: &str,
    params: Option<Value>,
) -> Result<Answer, CallError> {
    let downstream_id = state.next_id().await;
    let raw = Frame::request(downstream_id, method, params).encode()?;

    let (tx, rx) = oneshot::channel();
    state
        .pending_to(to.role())
        .lock()
        .await
        .insert(downstream_id, tx);

    if to.outbound().send(raw).await.is_err() {
        state.pending_to(to.role()).lock().await.remove(&downstream_id);
        return Err(CallError::DownstreamClosed);
    }

    match timeout(state.call_deadline, rx).await {
        Ok(Ok(answer)) => Ok(answer),
        Ok(Err(oneshot::Canceled)) => Err(CallError::ResponseDropped),
        Err(TimedOut) => {
            state.pending_to(to.role()).lock().await.remove(&downstream_id);
            Err(CallError::Timeout)
        }
    }
}

/// Acknowledge the upload trigger and spawn the transfer.
async fn handle_upload<F: FileRelay + Send + Sync + 'static>(
    state: &Arc<SessionState<F>>,
    from: &Leg,
    id: CallId,
    params: Option<Value>,
) {
    let reply = match serde_json::from_value::<UploadJob>(params.unwrap_or(Value::Null)) {
        Ok(job) => {
            tracing::info!(root = %job.root, path = %job.path, id = %job.download_id, "upload triggered");
            let relay = state.relay.clone();
            tokio::spawn(async move {
                if let Err(e) = relay.transfer(job).await {
                    tracing::warn!(error = %e, "upload failed");
                }
            });
            Frame::response(id, json!({ "status": 200 }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "malformed upload trigger");
            Frame::error_response(id, json!({ "code": -32602, "message": "Invalid params" }))
        }
    };

    match reply.encode() {
        Ok(raw) => {
            let _ = from.outbound().send(raw).await;
        }
        Err(e) => tracing::warn!(error = %e, "failed to encode upload acknowledgment"),
    }
}

#[derive(Debug, Clone, Copy)]
struct TimedOut;

async fn timeout<F: Future<Output = T> + Unpin, T>(dur: Duration, fut: F) -> Result<T, TimedOut> {
    match future::select(fut, Delay::new(dur)).await {
        Either::Left((val, _delay)) => Ok(val),
        Either::Right(_) => Err(TimedOut),
    }
}
