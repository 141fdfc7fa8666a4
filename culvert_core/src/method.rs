//! The method table: the single source of truth for the RPC surface exposed
//! across the tunnel.
//!
//! Each forwarded method is registered once at startup as a [`MethodBinding`]
//! capability; dispatch is a lookup keyed by method identity. Directions are
//! fixed at registration and never change afterwards.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::session::Role;

/// Forwarding direction of a bound method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    CloudToDevice,
    DeviceToCloud,
}

impl Flow {
    /// The flow that carries traffic arriving on a leg with role `from`.
    #[must_use]
    pub fn from_role(from: Role) -> Self {
        match from {
            Role::Cloud => Flow::CloudToDevice,
            Role::Device => Flow::DeviceToCloud,
        }
    }
}

/// What the bridge may do with a method.
#[derive(Debug, Clone)]
pub enum MethodBinding {
    /// Request/response, forwarded along `flow` and answered within the call
    /// deadline. `zero_response` is delivered to the caller when the
    /// downstream call fails or times out.
    Call { flow: Flow, zero_response: Value },

    /// One-way along `flow`; at-most-once, no acknowledgment, no retry.
    Notify { flow: Flow },

    /// The upload trigger: acknowledged immediately on the cloud leg, the
    /// transfer itself runs out of band.
    Upload,
}

/// Registration table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    bindings: HashMap<String, MethodBinding>,
}

impl MethodTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request/response method. The response type supplies the
    /// zero value answered when the downstream call fails.
    #[must_use]
    pub fn call<R: Default + Serialize>(mut self, method: impl Into<String>, flow: Flow) -> Self {
        let zero_response = match serde_json::to_value(R::default()) {
            Ok(zero) => zero,
            Err(e) => {
                tracing::error!(error = %e, "zero response is not serializable");
                Value::Null
            }
        };
        self.bindings
            .insert(method.into(), MethodBinding::Call { flow, zero_response });
        self
    }

    /// Register a one-way notification method.
    #[must_use]
    pub fn notify(mut self, method: impl Into<String>, flow: Flow) -> Self {
        self.bindings
            .insert(method.into(), MethodBinding::Notify { flow });
        self
    }

    /// Register the upload trigger method.
    #[must_use]
    pub fn upload(mut self, method: impl Into<String>) -> Self {
        self.bindings.insert(method.into(), MethodBinding::Upload);
        self
    }

    #[must_use]
    pub fn get(&self, method: &str) -> Option<&MethodBinding> {
        self.bindings.get(method)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
