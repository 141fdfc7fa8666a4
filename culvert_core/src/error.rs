//! Error types.

use thiserror::Error;

/// A frame could not be decoded or encoded.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Not valid JSON, or not serializable.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON, but neither a request, a notification, nor a response.
    #[error("frame is neither request, notification, nor response")]
    Unclassifiable,
}

/// Problem completing a forwarded call.
#[derive(Debug, Error)]
pub enum CallError {
    /// The downstream request could not be encoded.
    #[error("request could not be encoded: {0}")]
    Encode(#[from] CodecError),

    /// Downstream outbound queue closed — its write pump has stopped.
    #[error("downstream queue closed")]
    DownstreamClosed,

    /// Timed out waiting for the downstream response.
    #[error("timed out waiting for response")]
    Timeout,

    /// Response channel dropped before a reply arrived.
    #[error("response dropped")]
    ResponseDropped,
}
