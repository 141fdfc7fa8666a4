//! Error types.

use thiserror::Error;

/// A leg could not be established.
#[derive(Debug, Error)]
pub enum DialError {
    /// WebSocket connect/handshake error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The handshake did not complete within the configured timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

/// A credential could not be carried as an HTTP header.
#[derive(Debug, Error)]
#[error("credential is not a valid header value")]
pub struct InvalidCredentials(#[from] tungstenite::http::header::InvalidHeaderValue);
