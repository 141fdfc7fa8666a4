//! Opaque dial credentials.
//!
//! The cloud leg authenticates with a session cookie obtained out of band;
//! the transport never inspects or refreshes it, it only attaches the
//! headers to the handshake request. The device leg dials with no
//! credentials at all.

use tungstenite::http::header::{HeaderName, HeaderValue, COOKIE};
use tungstenite::http::HeaderMap;

use crate::error::InvalidCredentials;

/// A read-only set of headers attached to every dial using it.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Credentials {
    /// No credentials; used for the device leg.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A session cookie for the cloud handshake.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCredentials`] if the cookie cannot be carried as a
    /// header value.
    pub fn cookie(value: &str) -> Result<Self, InvalidCredentials> {
        Ok(Self {
            headers: vec![(COOKIE, HeaderValue::from_str(value)?)],
        })
    }

    pub(crate) fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }
}
