//! OAuth device-code flow against the cloud.
//!
//! The operator authorizes the device once through a browser; afterwards the
//! stored refresh token is exchanged silently on every start. The final step
//! trades the id token for a session cookie, which becomes the opaque dial
//! credential for the cloud leg.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::cookie::{CookieStore, Jar};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Token;

const CODE_PATH: &str = "/auth/get_code";
const TOKEN_PATH: &str = "/auth/get_token";
const CHECK_TOKEN_PATH: &str = "/auth/check_token";
const DEVICE_GRANT: &str = "http://oauth.net/grant_type/device/1.0";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("authorization not granted before the code expired")]
    TimedOut,

    #[error("token request rejected: {0}")]
    Rejected(String),

    #[error("cloud issued no session cookie")]
    NoSessionCookie,

    #[error("invalid endpoint url: {0}")]
    BadUrl(String),
}

/// What the operator needs to authorize the device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_url: String,
    pub expires_in: u64,
    pub interval: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenFailure {
    error: String,
}

impl TokenResponse {
    /// A refresh response keeps the refresh token it was issued from.
    fn into_token(self, previous_refresh: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in),
            refresh_token: self.refresh_token.or(previous_refresh).unwrap_or_default(),
            id_token: self.id_token,
        }
    }
}

/// Request a fresh device code.
///
/// # Errors
///
/// Returns [`AuthError`] if the endpoint is unreachable or answers badly.
pub async fn fetch_device_code(
    client: &reqwest::Client,
    hostname: &str,
) -> Result<DeviceCode, AuthError> {
    let response = client
        .get(format!("{hostname}{CODE_PATH}"))
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

/// Poll the token endpoint at the server-announced interval until the
/// operator authorizes the device or the code expires.
///
/// # Errors
///
/// Returns [`AuthError::TimedOut`] past the code's expiry, or
/// [`AuthError::Rejected`] on any terminal grant error.
pub async fn poll_token(
    client: &reqwest::Client,
    hostname: &str,
    code: &DeviceCode,
) -> Result<Token, AuthError> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(code.expires_in);
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + Duration::from_secs(code.interval),
        Duration::from_secs(code.interval),
    );

    loop {
        if tokio::time::timeout_at(deadline, ticker.tick()).await.is_err() {
            return Err(AuthError::TimedOut);
        }

        let response = client
            .post(format!("{hostname}{TOKEN_PATH}"))
            .form(&[
                ("device_code", code.device_code.as_str()),
                ("grant_type", DEVICE_GRANT),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            let granted: TokenResponse = response.json().await?;
            tracing::info!("device authorized");
            return Ok(granted.into_token(None));
        }

        let failure: TokenFailure = response.json().await?;
        match failure.error.as_str() {
            "authorization_pending" => {}
            "slow_down" => tracing::debug!("token endpoint asked to slow down"),
            other => return Err(AuthError::Rejected(other.to_string())),
        }
    }
}

/// Exchange the stored refresh token for a fresh access token.
///
/// # Errors
///
/// Returns [`AuthError::Rejected`] if the grant is refused.
pub async fn refresh_token(
    client: &reqwest::Client,
    hostname: &str,
    token: &Token,
) -> Result<Token, AuthError> {
    let response = client
        .post(format!("{hostname}{TOKEN_PATH}"))
        .form(&[
            ("refresh_token", token.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    if response.status().is_success() {
        let granted: TokenResponse = response.json().await?;
        tracing::info!("token refreshed");
        return Ok(granted.into_token(Some(token.refresh_token.clone())));
    }

    let failure: TokenFailure = response.json().await?;
    Err(AuthError::Rejected(failure.error))
}

/// Trade the id token for a session cookie.
///
/// Returns the credentialed HTTP client (reused for uploads) and the cookie
/// header value for WebSocket dials.
///
/// # Errors
///
/// Returns [`AuthError`] if the check is refused or no cookie was set.
pub async fn establish_session(
    hostname: &str,
    token: &Token,
) -> Result<(reqwest::Client, String), AuthError> {
    let jar = Arc::new(Jar::default());
    let client = reqwest::Client::builder()
        .cookie_provider(jar.clone())
        .build()?;

    client
        .post(format!("{hostname}{CHECK_TOKEN_PATH}"))
        .form(&[("google_token", token.id_token.as_str())])
        .send()
        .await?
        .error_for_status()?;

    let url: reqwest::Url = hostname
        .parse()
        .map_err(|_| AuthError::BadUrl(hostname.to_string()))?;
    let cookie = jar.cookies(&url).ok_or(AuthError::NoSessionCookie)?;
    let cookie = cookie
        .to_str()
        .map_err(|_| AuthError::NoSessionCookie)?
        .to_string();

    Ok((client, cookie))
}
