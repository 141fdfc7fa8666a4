//! Dialing both legs as a unit.

use culvert_core::coordinator::Dial;
use culvert_core::session::{Role, SessionPair};
use tokio_util::sync::CancellationToken;
use tungstenite::http::Uri;

use crate::credentials::Credentials;
use crate::error::DialError;
use crate::socket::{self, SocketConfig};

/// Establishes a device/cloud connection pair per dial attempt.
#[derive(Debug, Clone)]
pub struct PairDialer {
    device: Uri,
    cloud: Uri,
    credentials: Credentials,
    config: SocketConfig,
    shutdown: CancellationToken,
}

impl PairDialer {
    #[must_use]
    pub fn new(
        device: Uri,
        cloud: Uri,
        credentials: Credentials,
        config: SocketConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            device,
            cloud,
            credentials,
            config,
            shutdown,
        }
    }
}

impl Dial for PairDialer {
    type Error = DialError;

    /// Cloud first, then device; a device-dial failure closes the already
    /// open cloud leg so nothing leaks.
    async fn dial(&self) -> Result<SessionPair, DialError> {
        let cloud = socket::dial(
            &self.cloud,
            Role::Cloud,
            &self.credentials,
            &self.config,
            &self.shutdown,
        )
        .await?;

        let device = match socket::dial(
            &self.device,
            Role::Device,
            &Credentials::none(),
            &self.config,
            &self.shutdown,
        )
        .await
        {
            Ok(leg) => leg,
            Err(e) => {
                cloud.close();
                return Err(e);
            }
        };

        Ok(SessionPair { device, cloud })
    }
}
