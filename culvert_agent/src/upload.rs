//! HTTP implementation of the upload side channel.
//!
//! Fetches the requested file from the device controller's file endpoint and
//! posts it to the cloud ingestion endpoint, tagged with the caller-supplied
//! identifier, through the credentialed client.

use culvert_core::upload::{FileRelay, UploadJob};
use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct UploadError(#[from] reqwest::Error);

#[derive(Debug, Clone)]
pub struct HttpFileRelay {
    client: reqwest::Client,
    device_files: String,
    cloud: String,
}

impl HttpFileRelay {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        device_files: impl Into<String>,
        cloud: impl Into<String>,
    ) -> Self {
        Self {
            client,
            device_files: device_files.into(),
            cloud: cloud.into(),
        }
    }
}

impl FileRelay for HttpFileRelay {
    type Error = UploadError;

    async fn transfer(&self, job: UploadJob) -> Result<(), UploadError> {
        let source = format!("{}/{}/{}", self.device_files, job.root, job.path);
        tracing::info!(%source, "starting upload");

        let file = self
            .client
            .get(&source)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)?;
        let content_type = file.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let body = file.bytes().await?;

        let mut request = self
            .client
            .post(format!("{}/api/download", self.cloud))
            .query(&[("download-id", job.download_id.as_str())])
            .body(body);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)?;

        tracing::info!(id = %job.download_id, "upload complete");
        Ok(())
    }
}
