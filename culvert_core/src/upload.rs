//! The upload side channel.
//!
//! A cloud-initiated request names a file on the device side and a
//! destination identifier; the bridge acknowledges immediately and hands the
//! actual transfer to a [`FileRelay`]. Jobs are fire-and-forget: they run to
//! completion or failure independently of the session that spawned them and
//! are not tracked after dispatch.

use std::future::Future;

use serde::Deserialize;

/// One requested transfer, parsed from the trigger's params.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadJob {
    /// Root the path is relative to (e.g. a named file store).
    pub root: String,
    /// Path of the file below `root`.
    pub path: String,
    /// Opaque destination identifier supplied by the caller.
    pub download_id: String,
}

/// Moves one file from the device side to the cloud side.
///
/// Implementations fetch from the device leg's file-serving endpoint and
/// deliver to the cloud leg's ingestion endpoint. Failures are the caller's
/// to log; the triggering request was already acknowledged.
pub trait FileRelay {
    type Error: std::error::Error + Send + Sync + 'static;

    fn transfer(&self, job: UploadJob) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_parses_from_trigger_params() {
        let job: UploadJob = serde_json::from_value(json!({
            "root": "gcodes",
            "path": "parts/bracket.gcode",
            "download_id": "d-1142",
        }))
        .unwrap();
        assert_eq!(job.root, "gcodes");
        assert_eq!(job.path, "parts/bracket.gcode");
        assert_eq!(job.download_id, "d-1142");
    }

    #[test]
    fn job_rejects_missing_fields() {
        let malformed = serde_json::from_value::<UploadJob>(json!({"root": "gcodes"}));
        assert!(malformed.is_err());
    }
}
