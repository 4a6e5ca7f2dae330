use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::params::object_headers;
use crate::error::{DeployError, Result};
use crate::s3::{ObjectStore, UploadedObject};

/// Key of the version marker in every bucket
pub const VERSION_MARKER_KEY: &str = "version.json";

/// `{"version": "<string>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub version: String,
}

/// Write `version.json` to `bucket`.
///
/// The marker is overwritten by every release, so it gets the short-lived
/// cache directive.
pub async fn write_version_marker(
    store: &dyn ObjectStore,
    bucket: &str,
    version: &str,
) -> Result<UploadedObject> {
    let marker = VersionMarker {
        version: version.to_string(),
    };
    let body = serde_json::to_vec(&marker).map_err(|source| DeployError::VersionMarker {
        bucket: bucket.to_string(),
        source,
    })?;

    let headers = object_headers(Path::new(VERSION_MARKER_KEY), false);

    let uploaded = store
        .put_bytes(bucket, VERSION_MARKER_KEY, body, &headers)
        .await?;
    info!("Marked {} as version {}", bucket, version);
    Ok(uploaded)
}

/// Read the version recorded in `bucket`'s `version.json`
pub async fn read_version(store: &dyn ObjectStore, bucket: &str) -> Result<String> {
    let body = store.get_object(bucket, VERSION_MARKER_KEY).await?;
    let marker: VersionMarker =
        serde_json::from_slice(&body).map_err(|source| DeployError::VersionMarker {
            bucket: bucket.to_string(),
            source,
        })?;
    Ok(marker.version)
}
