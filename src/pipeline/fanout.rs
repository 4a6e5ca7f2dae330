use futures::stream;
use indicatif::ProgressBar;
use tracing::info;

use super::params::UploadParameter;
use super::retry::{RetryPolicy, retry};
use super::runner::{Deadline, run_bounded_until};
use crate::config::BucketSet;
use crate::error::{DeployError, Result};
use crate::s3::{ObjectStore, UploadedObject};

/// Concurrent uploads across all buckets of one group
pub const UPLOAD_CONCURRENCY: usize = 25;

/// Upload one file to one bucket, retrying per `policy`
async fn upload_task(
    store: &dyn ObjectStore,
    bucket: &str,
    param: &UploadParameter,
    policy: &RetryPolicy,
    progress: Option<&ProgressBar>,
) -> Result<UploadedObject> {
    let label = format!("s3://{}/{}", bucket, param.object_key);

    let uploaded = retry(policy, &label, || store.put_file(bucket, param))
        .await
        .map_err(|e| DeployError::RetriesExhausted {
            bucket: bucket.to_string(),
            key: param.object_key.clone(),
            attempts: policy.attempts(),
            source: Box::new(e),
        })?;

    info!("Uploaded {}/{}", uploaded.bucket, uploaded.key);
    if let Some(pb) = progress {
        pb.inc(1);
    }

    Ok(uploaded)
}

/// Upload every parameter to every bucket: `|buckets| x |params|` tasks,
/// bucket by bucket, with at most `concurrency` in flight.
///
/// No upload starts after `deadline`; uploads already running finish first.
pub async fn upload_all(
    store: &dyn ObjectStore,
    params: &[UploadParameter],
    buckets: &BucketSet,
    policy: &RetryPolicy,
    concurrency: usize,
    progress: Option<&ProgressBar>,
    deadline: Option<Deadline>,
) -> Result<Vec<UploadedObject>> {
    let tasks = stream::iter(buckets.iter().flat_map(move |bucket| {
        params
            .iter()
            .map(move |param| Ok(upload_task(store, bucket, param, policy, progress)))
    }));

    run_bounded_until(tasks, concurrency, deadline).await
}
