use std::fmt;
use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{error, info, warn};

use super::fanout::{UPLOAD_CONCURRENCY, upload_all};
use super::params::build_upload_parameter;
use super::partition::partition;
use super::redirect::reconcile_all;
use super::retry::{RetryPolicy, retry};
use super::runner::Deadline;
use super::version::write_version_marker;
use super::walk::walk_files;
use crate::config::{BucketSet, UploadConfig};
use crate::error::{DeployError, Result};
use crate::s3::{ObjectStore, UploadedObject};

/// Stages of one upload run. Each one starts only if the previous succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Walk,
    UploadVersioned,
    UploadUnversioned,
    Redirects,
    VersionMarker,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Walk => "walk",
            Stage::UploadVersioned => "upload versioned",
            Stage::UploadUnversioned => "upload unversioned",
            Stage::Redirects => "redirects",
            Stage::VersionMarker => "version marker",
        };
        f.write_str(name)
    }
}

/// What a successful run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub versioned_files: usize,
    pub unversioned_files: usize,
    pub uploads: Vec<UploadedObject>,
    pub redirected_buckets: Vec<String>,
    pub version_markers: Vec<String>,
}

impl DeployReport {
    pub fn total_bytes(&self) -> u64 {
        self.uploads.iter().map(|u| u.bytes).sum()
    }
}

/// Uploads a build directory to a set of buckets.
///
/// Versioned files go up first, across every bucket, then unversioned ones,
/// so an index page never goes live before the assets it references. Redirect
/// rules are reconciled only once every upload has succeeded.
pub struct Deployer {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
    upload_concurrency: usize,
    progress: Option<ProgressBar>,
}

impl Deployer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
            upload_concurrency: UPLOAD_CONCURRENCY,
            progress: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// At most [`UPLOAD_CONCURRENCY`] uploads run at once, whatever is asked for
    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency.clamp(1, UPLOAD_CONCURRENCY);
        self
    }

    /// Tick `progress` once per completed (bucket, file) upload
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Upload `config.local_dir` to the dev, staging and production buckets
    pub async fn upload_to_all_environments(&self, config: &UploadConfig) -> Result<DeployReport> {
        self.upload_to_buckets(&BucketSet::all_environments(), config)
            .await
    }

    /// Upload `config.local_dir` to every bucket in `buckets`.
    ///
    /// Configuration is validated before any network call. Returns the
    /// first failure of any stage; later stages do not run. Once
    /// `config.timeout` passes no new upload starts, the ones in flight
    /// finish, and [`DeployError::Timeout`] is returned.
    pub async fn upload_to_buckets(
        &self,
        buckets: &BucketSet,
        config: &UploadConfig,
    ) -> Result<DeployReport> {
        config.validate()?;

        let deadline = config.timeout.map(Deadline::after);
        self.run(buckets, config, deadline).await
    }

    async fn run(
        &self,
        buckets: &BucketSet,
        config: &UploadConfig,
        deadline: Option<Deadline>,
    ) -> Result<DeployReport> {
        let store = self.store.as_ref();
        let version = config.active_version();
        let progress = self.progress.as_ref();
        let failed = |stage: Stage| move |e: &DeployError| error!("Stage '{}' failed: {}", stage, e);
        let in_time = |stage: Stage| deadline.map_or(Ok(()), |d| d.check()).inspect_err(failed(stage));

        info!("Stage '{}': {}", Stage::Walk, config.local_dir.display());
        let params = walk_files(&config.local_dir)
            .map(|file| {
                build_upload_parameter(&config.local_dir, &file?, config.prefix.as_deref(), version)
            })
            .collect::<Result<Vec<_>>>()
            .inspect_err(failed(Stage::Walk))?;
        in_time(Stage::Walk)?;

        let groups = partition(params, version);
        info!(
            "Found {} files ({} versioned, {} unversioned) for {} bucket(s)",
            groups.len(),
            groups.versioned.len(),
            groups.unversioned.len(),
            buckets.len()
        );
        if let Some(pb) = progress {
            pb.set_length((groups.len() * buckets.len()) as u64);
        }

        let mut report = DeployReport {
            versioned_files: groups.versioned.len(),
            unversioned_files: groups.unversioned.len(),
            ..Default::default()
        };

        for (stage, group) in [
            (Stage::UploadVersioned, &groups.versioned),
            (Stage::UploadUnversioned, &groups.unversioned),
        ] {
            in_time(stage)?;
            info!("Stage '{}': {} file(s)", stage, group.len());
            let uploaded = upload_all(
                store,
                group,
                buckets,
                &self.retry,
                self.upload_concurrency,
                progress,
                deadline,
            )
            .await
            .inspect_err(failed(stage))?;
            report.uploads.extend(uploaded);
        }

        in_time(Stage::Redirects)?;
        info!("Stage '{}': {} rule(s)", Stage::Redirects, config.redirects.len());
        report.redirected_buckets = reconcile_all(store, buckets, &config.redirects, deadline)
            .await
            .inspect_err(failed(Stage::Redirects))?;

        if config.write_version_marker {
            match version {
                Some(version) => {
                    info!("Stage '{}': {}", Stage::VersionMarker, version);
                    for bucket in buckets.iter() {
                        in_time(Stage::VersionMarker)?;
                        let label = format!("s3://{}/version.json", bucket);
                        retry(&self.retry, &label, || {
                            write_version_marker(store, bucket, version)
                        })
                        .await
                        .inspect_err(failed(Stage::VersionMarker))?;
                        report.version_markers.push(bucket.to_string());
                    }
                }
                None => warn!("No version given, not writing version markers"),
            }
        }

        Ok(report)
    }
}

/// Upload `config.local_dir` to `buckets` through `store` with default settings
pub async fn upload_to_buckets(
    store: Arc<dyn ObjectStore>,
    buckets: &BucketSet,
    config: &UploadConfig,
) -> Result<DeployReport> {
    Deployer::new(store).upload_to_buckets(buckets, config).await
}
