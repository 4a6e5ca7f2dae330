//! The bucketed multi-environment upload pipeline.
//!
//! Leaf to root: [`params`] maps files to keys and headers, [`partition`]
//! splits them by cache class, [`runner`] and [`retry`] execute tasks,
//! [`fanout`] turns files into per-bucket uploads, [`redirect`] rewrites
//! bucket routing rules and [`deploy`] strings the stages together.

pub mod deploy;
pub mod fanout;
pub mod params;
pub mod partition;
pub mod redirect;
pub mod retry;
pub mod runner;
pub mod version;
pub mod walk;

pub use deploy::{DeployReport, Deployer, Stage, upload_to_buckets};
pub use fanout::{UPLOAD_CONCURRENCY, upload_all};
pub use params::{
    ACL_HEADER, CACHE_CONTROL_HEADER, CONTENT_TYPE_HEADER, UNVERSIONED_CACHE_CONTROL,
    UploadParameter, VERSIONED_CACHE_CONTROL, build_upload_parameter, is_versioned,
};
pub use partition::{Partitioned, partition};
pub use redirect::{REDIRECT_CONCURRENCY, reconcile_all, reconcile_redirects};
pub use retry::{RetryPolicy, retry};
pub use runner::{Deadline, run_bounded, run_bounded_until};
pub use version::{VERSION_MARKER_KEY, VersionMarker, read_version, write_version_marker};
pub use walk::walk_files;
