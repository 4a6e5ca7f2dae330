//! Deploy static build output to object-storage buckets.
//!
//! A build directory is uploaded to every bucket of a [`BucketSet`]:
//! versioned assets first with a ten-year cache directive, then everything
//! else with a five-minute one, after which each bucket's redirect rules are
//! replaced. See [`Deployer`].

pub mod config;
pub mod error;
pub mod pipeline;
pub mod s3;

pub use config::{BucketSet, Credentials, RedirectMap, UploadConfig};
pub use error::{DeployError, Result};
pub use pipeline::{DeployReport, Deployer, RetryPolicy, UploadParameter, upload_to_buckets};
pub use s3::{MemoryStore, ObjectStore, S3Client};
