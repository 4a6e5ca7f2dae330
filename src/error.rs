use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Boxed source error carried by variants that wrap SDK or I/O failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while deploying build assets to object storage
#[derive(Error, Debug)]
pub enum DeployError {
    /// A single file-to-bucket transfer failed. Retried before it becomes fatal.
    #[error("Failed to upload {} to s3://{bucket}/{key}: {source}", path.display())]
    Upload {
        bucket: String,
        key: String,
        path: PathBuf,
        source: BoxError,
    },

    /// A transfer kept failing after every attempt allowed by the retry policy
    #[error("Gave up on s3://{bucket}/{key} after {attempts} attempts: {source}")]
    RetriesExhausted {
        bucket: String,
        key: String,
        attempts: u32,
        source: Box<DeployError>,
    },

    /// Walking the local build directory failed part way through
    #[error("Failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Fetching a bucket's website configuration failed
    #[error("Failed to fetch website configuration of bucket '{bucket}': {source}")]
    RedirectFetch { bucket: String, source: BoxError },

    /// Writing a bucket's website configuration failed
    #[error("Failed to update website configuration of bucket '{bucket}': {source}")]
    RedirectPut { bucket: String, source: BoxError },

    /// Reading an object failed
    #[error("Failed to download s3://{bucket}/{key}: {source}")]
    Download {
        bucket: String,
        key: String,
        source: BoxError,
    },

    /// The version marker was missing fields or was not valid JSON
    #[error("Invalid version marker in bucket '{bucket}': {source}")]
    VersionMarker {
        bucket: String,
        source: serde_json::Error,
    },

    /// The whole run exceeded the caller supplied timeout
    #[error("Deployment timed out after {0:?}")]
    Timeout(Duration),

    /// Access key id or secret access key is missing
    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    /// Bucket name is not a valid S3 bucket name
    #[error("Invalid bucket '{bucket}': {reason}")]
    InvalidBucket { bucket: String, reason: String },

    /// Object key prefix is not a clean relative path
    #[error("Invalid prefix '{prefix}': {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    /// A redirect map entry is malformed
    #[error("Invalid redirect '{entry}': {reason}")]
    InvalidRedirect { entry: String, reason: String },

    /// The local build directory cannot be read
    #[error("Local directory {} is not readable: {reason}", path.display())]
    LocalDirUnreadable { path: PathBuf, reason: String },

    /// Any other configuration problem
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeployError {
    /// Configuration errors are raised before any network call is attempted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials(_)
                | Self::InvalidBucket { .. }
                | Self::InvalidPrefix { .. }
                | Self::InvalidRedirect { .. }
                | Self::LocalDirUnreadable { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingCredentials(what) => {
                format!(
                    "Missing credentials: {}\n\nPossible solutions:\n  \
                     1. Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY in .env\n  \
                     2. Export them in the shell that runs the deploy",
                    what
                )
            }
            Self::LocalDirUnreadable { path, reason } => {
                format!(
                    "Local directory {} is not readable: {}\n\nPossible solutions:\n  \
                     1. Run the build before deploying\n  \
                     2. Check permissions: ls -ld {}",
                    path.display(),
                    reason,
                    path.display()
                )
            }
            Self::RetriesExhausted {
                bucket,
                key,
                attempts,
                source,
            } => {
                format!(
                    "Upload of s3://{}/{} failed {} times: {}\n\nPossible solutions:\n  \
                     1. Check your network connection\n  \
                     2. Verify write access: aws s3 ls s3://{}\n  \
                     3. Re-run the deploy, uploads are safe to repeat",
                    bucket, key, attempts, source, bucket
                )
            }
            Self::RedirectFetch { bucket, source } | Self::RedirectPut { bucket, source } => {
                format!(
                    "Redirect rules of bucket '{}' were not updated: {}\n\nPossible solutions:\n  \
                     1. Ensure static website hosting is enabled on the bucket\n  \
                     2. Verify s3:GetBucketWebsite and s3:PutBucketWebsite permissions",
                    bucket, source
                )
            }
            Self::Timeout(limit) => {
                format!(
                    "Deployment timed out after {:?}\n\nPossible solutions:\n  \
                     1. Raise the limit with --timeout\n  \
                     2. Re-run the deploy, uploads are safe to repeat",
                    limit
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for deploy operations
pub type Result<T> = std::result::Result<T, DeployError>;
