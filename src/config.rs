use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DeployError, Result};

/// Region used when the caller does not pick one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Asset buckets for the dev, staging and production environments
pub const ENVIRONMENT_BUCKETS: [&str; 3] = ["mbq-assets-dev", "mbq-assets-stg", "mbq-assets-prd"];

/// Source key prefix to destination key. Applied to a bucket as a full
/// replacement of its routing rules.
pub type RedirectMap = BTreeMap<String, String>;

/// Static object-storage credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Load credentials from environment variables and .env file
    ///
    /// # Errors
    ///
    /// Returns an error if `AWS_ACCESS_KEY_ID` or `AWS_SECRET_ACCESS_KEY` is missing
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if it exists

        let access_key_id = env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| DeployError::MissingCredentials("AWS_ACCESS_KEY_ID is not set"))?;
        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| DeployError::MissingCredentials("AWS_SECRET_ACCESS_KEY is not set"))?;

        let credentials = Self::new(access_key_id, secret_access_key);
        credentials.validate()?;
        Ok(credentials)
    }

    fn validate(&self) -> Result<()> {
        if self.access_key_id.trim().is_empty() {
            return Err(DeployError::MissingCredentials("access key id is empty"));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(DeployError::MissingCredentials("secret access key is empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Ordered, de-duplicated list of target buckets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSet(Vec<String>);

impl BucketSet {
    /// Build a bucket set, validating every name against S3 naming rules
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut buckets: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            validate_bucket_name(&name)?;
            if buckets.contains(&name) {
                return Err(DeployError::InvalidBucket {
                    bucket: name,
                    reason: "listed more than once".to_string(),
                });
            }
            buckets.push(name);
        }

        if buckets.is_empty() {
            return Err(DeployError::InvalidConfig(
                "at least one bucket is required".to_string(),
            ));
        }

        Ok(Self(buckets))
    }

    /// The dev, staging and production asset buckets
    pub fn all_environments() -> Self {
        Self(ENVIRONMENT_BUCKETS.iter().map(|b| b.to_string()).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything one upload run needs, passed explicitly into the pipeline
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub credentials: Credentials,
    pub region: String,
    pub local_dir: PathBuf,
    /// Joined in front of every object key, e.g. `omd` or `frontend`
    pub prefix: Option<String>,
    pub redirects: RedirectMap,
    /// Active release version; files under a directory with this name are versioned
    pub version: Option<String>,
    /// Write `version.json` to every bucket once uploads and redirects succeed
    pub write_version_marker: bool,
    pub timeout: Option<Duration>,
}

impl UploadConfig {
    pub fn new(credentials: Credentials, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            region: DEFAULT_REGION.to_string(),
            local_dir: local_dir.into(),
            prefix: None,
            redirects: RedirectMap::new(),
            version: None,
            write_version_marker: false,
            timeout: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_redirects(mut self, redirects: RedirectMap) -> Self {
        self.redirects = redirects;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The version to classify against; an empty string means no version.
    pub fn active_version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }

    /// Validate everything that can be checked without touching the network
    ///
    /// # Errors
    ///
    /// Returns a configuration error for missing credentials, an unreadable
    /// local directory, an invalid prefix or a malformed redirect map
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;

        if self.region.trim().is_empty() {
            return Err(DeployError::InvalidConfig("region cannot be empty".to_string()));
        }

        if let Some(prefix) = &self.prefix {
            validate_prefix(prefix)?;
        }

        if let Some(version) = self.active_version() {
            if version.contains('/') || version.contains('\\') {
                return Err(DeployError::InvalidConfig(format!(
                    "version '{}' must be a single path segment",
                    version
                )));
            }
        }

        validate_redirects(&self.redirects)?;

        match std::fs::metadata(&self.local_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(DeployError::LocalDirUnreadable {
                    path: self.local_dir.clone(),
                    reason: "not a directory".to_string(),
                });
            }
            Err(e) => {
                return Err(DeployError::LocalDirUnreadable {
                    path: self.local_dir.clone(),
                    reason: e.to_string(),
                });
            }
        }
        std::fs::read_dir(&self.local_dir).map_err(|e| DeployError::LocalDirUnreadable {
            path: self.local_dir.clone(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}

/// Validate S3 bucket name according to AWS rules
fn validate_bucket_name(bucket: &str) -> Result<()> {
    let invalid = |reason: String| DeployError::InvalidBucket {
        bucket: bucket.to_string(),
        reason,
    };

    if bucket.is_empty() {
        return Err(invalid("bucket name cannot be empty".to_string()));
    }

    if bucket.len() < 3 || bucket.len() > 63 {
        return Err(invalid(format!(
            "must be between 3 and 63 characters (got {})",
            bucket.len()
        )));
    }

    let is_edge_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !bucket.starts_with(is_edge_char) {
        return Err(invalid("must start with a lowercase letter or number".to_string()));
    }
    if !bucket.ends_with(is_edge_char) {
        return Err(invalid("must end with a lowercase letter or number".to_string()));
    }

    if let Some(c) = bucket
        .chars()
        .find(|&c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.')
    {
        return Err(invalid(format!(
            "contains invalid character '{}'. Only lowercase letters, numbers, hyphens, and periods are allowed",
            c
        )));
    }

    if bucket.contains("..") {
        return Err(invalid("cannot contain consecutive periods".to_string()));
    }

    if bucket.split('.').count() == 4 && bucket.split('.').all(|part| part.parse::<u8>().is_ok()) {
        return Err(invalid("cannot be formatted as an IP address".to_string()));
    }

    Ok(())
}

/// Validate object key prefix
fn validate_prefix(prefix: &str) -> Result<()> {
    let invalid = |reason: &str| DeployError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: reason.to_string(),
    };

    if prefix.contains("//") {
        return Err(invalid("contains consecutive slashes"));
    }

    if prefix.split('/').any(|segment| segment == "..") {
        return Err(invalid("contains '..'"));
    }

    if prefix.starts_with('/') {
        return Err(invalid("should not start with '/' (use a relative path)"));
    }

    Ok(())
}

/// Every redirect needs a non-empty source prefix and destination key
fn validate_redirects(redirects: &RedirectMap) -> Result<()> {
    for (from, to) in redirects {
        let invalid = |reason: &str| DeployError::InvalidRedirect {
            entry: format!("{}={}", from, to),
            reason: reason.to_string(),
        };

        if from.trim().is_empty() {
            return Err(invalid("source prefix is empty"));
        }
        if to.trim().is_empty() {
            return Err(invalid("destination key is empty"));
        }
        if from.chars().any(char::is_whitespace) || to.chars().any(char::is_whitespace) {
            return Err(invalid("keys cannot contain whitespace"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("AKIAEXAMPLE", "secret")
    }

    #[test]
    fn test_bucket_name_validation() {
        // Valid bucket names
        assert!(validate_bucket_name("mbq-assets-dev").is_ok());
        assert!(validate_bucket_name("harrison.managedbyq.com").is_ok());
        assert!(validate_bucket_name("abc").is_ok());

        // Invalid bucket names
        assert!(validate_bucket_name("ab").is_err()); // Too short
        assert!(validate_bucket_name(&"a".repeat(64)).is_err()); // Too long
        assert!(validate_bucket_name("MY-BUCKET").is_err()); // Uppercase
        assert!(validate_bucket_name("my_bucket").is_err()); // Underscore
        assert!(validate_bucket_name("-mybucket").is_err()); // Starts with dash
        assert!(validate_bucket_name("mybucket-").is_err()); // Ends with dash
        assert!(validate_bucket_name("my..bucket").is_err()); // Consecutive periods
        assert!(validate_bucket_name("192.168.1.1").is_err()); // IP address format
        assert!(validate_bucket_name("").is_err()); // Empty
    }

    #[test]
    fn test_bucket_set_keeps_order_and_rejects_duplicates() {
        let buckets = BucketSet::new(["b-stg", "a-dev"]).unwrap();
        assert_eq!(buckets.iter().collect::<Vec<_>>(), vec!["b-stg", "a-dev"]);
        assert_eq!(buckets.len(), 2);

        assert!(BucketSet::new(["a-dev", "a-dev"]).is_err());
        assert!(BucketSet::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_all_environments() {
        let buckets = BucketSet::all_environments();
        assert_eq!(
            buckets.iter().collect::<Vec<_>>(),
            vec!["mbq-assets-dev", "mbq-assets-stg", "mbq-assets-prd"]
        );
    }

    #[test]
    fn test_prefix_validation() {
        // Valid prefixes
        assert!(validate_prefix("").is_ok());
        assert!(validate_prefix("omd").is_ok());
        assert!(validate_prefix("frontend/assets/").is_ok());

        // Invalid prefixes
        assert!(validate_prefix("omd//assets").is_err()); // Consecutive slashes
        assert!(validate_prefix("../omd").is_err()); // Contains ..
        assert!(validate_prefix("/omd").is_err()); // Absolute path
    }

    #[test]
    fn test_redirect_validation() {
        let mut redirects = RedirectMap::new();
        redirects.insert("app".to_string(), "omd/index.html".to_string());
        assert!(validate_redirects(&redirects).is_ok());

        redirects.insert("old".to_string(), String::new());
        let err = validate_redirects(&redirects).unwrap_err();
        assert!(matches!(err, DeployError::InvalidRedirect { .. }));
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = UploadConfig::new(Credentials::new("", "secret"), dir.path());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DeployError::MissingCredentials(_)));
    }

    #[test]
    fn test_validate_rejects_missing_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = UploadConfig::new(credentials(), dir.path().join("build"));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DeployError::LocalDirUnreadable { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = UploadConfig::new(credentials(), dir.path())
            .with_prefix("omd")
            .with_version("216");
        assert!(config.validate().is_ok());
        assert_eq!(config.active_version(), Some("216"));
        assert_eq!(config.region, DEFAULT_REGION);
    }

    #[test]
    fn test_empty_version_is_inactive() {
        let config = UploadConfig::new(credentials(), "build").with_version("");
        assert_eq!(config.active_version(), None);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
