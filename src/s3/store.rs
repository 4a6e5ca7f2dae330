use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::pipeline::UploadParameter;

/// Object headers by lowercase header name
pub type Headers = BTreeMap<String, String>;

/// A file that landed in a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub bucket: String,
    pub key: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectProtocol {
    Http,
    Https,
}

/// One bucket routing rule: requests whose key starts with `key_prefix_equals`
/// are redirected to `replace_key_with` on `host_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRule {
    pub key_prefix_equals: Option<String>,
    pub protocol: Option<RedirectProtocol>,
    pub host_name: Option<String>,
    pub replace_key_with: Option<String>,
}

/// The parts of a bucket's static website configuration we read and write back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteConfig {
    pub index_document: Option<String>,
    pub error_document: Option<String>,
    pub redirect_all_host: Option<String>,
    pub routing_rules: Vec<RoutingRule>,
}

/// Bucket + key object storage used by the deploy pipeline.
///
/// Implementations must be safe to share across concurrently running
/// upload tasks.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload one local file with its headers
    async fn put_file(&self, bucket: &str, param: &UploadParameter) -> Result<UploadedObject>;

    /// Upload an in-memory body
    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<UploadedObject>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn get_website(&self, bucket: &str) -> Result<WebsiteConfig>;

    async fn put_website(&self, bucket: &str, config: WebsiteConfig) -> Result<()>;
}
