use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::store::{Headers, ObjectStore, UploadedObject, WebsiteConfig};
use crate::error::{DeployError, Result};
use crate::pipeline::UploadParameter;

/// An object held by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub headers: Headers,
}

/// Every call made against a [`MemoryStore`], in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Put { bucket: String, key: String },
    Get { bucket: String, key: String },
    GetWebsite { bucket: String },
    PutWebsite { bucket: String },
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<(String, String), StoredObject>,
    websites: HashMap<String, WebsiteConfig>,
    calls: Vec<StoreCall>,
    failing_puts: HashMap<String, u32>,
    failing_websites: Vec<String>,
    failing_website_puts: Vec<String>,
}

/// Object store kept in process memory.
///
/// Backs `--dry-run` deploys, where nothing may leave the machine, and the
/// pipeline tests. Buckets spring into existence on first write and every
/// bucket starts with an empty website configuration.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn website(&self, bucket: &str) -> Option<WebsiteConfig> {
        self.state().websites.get(bucket).cloned()
    }

    pub fn set_website(&self, bucket: &str, config: WebsiteConfig) {
        self.state().websites.insert(bucket.to_string(), config);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Make the next `times` puts of `key` (to any bucket) fail
    #[cfg(test)]
    pub fn fail_puts(&self, key: &str, times: u32) {
        self.state().failing_puts.insert(key.to_string(), times);
    }

    /// Make every website fetch of `bucket` fail
    #[cfg(test)]
    pub fn fail_website(&self, bucket: &str) {
        self.state().failing_websites.push(bucket.to_string());
    }

    /// Make every website write of `bucket` fail
    #[cfg(test)]
    pub fn fail_website_put(&self, bucket: &str) {
        self.state().failing_website_puts.push(bucket.to_string());
    }

    fn store(&self, bucket: &str, key: &str, body: Vec<u8>, headers: Headers) -> Result<UploadedObject> {
        let mut state = self.state();
        state.calls.push(StoreCall::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });

        if let Some(remaining) = state.failing_puts.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DeployError::Upload {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    path: key.into(),
                    source: "injected put failure".into(),
                });
            }
        }

        let bytes = body.len() as u64;
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), StoredObject { body, headers });

        Ok(UploadedObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            bytes,
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_file(&self, bucket: &str, param: &UploadParameter) -> Result<UploadedObject> {
        let body = tokio::fs::read(&param.local_path)
            .await
            .map_err(|e| DeployError::Upload {
                bucket: bucket.to_string(),
                key: param.object_key.clone(),
                path: param.local_path.clone(),
                source: Box::new(e),
            })?;

        self.store(bucket, &param.object_key, body, param.headers.clone())
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<UploadedObject> {
        self.store(bucket, key, body, headers.clone())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.calls.push(StoreCall::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });

        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.body.clone())
            .ok_or_else(|| DeployError::Download {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "NoSuchKey".into(),
            })
    }

    async fn get_website(&self, bucket: &str) -> Result<WebsiteConfig> {
        let mut state = self.state();
        state.calls.push(StoreCall::GetWebsite {
            bucket: bucket.to_string(),
        });

        if state.failing_websites.iter().any(|b| b == bucket) {
            return Err(DeployError::RedirectFetch {
                bucket: bucket.to_string(),
                source: "injected website failure".into(),
            });
        }

        Ok(state.websites.get(bucket).cloned().unwrap_or_default())
    }

    async fn put_website(&self, bucket: &str, config: WebsiteConfig) -> Result<()> {
        let mut state = self.state();
        state.calls.push(StoreCall::PutWebsite {
            bucket: bucket.to_string(),
        });

        if state.failing_website_puts.iter().any(|b| b == bucket) {
            return Err(DeployError::RedirectPut {
                bucket: bucket.to_string(),
                source: "injected website failure".into(),
            });
        }

        state.websites.insert(bucket.to_string(), config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_bytes() {
        let store = MemoryStore::new();
        let headers = Headers::from([("content-type".to_string(), "text/plain".to_string())]);

        let uploaded = store
            .put_bytes("mbq-assets-dev", "a.txt", b"hello".to_vec(), &headers)
            .await
            .unwrap();

        assert_eq!(uploaded.bytes, 5);
        assert_eq!(
            store.get_object("mbq-assets-dev", "a.txt").await.unwrap(),
            b"hello"
        );
        assert!(store.get_object("mbq-assets-stg", "a.txt").await.is_err());
        assert_eq!(store.keys("mbq-assets-dev"), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_injected_put_failures_run_out() {
        let store = MemoryStore::new();
        store.fail_puts("a.txt", 1);

        let headers = Headers::new();
        assert!(store.put_bytes("b", "a.txt", vec![], &headers).await.is_err());
        assert!(store.put_bytes("b", "a.txt", vec![], &headers).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_an_upload_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.js");
        let param =
            crate::pipeline::build_upload_parameter(dir.path(), &missing, None, None).unwrap();

        let err = MemoryStore::new()
            .put_file("mbq-assets-dev", &param)
            .await
            .unwrap_err();

        match err {
            DeployError::Upload { key, path, .. } => {
                assert_eq!(key, "gone.js");
                assert_eq!(path, missing);
            }
            other => panic!("expected Upload, got {other:?}"),
        }
    }
}
