use futures::stream;
use tracing::info;

use super::runner::{Deadline, run_bounded_until};
use crate::config::{BucketSet, RedirectMap};
use crate::error::{DeployError, Result};
use crate::s3::{ObjectStore, RedirectProtocol, RoutingRule};

/// Concurrent bucket website updates
pub const REDIRECT_CONCURRENCY: usize = 10;

/// One HTTPS routing rule per redirect, pointing back at the bucket's own host
pub fn routing_rules(bucket: &str, redirects: &RedirectMap) -> Vec<RoutingRule> {
    redirects
        .iter()
        .map(|(from, to)| RoutingRule {
            key_prefix_equals: Some(from.clone()),
            protocol: Some(RedirectProtocol::Https),
            host_name: Some(bucket.to_string()),
            replace_key_with: Some(to.clone()),
        })
        .collect()
}

/// Replace the routing rules of `bucket` with exactly `redirects`.
///
/// The rest of the website configuration (index and error documents) is
/// written back unchanged. Stale rules are discarded, not merged.
pub async fn reconcile_redirects(
    store: &dyn ObjectStore,
    bucket: &str,
    redirects: &RedirectMap,
) -> Result<()> {
    let mut website = store.get_website(bucket).await?;
    let stale = website.routing_rules.len();

    website.routing_rules = routing_rules(bucket, redirects);
    store.put_website(bucket, website).await?;

    info!(
        "Updated redirection rules of {} ({} replaced by {})",
        bucket,
        stale,
        redirects.len()
    );
    Ok(())
}

/// Reconcile redirects on every bucket, at most [`REDIRECT_CONCURRENCY`] at once.
///
/// With an empty redirect map nothing is fetched or written.
pub async fn reconcile_all(
    store: &dyn ObjectStore,
    buckets: &BucketSet,
    redirects: &RedirectMap,
    deadline: Option<Deadline>,
) -> Result<Vec<String>> {
    if redirects.is_empty() {
        info!("No redirects configured, leaving bucket routing rules untouched");
        return Ok(Vec::new());
    }

    let tasks = stream::iter(buckets.iter().map(move |bucket| {
        Ok(async move {
            reconcile_redirects(store, bucket, redirects).await?;
            Ok::<_, DeployError>(bucket.to_string())
        })
    }));

    run_bounded_until(tasks, REDIRECT_CONCURRENCY, deadline).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::{MemoryStore, StoreCall, WebsiteConfig};

    fn redirects() -> RedirectMap {
        RedirectMap::from([
            ("app".to_string(), "omd/index.html".to_string()),
            ("login".to_string(), "omd/login.html".to_string()),
        ])
    }

    fn stale_website() -> WebsiteConfig {
        WebsiteConfig {
            index_document: Some("index.html".to_string()),
            error_document: Some("404.html".to_string()),
            redirect_all_host: None,
            routing_rules: vec![RoutingRule {
                key_prefix_equals: Some("old".to_string()),
                protocol: Some(RedirectProtocol::Http),
                host_name: Some("elsewhere.example.com".to_string()),
                replace_key_with: Some("gone.html".to_string()),
            }],
        }
    }

    #[test]
    fn test_routing_rules_use_https_and_bucket_host() {
        let rules = routing_rules("managedbyq.com", &redirects());

        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules[0],
            RoutingRule {
                key_prefix_equals: Some("app".to_string()),
                protocol: Some(RedirectProtocol::Https),
                host_name: Some("managedbyq.com".to_string()),
                replace_key_with: Some("omd/index.html".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_replaces_rules_and_keeps_documents() {
        let store = MemoryStore::new();
        store.set_website("dev.mbq.io", stale_website());

        reconcile_redirects(&store, "dev.mbq.io", &redirects())
            .await
            .unwrap();

        let website = store.website("dev.mbq.io").unwrap();
        assert_eq!(website.index_document.as_deref(), Some("index.html"));
        assert_eq!(website.error_document.as_deref(), Some("404.html"));
        assert_eq!(website.routing_rules, routing_rules("dev.mbq.io", &redirects()));
        assert!(
            website
                .routing_rules
                .iter()
                .all(|r| r.key_prefix_equals.as_deref() != Some("old"))
        );
    }

    #[tokio::test]
    async fn test_empty_redirects_touch_nothing() {
        let store = MemoryStore::new();
        let buckets = BucketSet::new(["dev.mbq.io", "stg.mbq.io"]).unwrap();

        let updated = reconcile_all(&store, &buckets, &RedirectMap::new(), None)
            .await
            .unwrap();

        assert!(updated.is_empty());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reconciles_every_bucket() {
        let store = MemoryStore::new();
        let buckets = BucketSet::new(["dev.mbq.io", "stg.mbq.io"]).unwrap();

        let mut updated = reconcile_all(&store, &buckets, &redirects(), None).await.unwrap();
        updated.sort();

        assert_eq!(updated, vec!["dev.mbq.io", "stg.mbq.io"]);
        for bucket in ["dev.mbq.io", "stg.mbq.io"] {
            assert_eq!(store.website(bucket).unwrap().routing_rules.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_write_failure_keeps_existing_rules() {
        let store = MemoryStore::new();
        store.set_website("dev.mbq.io", stale_website());
        store.fail_website_put("dev.mbq.io");
        let buckets = BucketSet::new(["dev.mbq.io"]).unwrap();

        let err = reconcile_all(&store, &buckets, &redirects(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::RedirectPut { ref bucket, .. } if bucket == "dev.mbq.io"));
        assert_eq!(store.website("dev.mbq.io"), Some(stale_website()));
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_put() {
        let store = MemoryStore::new();
        store.fail_website("dev.mbq.io");
        let buckets = BucketSet::new(["dev.mbq.io"]).unwrap();

        let err = reconcile_all(&store, &buckets, &redirects(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::RedirectFetch { .. }));
        assert_eq!(
            store.calls(),
            vec![StoreCall::GetWebsite {
                bucket: "dev.mbq.io".to_string()
            }]
        );
    }
}
