use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{
    Condition, ErrorDocument, IndexDocument, Protocol, Redirect, RedirectAllRequestsTo,
    WebsiteConfiguration,
};

use super::multipart::{MULTIPART_THRESHOLD, upload_multipart};
use super::store::{
    Headers, ObjectStore, RedirectProtocol, RoutingRule, UploadedObject, WebsiteConfig,
};
use super::upload::{upload_bytes, upload_file};
use crate::config::{Credentials, DEFAULT_REGION};
use crate::error::{BoxError, DeployError, Result};
use crate::pipeline::UploadParameter;

/// [`ObjectStore`] backed by AWS S3.
///
/// Cheap to clone; the underlying SDK client is shared by every task.
#[derive(Clone, Debug)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Build a client from explicit static credentials
    pub async fn new(credentials: &Credentials, region: &str) -> Self {
        let region = if region.is_empty() { DEFAULT_REGION } else { region };
        let provider = aws_sdk_s3::config::Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            None,
            None,
            "asset-deployer",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .credentials_provider(provider)
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_file(&self, bucket: &str, param: &UploadParameter) -> Result<UploadedObject> {
        let file_size = tokio::fs::metadata(&param.local_path)
            .await
            .map_err(|e| DeployError::Upload {
                bucket: bucket.to_string(),
                key: param.object_key.clone(),
                path: param.local_path.clone(),
                source: Box::new(e),
            })?
            .len();

        // Choose upload strategy based on file size
        if file_size >= MULTIPART_THRESHOLD {
            upload_multipart(&self.client, bucket, param, file_size).await
        } else {
            upload_file(&self.client, bucket, param, file_size).await
        }
    }

    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<UploadedObject> {
        upload_bytes(&self.client, bucket, key, body, headers).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let download_error = |source: BoxError| DeployError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        };

        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| download_error(Box::new(e)))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| download_error(Box::new(e)))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn get_website(&self, bucket: &str) -> Result<WebsiteConfig> {
        let output = self
            .client
            .get_bucket_website()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| DeployError::RedirectFetch {
                bucket: bucket.to_string(),
                source: Box::new(e),
            })?;

        let routing_rules = output
            .routing_rules()
            .iter()
            .map(|rule| {
                let redirect = rule.redirect();
                RoutingRule {
                    key_prefix_equals: rule
                        .condition()
                        .and_then(|c| c.key_prefix_equals())
                        .map(str::to_string),
                    protocol: redirect.and_then(|r| r.protocol()).map(|p| match p {
                        Protocol::Http => RedirectProtocol::Http,
                        _ => RedirectProtocol::Https,
                    }),
                    host_name: redirect.and_then(|r| r.host_name()).map(str::to_string),
                    replace_key_with: redirect
                        .and_then(|r| r.replace_key_with())
                        .map(str::to_string),
                }
            })
            .collect();

        Ok(WebsiteConfig {
            index_document: output.index_document().map(|d| d.suffix().to_string()),
            error_document: output.error_document().map(|d| d.key().to_string()),
            redirect_all_host: output
                .redirect_all_requests_to()
                .map(|r| r.host_name().to_string()),
            routing_rules,
        })
    }

    async fn put_website(&self, bucket: &str, config: WebsiteConfig) -> Result<()> {
        let put_error = |source: BoxError| DeployError::RedirectPut {
            bucket: bucket.to_string(),
            source,
        };

        let index_document = config
            .index_document
            .map(|suffix| IndexDocument::builder().suffix(suffix).build())
            .transpose()
            .map_err(|e| put_error(Box::new(e)))?;
        let error_document = config
            .error_document
            .map(|key| ErrorDocument::builder().key(key).build())
            .transpose()
            .map_err(|e| put_error(Box::new(e)))?;
        let redirect_all = config
            .redirect_all_host
            .map(|host| RedirectAllRequestsTo::builder().host_name(host).build())
            .transpose()
            .map_err(|e| put_error(Box::new(e)))?;

        let routing_rules = config
            .routing_rules
            .into_iter()
            .map(|rule| {
                let mut redirect = Redirect::builder();
                if let Some(protocol) = rule.protocol {
                    redirect = redirect.protocol(match protocol {
                        RedirectProtocol::Http => Protocol::Http,
                        RedirectProtocol::Https => Protocol::Https,
                    });
                }
                aws_sdk_s3::types::RoutingRule::builder()
                    .condition(
                        Condition::builder()
                            .set_key_prefix_equals(rule.key_prefix_equals)
                            .build(),
                    )
                    .redirect(
                        redirect
                            .set_host_name(rule.host_name)
                            .set_replace_key_with(rule.replace_key_with)
                            .build(),
                    )
                    .build()
            })
            .collect::<Vec<_>>();

        let website = WebsiteConfiguration::builder()
            .set_index_document(index_document)
            .set_error_document(error_document)
            .set_redirect_all_requests_to(redirect_all)
            .set_routing_rules((!routing_rules.is_empty()).then_some(routing_rules))
            .build();

        self.client
            .put_bucket_website()
            .bucket(bucket)
            .website_configuration(website)
            .send()
            .await
            .map_err(|e| put_error(Box::new(e)))?;

        Ok(())
    }
}
