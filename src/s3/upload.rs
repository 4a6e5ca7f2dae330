use aws_sdk_s3::Client;
use aws_sdk_s3::operation::put_object::builders::PutObjectFluentBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;

use super::store::{Headers, UploadedObject};
use crate::error::{DeployError, Result};
use crate::pipeline::{ACL_HEADER, CACHE_CONTROL_HEADER, CONTENT_TYPE_HEADER, UploadParameter};

/// Apply the pipeline's object headers to a PUT request
pub(crate) fn with_headers(request: PutObjectFluentBuilder, headers: &Headers) -> PutObjectFluentBuilder {
    let mut request = request;
    if let Some(acl) = headers.get(ACL_HEADER) {
        request = request.acl(ObjectCannedAcl::from(acl.as_str()));
    }
    if let Some(content_type) = headers.get(CONTENT_TYPE_HEADER) {
        request = request.content_type(content_type);
    }
    if let Some(cache_control) = headers.get(CACHE_CONTROL_HEADER) {
        request = request.cache_control(cache_control);
    }
    request
}

/// Upload a file to S3 in a single PUT
pub async fn upload_file(
    client: &Client,
    bucket: &str,
    param: &UploadParameter,
    file_size: u64,
) -> Result<UploadedObject> {
    let upload_error = |source: Box<dyn std::error::Error + Send + Sync>| DeployError::Upload {
        bucket: bucket.to_string(),
        key: param.object_key.clone(),
        path: param.local_path.clone(),
        source,
    };

    // Create ByteStream from file
    let body = ByteStream::from_path(&param.local_path)
        .await
        .map_err(|e| upload_error(Box::new(e)))?;

    let request = client
        .put_object()
        .bucket(bucket)
        .key(&param.object_key)
        .body(body)
        .content_length(file_size as i64);

    with_headers(request, &param.headers)
        .send()
        .await
        .map_err(|e| upload_error(Box::new(e)))?;

    Ok(UploadedObject {
        bucket: bucket.to_string(),
        key: param.object_key.clone(),
        bytes: file_size,
    })
}

/// Upload an in-memory body to S3
pub async fn upload_bytes(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    headers: &Headers,
) -> Result<UploadedObject> {
    let bytes = body.len() as u64;
    let request = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body));

    with_headers(request, headers)
        .send()
        .await
        .map_err(|e| DeployError::Upload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            path: key.into(),
            source: Box::new(e),
        })?;

    Ok(UploadedObject {
        bucket: bucket.to_string(),
        key: key.to_string(),
        bytes,
    })
}
