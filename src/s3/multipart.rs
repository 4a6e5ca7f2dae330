use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ObjectCannedAcl};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::store::UploadedObject;
use crate::error::{BoxError, DeployError, Result};
use crate::pipeline::{ACL_HEADER, CACHE_CONTROL_HEADER, CONTENT_TYPE_HEADER, UploadParameter};

// Threshold for using multipart upload (100MB)
pub const MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;

// Size of each part (10MB) - AWS minimum is 5MB
const PART_SIZE: usize = 10 * 1024 * 1024;

/// Upload a large file using S3 multipart upload
///
/// Used for files at or above [`MULTIPART_THRESHOLD`]. The object gets the
/// same ACL, content type and cache directive as a single PUT would set.
/// If any part fails the multipart upload is aborted before the error is
/// returned, so a retry starts from a clean slate.
pub async fn upload_multipart(
    client: &Client,
    bucket: &str,
    param: &UploadParameter,
    file_size: u64,
) -> Result<UploadedObject> {
    let upload_error = |source: BoxError| DeployError::Upload {
        bucket: bucket.to_string(),
        key: param.object_key.clone(),
        path: param.local_path.clone(),
        source,
    };

    info!(
        "Starting multipart upload for {} ({} bytes, {} parts)",
        param.local_path.display(),
        file_size,
        (file_size as usize).div_ceil(PART_SIZE)
    );

    // Initiate multipart upload
    let mut request = client
        .create_multipart_upload()
        .bucket(bucket)
        .key(&param.object_key);
    if let Some(acl) = param.header(ACL_HEADER) {
        request = request.acl(ObjectCannedAcl::from(acl));
    }
    if let Some(content_type) = param.header(CONTENT_TYPE_HEADER) {
        request = request.content_type(content_type);
    }
    if let Some(cache_control) = param.header(CACHE_CONTROL_HEADER) {
        request = request.cache_control(cache_control);
    }

    let multipart = request
        .send()
        .await
        .map_err(|e| upload_error(Box::new(e)))?;

    let upload_id = multipart
        .upload_id()
        .ok_or_else(|| upload_error("No upload ID returned from S3".into()))?
        .to_string();

    debug!("Multipart upload initiated with ID: {}", upload_id);

    match upload_parts(client, bucket, param, &upload_id).await {
        Ok(parts) => {
            debug!(
                "All {} parts uploaded, completing multipart upload",
                parts.len()
            );

            let completed = CompletedMultipartUpload::builder()
                .set_parts(Some(parts))
                .build();

            client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(&param.object_key)
                .upload_id(&upload_id)
                .multipart_upload(completed)
                .send()
                .await
                .map_err(|e| upload_error(Box::new(e)))?;

            info!(
                "Completed multipart upload: {} -> s3://{}/{}",
                param.local_path.display(),
                bucket,
                param.object_key
            );

            Ok(UploadedObject {
                bucket: bucket.to_string(),
                key: param.object_key.clone(),
                bytes: file_size,
            })
        }
        Err(source) => {
            if let Err(e) = abort_multipart_upload(client, bucket, &param.object_key, &upload_id).await
            {
                warn!("Failed to abort multipart upload {}: {}", upload_id, e);
            }
            Err(upload_error(source))
        }
    }
}

async fn upload_parts(
    client: &Client,
    bucket: &str,
    param: &UploadParameter,
    upload_id: &str,
) -> std::result::Result<Vec<CompletedPart>, BoxError> {
    let mut file = tokio::fs::File::open(&param.local_path).await?;
    let mut parts = Vec::new();
    let mut part_number = 1i32;

    loop {
        let mut buffer = Vec::with_capacity(PART_SIZE);
        let bytes_read = (&mut file)
            .take(PART_SIZE as u64)
            .read_to_end(&mut buffer)
            .await?;

        if bytes_read == 0 {
            break; // EOF
        }

        debug!("Uploading part {} ({} bytes)", part_number, bytes_read);

        let part_result = client
            .upload_part()
            .bucket(bucket)
            .key(&param.object_key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(buffer))
            .send()
            .await?;

        parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .e_tag(part_result.e_tag().unwrap_or(""))
                .build(),
        );

        part_number += 1;
    }

    Ok(parts)
}

/// Abort a multipart upload so no orphaned parts are left behind
pub async fn abort_multipart_upload(
    client: &Client,
    bucket: &str,
    s3_key: &str,
    upload_id: &str,
) -> std::result::Result<(), BoxError> {
    client
        .abort_multipart_upload()
        .bucket(bucket)
        .key(s3_key)
        .upload_id(upload_id)
        .send()
        .await?;

    debug!("Aborted multipart upload {}", upload_id);

    Ok(())
}
