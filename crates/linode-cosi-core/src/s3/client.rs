//! S3 policy client for Linode Object Storage, built on `aws-sdk-s3`.
//!
//! A fresh SDK client is built for every call from the region's cached
//! endpoint, so endpoint changes picked up by the cache apply immediately.

use std::sync::Arc;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;

use super::{S3ClientFactory, S3PolicyClient};
use crate::cache::EndpointResolver;
use crate::error::S3Error;

/// Credential provider name reported to the SDK.
const PROVIDER_NAME: &str = "linode-cosi-driver";

/// Factory for [`LinodeS3Client`].
#[derive(Clone)]
pub struct LinodeS3ClientFactory {
    endpoints: Arc<dyn EndpointResolver>,
    ssl: bool,
}

impl std::fmt::Debug for LinodeS3ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinodeS3ClientFactory")
            .field("ssl", &self.ssl)
            .finish_non_exhaustive()
    }
}

impl LinodeS3ClientFactory {
    /// Create a factory resolving endpoints through `endpoints`. With `ssl`
    /// unset, endpoints are reached over plain HTTP.
    #[must_use]
    pub fn new(endpoints: Arc<dyn EndpointResolver>, ssl: bool) -> Self {
        Self { endpoints, ssl }
    }
}

impl S3ClientFactory for LinodeS3ClientFactory {
    fn client(&self, access_key: &str, secret_key: &str) -> Arc<dyn S3PolicyClient> {
        Arc::new(LinodeS3Client {
            endpoints: Arc::clone(&self.endpoints),
            ssl: self.ssl,
            credentials: Credentials::new(access_key, secret_key, None, None, PROVIDER_NAME),
        })
    }
}

/// S3 client bound to one key pair.
pub struct LinodeS3Client {
    endpoints: Arc<dyn EndpointResolver>,
    ssl: bool,
    credentials: Credentials,
}

impl std::fmt::Debug for LinodeS3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinodeS3Client")
            .field("ssl", &self.ssl)
            .field("access_key", &self.credentials.access_key_id())
            .finish_non_exhaustive()
    }
}

impl LinodeS3Client {
    /// URL of the region's S3 endpoint.
    pub fn endpoint_url(&self, region: &str) -> Result<String, S3Error> {
        let host = self
            .endpoints
            .endpoint(region)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| S3Error::NoEndpoint(region.to_owned()))?;
        if host.contains("://") {
            return Ok(host);
        }
        let scheme = if self.ssl { "https" } else { "http" };
        Ok(format!("{scheme}://{host}"))
    }

    fn sdk_client(&self, region: &str) -> Result<aws_sdk_s3::Client, S3Error> {
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .credentials_provider(self.credentials.clone())
            .endpoint_url(self.endpoint_url(region)?)
            .force_path_style(true)
            .build();
        Ok(aws_sdk_s3::Client::from_conf(config))
    }

    async fn delete_batch(
        client: &aws_sdk_s3::Client,
        bucket: &str,
        keys: Vec<String>,
        errors: &mut Vec<S3Error>,
    ) {
        let objects = match keys
            .into_iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(objects) => objects,
            Err(e) => {
                errors.push(request_error("DeleteObjects", &e));
                return;
            }
        };
        let delete = match Delete::builder().set_objects(Some(objects)).quiet(true).build() {
            Ok(delete) => delete,
            Err(e) => {
                errors.push(request_error("DeleteObjects", &e));
                return;
            }
        };

        match client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
        {
            Ok(resp) => {
                for failed in resp.errors() {
                    errors.push(S3Error::Service {
                        operation: "DeleteObject",
                        status: None,
                        code: failed.code().map(ToOwned::to_owned),
                        message: format!(
                            "{}: {}",
                            failed.key().unwrap_or_default(),
                            failed.message().unwrap_or_default()
                        ),
                    });
                }
            }
            Err(e) => errors.push(service_error("DeleteObjects", &e)),
        }
    }
}

#[async_trait]
impl S3PolicyClient for LinodeS3Client {
    async fn set_bucket_policy(
        &self,
        region: &str,
        bucket: &str,
        policy: &str,
    ) -> Result<(), S3Error> {
        let client = self.sdk_client(region)?;
        match client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            // Some endpoints answer 200 with a body the SDK cannot parse.
            Err(e) if response_status(&e) == Some(200) => Ok(()),
            Err(e) => Err(service_error("PutBucketPolicy", &e)),
        }
    }

    async fn get_bucket_policy(&self, region: &str, bucket: &str) -> Result<String, S3Error> {
        let client = self.sdk_client(region)?;
        let resp = client
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| service_error("GetBucketPolicy", &e))?;
        Ok(resp.policy().unwrap_or_default().to_owned())
    }

    async fn prune(&self, region: &str, bucket: &str) -> Result<(), S3Error> {
        let client = self.sdk_client(region)?;
        let mut errors = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = client.list_objects_v2().bucket(bucket);
            if let Some(token) = continuation_token.take() {
                req = req.continuation_token(token);
            }
            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    errors.push(service_error("ListObjectsV2", &e));
                    break;
                }
            };

            let keys: Vec<String> = resp
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(ToOwned::to_owned))
                .collect();
            if !keys.is_empty() {
                tracing::debug!(bucket, count = keys.len(), "deleting objects");
                Self::delete_batch(&client, bucket, keys, &mut errors).await;
            }

            if resp.is_truncated() != Some(true) {
                break;
            }
            continuation_token = resp.next_continuation_token().map(ToOwned::to_owned);
            if continuation_token.is_none() {
                break;
            }
        }

        S3Error::join(errors)
    }
}

fn response_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

fn service_error<E>(operation: &'static str, err: &SdkError<E, HttpResponse>) -> S3Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    S3Error::Service {
        operation,
        status: response_status(err),
        code: err.code().map(ToOwned::to_owned),
        message: DisplayErrorContext(err).to_string(),
    }
}

fn request_error(operation: &'static str, err: &impl std::fmt::Display) -> S3Error {
    S3Error::Request {
        operation,
        message: err.to_string(),
    }
}
