//! Linode API v4 client over `reqwest`.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::LinodeClient;
use super::types::{
    Bucket, BucketAccess, CreateBucketOptions, CreateKeyOptions, Endpoint, Key, Page,
    UpdateBucketAccessOptions,
};
use crate::error::LinodeError;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.linode.com";

/// Default API version.
pub const DEFAULT_API_VERSION: &str = "v4";

/// Connection settings for [`LinodeApiClient`].
#[derive(Clone)]
pub struct LinodeApiConfig {
    /// Personal access token.
    pub token: String,
    /// Base URL, without the version segment.
    pub api_url: String,
    /// Version path segment.
    pub api_version: String,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl fmt::Debug for LinodeApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinodeApiConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Production [`LinodeClient`].
#[derive(Debug, Clone)]
pub struct LinodeApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

/// `{"errors": [{"reason": "...", "field": "..."}]}`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorEnvelope {
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ErrorReason {
    reason: String,
    field: Option<String>,
}

impl LinodeApiClient {
    /// Build a client. The token must be non-empty.
    pub fn new(config: &LinodeApiConfig) -> Result<Self, LinodeError> {
        if config.token.is_empty() {
            return Err(LinodeError::Config("API token is empty".to_owned()));
        }
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        let base_url = format!(
            "{}/{}",
            config.api_url.trim_end_matches('/'),
            config.api_version.trim_matches('/')
        );
        Ok(Self {
            http,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Base URL including the version segment.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
    }

    /// Send a request and decode a JSON body.
    async fn send<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, LinodeError> {
        let bytes = Self::execute(req).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a request whose body is ignored on success.
    async fn send_empty(req: reqwest::RequestBuilder) -> Result<(), LinodeError> {
        Self::execute(req).await.map(drop)
    }

    async fn execute(req: reqwest::RequestBuilder) -> Result<bytes::Bytes, LinodeError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if status.is_success() {
            return Ok(body);
        }
        Err(LinodeError::api(status.as_u16(), error_message(status, &body)))
    }

    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, LinodeError> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let req = self.request(reqwest::Method::GET, &format!("{path}?page={page}"));
            let resp: Page<T> = Self::send(req).await?;
            items.extend(resp.data);
            if resp.page >= resp.pages {
                return Ok(items);
            }
            page = resp.page + 1;
        }
    }
}

fn bucket_path(region: &str, label: &str) -> String {
    format!("/object-storage/buckets/{region}/{label}")
}

/// Flatten the error envelope into one line, falling back to the status text.
fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    let reasons: Vec<String> = serde_json::from_slice::<ErrorEnvelope>(body)
        .map(|env| {
            env.errors
                .into_iter()
                .map(|e| match e.field {
                    Some(field) => format!("{field}: {}", e.reason),
                    None => e.reason,
                })
                .collect()
        })
        .unwrap_or_default();

    if reasons.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_owned()
    } else {
        reasons.join("; ")
    }
}

#[async_trait]
impl LinodeClient for LinodeApiClient {
    async fn create_bucket(&self, opts: CreateBucketOptions) -> Result<Bucket, LinodeError> {
        let req = self
            .request(reqwest::Method::POST, "/object-storage/buckets")
            .json(&opts);
        Self::send(req).await
    }

    async fn get_bucket(&self, region: &str, label: &str) -> Result<Bucket, LinodeError> {
        let req = self.request(reqwest::Method::GET, &bucket_path(region, label));
        Self::send(req).await
    }

    async fn delete_bucket(&self, region: &str, label: &str) -> Result<(), LinodeError> {
        let req = self.request(reqwest::Method::DELETE, &bucket_path(region, label));
        Self::send_empty(req).await
    }

    async fn get_bucket_access(
        &self,
        region: &str,
        label: &str,
    ) -> Result<BucketAccess, LinodeError> {
        let path = format!("{}/access", bucket_path(region, label));
        Self::send(self.request(reqwest::Method::GET, &path)).await
    }

    async fn update_bucket_access(
        &self,
        region: &str,
        label: &str,
        opts: UpdateBucketAccessOptions,
    ) -> Result<(), LinodeError> {
        let path = format!("{}/access", bucket_path(region, label));
        let req = self.request(reqwest::Method::POST, &path).json(&opts);
        Self::send_empty(req).await
    }

    async fn create_key(&self, opts: CreateKeyOptions) -> Result<Key, LinodeError> {
        let req = self
            .request(reqwest::Method::POST, "/object-storage/keys")
            .json(&opts);
        Self::send(req).await
    }

    async fn get_key(&self, id: u64) -> Result<Key, LinodeError> {
        let path = format!("/object-storage/keys/{id}");
        Self::send(self.request(reqwest::Method::GET, &path)).await
    }

    async fn list_keys(&self) -> Result<Vec<Key>, LinodeError> {
        self.list_all("/object-storage/keys").await
    }

    async fn delete_key(&self, id: u64) -> Result<(), LinodeError> {
        let path = format!("/object-storage/keys/{id}");
        Self::send_empty(self.request(reqwest::Method::DELETE, &path)).await
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, LinodeError> {
        self.list_all("/object-storage/endpoints").await
    }
}
