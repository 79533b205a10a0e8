//! COSI provisioner: bucket and access lifecycle on Linode Object Storage.
//!
//! Every operation is idempotent and recomputes its outcome from the
//! provider on each call; nothing is remembered between calls. Not-found
//! answers are absorbed on delete and revoke, and steer create between its
//! create and compare paths.

use std::collections::HashMap;
use std::sync::Arc;

use linode_cosi_model::error::CosiError;
use linode_cosi_model::input::{
    DriverCreateBucketRequest, DriverDeleteBucketRequest, DriverGrantBucketAccessRequest,
    DriverRevokeBucketAccessRequest,
};
use linode_cosi_model::output::{
    DriverCreateBucketResponse, DriverDeleteBucketResponse, DriverGrantBucketAccessResponse,
    DriverRevokeBucketAccessResponse,
};
use linode_cosi_model::types::{AuthenticationType, CredentialDetails, Protocol, S3SignatureVersion};

use crate::broker::KeyBroker;
use crate::cache::EndpointResolver;
use crate::linode::{CreateBucketOptions, CreateKeyOptions, KeyBucketAccess, LinodeClient};
use crate::params::{
    BucketId, CREDENTIALS_S3, CreateBucketParams, SECRET_ACCESS_KEY_ID, SECRET_ACCESS_SECRET_KEY,
    SECRET_ENDPOINT, SECRET_REGION, parse_permissions, wants_force_cleanup,
};

/// Which path `DriverCreateBucket` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketOutcome {
    Created,
    Existing,
}

/// The provisioner service.
pub struct Provisioner {
    linode: Arc<dyn LinodeClient>,
    endpoints: Arc<dyn EndpointResolver>,
    broker: KeyBroker,
    force_cleanup: bool,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("broker", &self.broker)
            .field("force_cleanup", &self.force_cleanup)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Create a provisioner. Forced cleanup on delete starts disabled.
    #[must_use]
    pub fn new(
        linode: Arc<dyn LinodeClient>,
        endpoints: Arc<dyn EndpointResolver>,
        broker: KeyBroker,
    ) -> Self {
        Self {
            linode,
            endpoints,
            broker,
            force_cleanup: false,
        }
    }

    /// Allow `DriverDeleteBucket` to empty a bucket before deleting it.
    #[must_use]
    pub fn with_force_cleanup(mut self, enabled: bool) -> Self {
        self.force_cleanup = enabled;
        self
    }

    /// Handle `DriverCreateBucket`.
    pub async fn handle_create_bucket(
        &self,
        input: DriverCreateBucketRequest,
    ) -> Result<DriverCreateBucketResponse, CosiError> {
        let label = input.name;
        tracing::info!(bucket = %label, "Bucket creation initiated");

        if label.is_empty() {
            return Err(CosiError::invalid_argument("bucket name was not provided"));
        }
        let params = CreateBucketParams::parse(&label, &input.parameters).inspect_err(|e| {
            tracing::error!(bucket = %label, error = %e, "invalid bucket parameters");
        })?;
        let region = params.region.as_str();

        let bucket_id = BucketId::new(region, &label).to_string();
        match self.ensure_bucket(&params, &label).await? {
            BucketOutcome::Created => tracing::info!(%bucket_id, "Bucket created"),
            BucketOutcome::Existing => tracing::info!(%bucket_id, "Bucket exists"),
        }
        Ok(DriverCreateBucketResponse {
            bucket_id,
            bucket_info: Some(Protocol::s3(region, S3SignatureVersion::S3V4)),
        })
    }

    /// Create the bucket, or check that the existing one matches `params`.
    async fn ensure_bucket(
        &self,
        params: &CreateBucketParams,
        label: &str,
    ) -> Result<BucketOutcome, CosiError> {
        let region = params.region.as_str();

        match self.linode.get_bucket(region, label).await {
            Ok(_) => {
                self.reconcile_existing(params, label).await?;
                Ok(BucketOutcome::Existing)
            }
            Err(e) if e.is_not_found() => {
                let opts = CreateBucketOptions {
                    region: params.region.clone(),
                    label: label.to_owned(),
                    acl: Some(params.acl),
                    cors_enabled: Some(params.cors.is_enabled()),
                };
                self.linode.create_bucket(opts).await.map_err(|e| {
                    tracing::error!(region, bucket = label, error = %e, "failed to create bucket");
                    CosiError::internal("failed to create bucket").with_source(e)
                })?;
                if let Some(policy) = &params.policy {
                    self.apply_policy(region, label, policy).await?;
                }
                Ok(BucketOutcome::Created)
            }
            Err(e) => {
                tracing::error!(region, bucket = label, error = %e, "failed to get bucket");
                Err(CosiError::internal("failed to get bucket").with_source(e))
            }
        }
    }

    /// Found path of create: the bucket must carry the requested settings.
    async fn reconcile_existing(
        &self,
        params: &CreateBucketParams,
        label: &str,
    ) -> Result<(), CosiError> {
        let region = params.region.as_str();
        let access = self
            .linode
            .get_bucket_access(region, label)
            .await
            .map_err(|e| {
                tracing::error!(region, bucket = label, error = %e, "failed to get bucket access");
                CosiError::internal("failed to get bucket access").with_source(e)
            })?;

        if access.acl != params.acl || access.cors_enabled != params.cors.is_enabled() {
            tracing::error!(
                region,
                bucket = label,
                existing_acl = %access.acl,
                requested_acl = %params.acl,
                existing_cors = access.cors_enabled,
                requested_cors = params.cors.is_enabled(),
                "bucket exists with different parameters"
            );
            return Err(CosiError::already_exists(
                "bucket exists with different parameters",
            ));
        }

        if let Some(policy) = &params.policy {
            self.apply_policy(region, label, policy).await?;
        }
        Ok(())
    }

    /// Write a bucket policy through a leased key. The lease is released
    /// whether or not the write succeeds.
    async fn apply_policy(&self, region: &str, label: &str, policy: &str) -> Result<(), CosiError> {
        let lease = self.broker.obtain(region, label).await.map_err(|e| {
            tracing::error!(region, bucket = label, error = %e, "failed to create object storage key");
            CosiError::internal("failed to create object storage key").with_source(e)
        })?;

        let result = lease.client().set_bucket_policy(region, label, policy).await;
        lease.release().await;

        result.map_err(|e| {
            tracing::error!(region, bucket = label, error = %e, "failed to set bucket policy");
            CosiError::internal("failed to set bucket policy").with_source(e)
        })?;
        tracing::debug!(region, bucket = label, "bucket policy applied");
        Ok(())
    }

    /// Handle `DriverDeleteBucket`.
    pub async fn handle_delete_bucket(
        &self,
        input: DriverDeleteBucketRequest,
    ) -> Result<DriverDeleteBucketResponse, CosiError> {
        tracing::info!(bucket_id = %input.bucket_id, "Bucket deletion initiated");
        let id: BucketId = input.bucket_id.parse()?;

        if wants_force_cleanup(&input.delete_context) {
            if self.force_cleanup {
                if !self.prune(&id).await? {
                    tracing::info!(bucket_id = %id, "Bucket already deleted");
                    return Ok(DriverDeleteBucketResponse {});
                }
            } else {
                tracing::warn!(bucket_id = %id, "forced cleanup requested but disabled");
            }
        }

        match self.linode.delete_bucket(&id.region, &id.label).await {
            Ok(()) => tracing::info!(bucket_id = %id, "Bucket deleted"),
            Err(e) if e.is_not_found() => {
                tracing::info!(bucket_id = %id, "Bucket already deleted");
            }
            Err(e) => {
                tracing::error!(bucket_id = %id, error = %e, "failed to delete bucket");
                return Err(CosiError::internal("failed to delete bucket").with_source(e));
            }
        }
        Ok(DriverDeleteBucketResponse {})
    }

    /// Empty the bucket. Returns `false` if the bucket does not exist.
    async fn prune(&self, id: &BucketId) -> Result<bool, CosiError> {
        match self.linode.get_bucket(&id.region, &id.label).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => {
                tracing::error!(bucket_id = %id, error = %e, "failed to get bucket");
                return Err(CosiError::internal("failed to get bucket").with_source(e));
            }
        }

        let lease = self
            .broker
            .obtain(&id.region, &id.label)
            .await
            .map_err(|e| {
                tracing::error!(bucket_id = %id, error = %e, "failed to create object storage key");
                CosiError::internal("failed to create object storage key").with_source(e)
            })?;

        tracing::info!(bucket_id = %id, "Bucket cleanup initiated");
        let result = lease.client().prune(&id.region, &id.label).await;
        lease.release().await;

        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(bucket_id = %id, error = %e, "ignoring not found during cleanup");
            }
            Err(e) => {
                tracing::error!(bucket_id = %id, error = %e, "failed to clean up bucket");
                return Err(CosiError::internal("failed to clean up bucket").with_source(e));
            }
        }
        Ok(true)
    }

    /// Handle `DriverGrantBucketAccess`.
    pub async fn handle_grant_bucket_access(
        &self,
        input: DriverGrantBucketAccessRequest,
    ) -> Result<DriverGrantBucketAccessResponse, CosiError> {
        tracing::info!(
            bucket_id = %input.bucket_id,
            key_label = %input.name,
            "Bucket access grant initiated"
        );
        let id: BucketId = input.bucket_id.parse()?;

        if input.authentication_type != AuthenticationType::Key {
            tracing::error!(
                bucket_id = %id,
                authentication_type = %input.authentication_type,
                "unsupported authentication type"
            );
            return Err(CosiError::invalid_argument(format!(
                "unsupported authentication type {}",
                input.authentication_type
            )));
        }
        let permissions = parse_permissions(&input.parameters)?;

        let host = self
            .endpoints
            .endpoint(&id.region)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                tracing::error!(bucket_id = %id, "failed to get endpoint for region");
                CosiError::internal("failed to get endpoint for region")
            })?;

        let key = self
            .linode
            .create_key(CreateKeyOptions {
                label: input.name.clone(),
                bucket_access: Some(vec![KeyBucketAccess {
                    region: id.region.clone(),
                    bucket_name: id.label.clone(),
                    permissions,
                }]),
            })
            .await
            .map_err(|e| {
                tracing::error!(bucket_id = %id, key_label = %input.name, error = %e, "failed to create object storage key");
                CosiError::internal("failed to create object storage key").with_source(e)
            })?;

        let secrets = HashMap::from([
            (SECRET_REGION.to_owned(), id.region.clone()),
            (SECRET_ENDPOINT.to_owned(), format!("{}.{host}", id.label)),
            (SECRET_ACCESS_KEY_ID.to_owned(), key.access_key.clone()),
            (SECRET_ACCESS_SECRET_KEY.to_owned(), key.secret_key.clone()),
        ]);

        let account_id = key.id.to_string();
        tracing::info!(bucket_id = %id, %account_id, %permissions, "Bucket access granted");
        Ok(DriverGrantBucketAccessResponse {
            account_id,
            credentials: HashMap::from([(CREDENTIALS_S3.to_owned(), CredentialDetails { secrets })]),
        })
    }

    /// Handle `DriverRevokeBucketAccess`.
    pub async fn handle_revoke_bucket_access(
        &self,
        input: DriverRevokeBucketAccessRequest,
    ) -> Result<DriverRevokeBucketAccessResponse, CosiError> {
        tracing::info!(
            bucket_id = %input.bucket_id,
            account_id = %input.account_id,
            "Bucket access revoke initiated"
        );
        let id: u64 = input.account_id.trim().parse().map_err(|_| {
            tracing::error!(account_id = %input.account_id, "account id is invalid");
            CosiError::invalid_argument("account id is invalid")
        })?;

        match self.linode.delete_key(id).await {
            Ok(()) => tracing::info!(account_id = id, "Bucket access revoked"),
            Err(e) if e.is_not_found() => {
                tracing::info!(account_id = id, "Bucket access already revoked");
            }
            Err(e) => {
                tracing::error!(account_id = id, error = %e, "failed to delete key");
                return Err(CosiError::internal("failed to delete key").with_source(e));
            }
        }
        Ok(DriverRevokeBucketAccessResponse {})
    }
}
