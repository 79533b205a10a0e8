//! Bucket access integration tests.

#[cfg(test)]
mod tests {
    use linode_cosi_core::linode::stub::{TEST_ACCESS_KEY, TEST_SECRET_KEY};
    use linode_cosi_core::linode::{Acl, Permissions, StubLinodeClient, StubOperation};
    use linode_cosi_core::params::PARAM_PERMISSIONS;

    use crate::{DriverOptions, TEST_BUCKET, TEST_REGION, TestDriver};

    const BUCKET_ID: &str = "test-region/test-bucket";

    async fn driver() -> TestDriver {
        let linode =
            StubLinodeClient::new().with_bucket(TEST_REGION, TEST_BUCKET, Acl::Private, false);
        TestDriver::start_with(linode, DriverOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_should_grant_access_with_s3_credentials() {
        let driver = driver().await;
        let resp = driver.grant(BUCKET_ID, "Key", &[]).await.unwrap();

        assert_eq!(resp.status, http::StatusCode::OK);
        let secrets = &resp.body["credentials"]["s3"]["secrets"];
        assert_eq!(secrets["region"], "test-region");
        assert_eq!(
            secrets["endpoint"],
            "test-bucket.test-region-1.linodeobjects.com"
        );
        assert_eq!(secrets["accessKeyID"], TEST_ACCESS_KEY);
        assert_eq!(secrets["accessSecretKey"], TEST_SECRET_KEY);

        let keys = driver.linode.keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(resp.body["accountId"], keys[0].id.to_string());
        assert_eq!(keys[0].bucket_access[0].permissions, Permissions::ReadOnly);
    }

    #[tokio::test]
    async fn test_should_grant_read_write_access() {
        let driver = driver().await;
        let resp = driver
            .grant(BUCKET_ID, "Key", &[(PARAM_PERMISSIONS, "read_write")])
            .await
            .unwrap();

        assert_eq!(resp.status, http::StatusCode::OK);
        let keys = driver.linode.keys();
        assert_eq!(keys[0].bucket_access[0].permissions, Permissions::ReadWrite);
        assert!(keys[0].limited);
    }

    #[tokio::test]
    async fn test_should_reject_invalid_grants_without_creating_keys() {
        let driver = driver().await;

        let resp = driver.grant(BUCKET_ID, "IAM", &[]).await.unwrap();
        assert_eq!(resp.code(), "InvalidArgument");

        let resp = driver
            .grant(BUCKET_ID, "Key", &[(PARAM_PERMISSIONS, "owner")])
            .await
            .unwrap();
        assert_eq!(resp.code(), "InvalidArgument");

        let resp = driver.grant("not-a-bucket-id", "Key", &[]).await.unwrap();
        assert_eq!(resp.code(), "InvalidArgument");

        assert_eq!(driver.linode.calls(StubOperation::CreateKey), 0);
    }

    #[tokio::test]
    async fn test_should_fail_grant_for_region_without_endpoint() {
        let linode = StubLinodeClient::new().with_bucket("se-sto", "b", Acl::Private, false);
        let driver = TestDriver::start_with(linode, DriverOptions::default())
            .await
            .unwrap();

        let resp = driver.grant("se-sto/b", "Key", &[]).await.unwrap();
        assert_eq!(resp.status, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.code(), "Internal");
        assert!(driver.linode.keys().is_empty());
    }

    #[tokio::test]
    async fn test_should_revoke_missing_key_repeatedly() {
        let driver = driver().await;
        let granted = driver.grant(BUCKET_ID, "Key", &[]).await.unwrap();
        let account_id = granted.body["accountId"].as_str().unwrap().to_owned();

        for _ in 0..3 {
            let resp = driver.revoke(BUCKET_ID, &account_id).await.unwrap();
            assert_eq!(resp.status, http::StatusCode::OK);
            assert_eq!(resp.grpc_status, Some(0));
        }
        assert!(driver.linode.keys().is_empty());
        assert_eq!(driver.linode.calls(StubOperation::DeleteKey), 3);
    }

    #[tokio::test]
    async fn test_should_reject_malformed_account_id() {
        let driver = driver().await;
        let resp = driver.revoke(BUCKET_ID, "twelve").await.unwrap();
        assert_eq!(resp.status, http::StatusCode::BAD_REQUEST);
        assert_eq!(resp.body["message"], "account id is invalid");
        assert_eq!(driver.linode.calls(StubOperation::DeleteKey), 0);
    }
}
