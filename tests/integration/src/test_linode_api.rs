//! Wire tests for the Linode API client against a local fake API.

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::service::service_fn;
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
    use parking_lot::Mutex;
    use tokio::net::TcpListener;

    use linode_cosi_core::linode::{
        Acl, CreateBucketOptions, CreateKeyOptions, KeyBucketAccess, LinodeApiClient,
        LinodeApiConfig, LinodeClient, Permissions,
    };

    const TOKEN: &str = "secret-token";

    /// A request as seen by the fake API.
    #[derive(Debug, Clone)]
    struct Recorded {
        method: http::Method,
        uri: String,
        authorization: Option<String>,
        body: Bytes,
    }

    fn json(status: u16, body: &serde_json::Value) -> http::Response<Full<Bytes>> {
        http::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    fn route(req: &Recorded) -> http::Response<Full<Bytes>> {
        if req.authorization.as_deref() != Some(format!("Bearer {TOKEN}").as_str()) {
            return json(
                401,
                &serde_json::json!({"errors": [{"reason": "Invalid Token"}]}),
            );
        }

        match (req.method.as_str(), req.uri.as_str()) {
            ("GET", "/v4/object-storage/endpoints?page=1") => json(
                200,
                &serde_json::json!({
                    "data": [{"region": "us-east", "endpoint_type": "E1", "s3_endpoint": "us-east-1.linodeobjects.com"}],
                    "page": 1, "pages": 2, "results": 2
                }),
            ),
            ("GET", "/v4/object-storage/endpoints?page=2") => json(
                200,
                &serde_json::json!({
                    "data": [{"region": "se-sto", "endpoint_type": "E3", "s3_endpoint": null}],
                    "page": 2, "pages": 2, "results": 2
                }),
            ),
            ("GET", "/v4/object-storage/keys?page=1") => json(
                200,
                &serde_json::json!({
                    "data": [{"id": 7, "label": "k", "access_key": "AK", "secret_key": "[REDACTED]", "limited": false, "bucket_access": null}],
                    "page": 1, "pages": 1, "results": 1
                }),
            ),
            ("POST", "/v4/object-storage/buckets") => {
                let opts: serde_json::Value =
                    serde_json::from_slice(&req.body).unwrap_or_default();
                json(
                    200,
                    &serde_json::json!({
                        "region": opts["region"],
                        "label": opts["label"],
                        "hostname": "b.us-east-1.linodeobjects.com",
                        "objects": 0,
                        "size": 0,
                        "created": "2026-01-01T00:00:00"
                    }),
                )
            }
            ("POST", "/v4/object-storage/keys") => {
                let opts: serde_json::Value =
                    serde_json::from_slice(&req.body).unwrap_or_default();
                json(
                    200,
                    &serde_json::json!({
                        "id": 42,
                        "label": opts["label"],
                        "access_key": "AK42",
                        "secret_key": "SK42",
                        "limited": true,
                        "bucket_access": opts["bucket_access"]
                    }),
                )
            }
            ("GET", "/v4/object-storage/buckets/us-east/missing") => json(
                404,
                &serde_json::json!({"errors": [{"reason": "Not found"}]}),
            ),
            ("DELETE", "/v4/object-storage/buckets/us-east/full") => json(
                400,
                &serde_json::json!({"errors": [{"reason": "Bucket not empty"}]}),
            ),
            ("DELETE", "/v4/object-storage/keys/42") => json(200, &serde_json::json!({})),
            _ => json(
                404,
                &serde_json::json!({"errors": [{"reason": "Not found"}]}),
            ),
        }
    }

    struct FakeApi {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<Recorded>>>,
        server: tokio::task::JoinHandle<()>,
    }

    impl FakeApi {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let requests = Arc::new(Mutex::new(Vec::new()));

            let log = Arc::clone(&requests);
            let server = tokio::spawn(async move {
                let http = HttpConnBuilder::new(TokioExecutor::new());
                while let Ok((stream, _)) = listener.accept().await {
                    let log = Arc::clone(&log);
                    let svc = service_fn(move |req: http::Request<Incoming>| {
                        let log = Arc::clone(&log);
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body
                                .collect()
                                .await
                                .map(http_body_util::Collected::to_bytes)
                                .unwrap_or_default();
                            let recorded = Recorded {
                                method: parts.method,
                                uri: parts.uri.to_string(),
                                authorization: parts
                                    .headers
                                    .get("authorization")
                                    .and_then(|v| v.to_str().ok())
                                    .map(str::to_owned),
                                body,
                            };
                            let resp = route(&recorded);
                            log.lock().push(recorded);
                            Ok::<_, Infallible>(resp)
                        }
                    });
                    let conn = http.serve_connection(TokioIo::new(stream), svc).into_owned();
                    tokio::spawn(async move {
                        let _ = conn.await;
                    });
                }
            });

            Self {
                addr,
                requests,
                server,
            }
        }

        fn client(&self, token: &str) -> LinodeApiClient {
            LinodeApiClient::new(&LinodeApiConfig {
                token: token.to_owned(),
                api_url: format!("http://{}", self.addr),
                api_version: "v4".to_owned(),
                user_agent: "linode-cosi-driver/test".to_owned(),
            })
            .unwrap()
        }

        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().clone()
        }
    }

    impl Drop for FakeApi {
        fn drop(&mut self) {
            self.server.abort();
        }
    }

    #[tokio::test]
    async fn test_should_follow_endpoint_pages() {
        let api = FakeApi::start().await;
        let endpoints = api.client(TOKEN).list_endpoints().await.unwrap();

        assert_eq!(endpoints.len(), 2);
        assert_eq!(
            endpoints[0].s3_endpoint.as_deref(),
            Some("us-east-1.linodeobjects.com")
        );
        assert_eq!(endpoints[1].region, "se-sto");
        assert!(endpoints[1].s3_endpoint.is_none());

        let uris: Vec<String> = api.requests().into_iter().map(|r| r.uri).collect();
        assert_eq!(
            uris,
            [
                "/v4/object-storage/endpoints?page=1",
                "/v4/object-storage/endpoints?page=2"
            ]
        );
    }

    #[tokio::test]
    async fn test_should_send_bearer_token() {
        let api = FakeApi::start().await;
        api.client(TOKEN).list_keys().await.unwrap();

        let requests = api.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].authorization.as_deref(),
            Some("Bearer secret-token")
        );
    }

    #[tokio::test]
    async fn test_should_surface_rejected_token() {
        let api = FakeApi::start().await;
        let err = api.client("wrong").list_keys().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "[401] Invalid Token");
    }

    #[tokio::test]
    async fn test_should_decode_null_bucket_access() {
        let api = FakeApi::start().await;
        let keys = api.client(TOKEN).list_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].bucket_access.is_empty());
    }

    #[tokio::test]
    async fn test_should_map_missing_bucket_to_not_found() {
        let api = FakeApi::start().await;
        let err = api
            .client(TOKEN)
            .get_bucket("us-east", "missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "[404] Not found");
    }

    #[tokio::test]
    async fn test_should_report_non_empty_bucket() {
        let api = FakeApi::start().await;
        let err = api
            .client(TOKEN)
            .delete_bucket("us-east", "full")
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("Bucket not empty"));
    }

    #[tokio::test]
    async fn test_should_post_bucket_options() {
        let api = FakeApi::start().await;
        let bucket = api
            .client(TOKEN)
            .create_bucket(CreateBucketOptions {
                region: "us-east".to_owned(),
                label: "b".to_owned(),
                acl: Some(Acl::PublicRead),
                cors_enabled: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(bucket.label, "b");

        let requests = api.requests();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"region": "us-east", "label": "b", "acl": "public-read", "cors_enabled": false})
        );
    }

    #[tokio::test]
    async fn test_should_create_and_delete_limited_key() {
        let api = FakeApi::start().await;
        let client = api.client(TOKEN);
        let key = client
            .create_key(CreateKeyOptions {
                label: "ba-1".to_owned(),
                bucket_access: Some(vec![KeyBucketAccess {
                    region: "us-east".to_owned(),
                    bucket_name: "b".to_owned(),
                    permissions: Permissions::ReadWrite,
                }]),
            })
            .await
            .unwrap();

        assert_eq!(key.id, 42);
        assert_eq!(key.secret_key, "SK42");
        assert!(key.limited);
        assert_eq!(key.bucket_access[0].permissions, Permissions::ReadWrite);

        client.delete_key(key.id).await.unwrap();

        let requests = api.requests();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "label": "ba-1",
                "bucket_access": [{"region": "us-east", "bucket_name": "b", "permissions": "read_write"}]
            })
        );
        assert_eq!(requests[1].method, http::Method::DELETE);
        assert_eq!(requests[1].uri, "/v4/object-storage/keys/42");
    }
}
