//! Wire tests for the aws-sdk-s3 backed policy client against a local fake
//! S3 endpoint.

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::service::service_fn;
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
    use parking_lot::Mutex;
    use tokio::net::TcpListener;

    use linode_cosi_core::EndpointCache;
    use linode_cosi_core::linode::StubLinodeClient;
    use linode_cosi_core::s3::{LinodeS3ClientFactory, S3ClientFactory, S3Error, S3PolicyClient};

    const REGION: &str = "local";
    const POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":"*","Action":"s3:GetObject","Resource":"arn:aws:s3:::pol/*"}]}"#;

    #[derive(Debug, Clone)]
    struct Recorded {
        method: http::Method,
        path: String,
        query: String,
        body: String,
    }

    fn xml(status: u16, body: &str) -> http::Response<Full<Bytes>> {
        http::Response::builder()
            .status(status)
            .header("content-type", "application/xml")
            .header("x-amz-request-id", "fake-request")
            .body(Full::new(Bytes::from(body.to_owned())))
            .unwrap()
    }

    fn empty(status: u16) -> http::Response<Full<Bytes>> {
        http::Response::builder()
            .status(status)
            .header("x-amz-request-id", "fake-request")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn s3_error(status: u16, code: &str, message: &str) -> http::Response<Full<Bytes>> {
        xml(
            status,
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{code}</Code><Message>{message}</Message><RequestId>fake-request</RequestId></Error>"#
            ),
        )
    }

    fn list_page(contents: &[&str], next: Option<&str>) -> http::Response<Full<Bytes>> {
        let objects: String = contents
            .iter()
            .map(|k| format!("<Contents><Key>{k}</Key><Size>1</Size></Contents>"))
            .collect();
        let (truncated, token) = match next {
            Some(t) => (
                "true",
                format!("<NextContinuationToken>{t}</NextContinuationToken>"),
            ),
            None => ("false", String::new()),
        };
        xml(
            200,
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>full</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys><IsTruncated>{truncated}</IsTruncated>{token}{objects}</ListBucketResult>"#,
                contents.len()
            ),
        )
    }

    fn route(req: &Recorded) -> http::Response<Full<Bytes>> {
        let has = |param: &str| req.query.split('&').any(|p| p.split('=').next() == Some(param));

        match (req.method.as_str(), req.path.as_str()) {
            ("GET", "/full") if has("list-type") => {
                if req.query.contains("continuation-token=page-2") {
                    list_page(&["c.txt"], None)
                } else {
                    list_page(&["a.txt", "b.txt"], Some("page-2"))
                }
            }
            ("POST", "/full") if has("delete") => {
                if req.body.contains("a.txt") {
                    xml(
                        200,
                        r#"<?xml version="1.0" encoding="UTF-8"?><DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Error><Key>a.txt</Key><Code>AccessDenied</Code><Message>Access Denied</Message></Error><Error><Key>b.txt</Key><Code>InternalError</Code><Message>try again</Message></Error></DeleteResult>"#,
                    )
                } else {
                    xml(
                        200,
                        r#"<?xml version="1.0" encoding="UTF-8"?><DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Deleted><Key>c.txt</Key></Deleted></DeleteResult>"#,
                    )
                }
            }
            ("GET", "/empty") if has("list-type") => list_page(&[], None),
            ("PUT", "/pol") if has("policy") => empty(200),
            ("GET", "/pol") if has("policy") => http::Response::builder()
                .status(200)
                .header("content-type", "application/json")
                .header("x-amz-request-id", "fake-request")
                .body(Full::new(Bytes::from(POLICY)))
                .unwrap(),
            ("PUT", "/denied") if has("policy") => s3_error(403, "AccessDenied", "Access Denied"),
            ("GET", "/nopol") if has("policy") => s3_error(
                404,
                "NoSuchBucketPolicy",
                "The bucket policy does not exist",
            ),
            _ => s3_error(404, "NoSuchBucket", "The specified bucket does not exist"),
        }
    }

    struct FakeS3 {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<Recorded>>>,
        server: tokio::task::JoinHandle<()>,
    }

    impl FakeS3 {
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
                                path: parts.uri.path().to_owned(),
                                query: parts.uri.query().unwrap_or_default().to_owned(),
                                body: String::from_utf8_lossy(&body).into_owned(),
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

        fn client(&self) -> Arc<dyn S3PolicyClient> {
            let cache = EndpointCache::new(Arc::new(StubLinodeClient::new()), Duration::ZERO);
            cache.set(REGION, &format!("http://{}", self.addr));
            LinodeS3ClientFactory::new(Arc::new(cache), false).client("AK", "SK")
        }

        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().clone()
        }
    }

    impl Drop for FakeS3 {
        fn drop(&mut self) {
            self.server.abort();
        }
    }

    #[tokio::test]
    async fn test_should_collect_every_delete_failure_across_pages() {
        let s3 = FakeS3::start().await;
        let err = s3.client().prune(REGION, "full").await.unwrap_err();

        let S3Error::Multiple(errors) = &err else {
            panic!("expected accumulated errors, got {err:?}");
        };
        assert_eq!(errors.len(), 2);
        let rendered = err.to_string();
        assert!(rendered.contains("a.txt"), "{rendered}");
        assert!(rendered.contains("b.txt"), "{rendered}");
        assert!(!err.is_not_found());

        // The second page is still listed and deleted after the first batch failed.
        let requests = s3.requests();
        let lists: Vec<_> = requests
            .iter()
            .filter(|r| r.method == http::Method::GET)
            .collect();
        assert_eq!(lists.len(), 2);
        assert!(lists[1].query.contains("continuation-token=page-2"));
        let deletes: Vec<_> = requests
            .iter()
            .filter(|r| r.method == http::Method::POST)
            .collect();
        assert_eq!(deletes.len(), 2);
        assert!(deletes[1].body.contains("c.txt"));
    }

    #[tokio::test]
    async fn test_should_prune_empty_bucket_without_deletes() {
        let s3 = FakeS3::start().await;
        s3.client().prune(REGION, "empty").await.unwrap();
        assert!(
            s3.requests()
                .iter()
                .all(|r| r.method == http::Method::GET)
        );
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket_on_prune() {
        let s3 = FakeS3::start().await;
        let err = s3.client().prune(REGION, "ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_accept_plain_200_on_policy_write() {
        let s3 = FakeS3::start().await;
        s3.client()
            .set_bucket_policy(REGION, "pol", POLICY)
            .await
            .unwrap();

        let requests = s3.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, http::Method::PUT);
        assert_eq!(requests[0].body, POLICY);
    }

    #[tokio::test]
    async fn test_should_surface_rejected_policy_write() {
        let s3 = FakeS3::start().await;
        let err = s3
            .client()
            .set_bucket_policy(REGION, "denied", POLICY)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_read_bucket_policy() {
        let s3 = FakeS3::start().await;
        let policy = s3.client().get_bucket_policy(REGION, "pol").await.unwrap();
        assert_eq!(policy, POLICY);
    }

    #[tokio::test]
    async fn test_should_classify_missing_policy_as_not_found() {
        let s3 = FakeS3::start().await;
        let err = s3
            .client()
            .get_bucket_policy(REGION, "nopol")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert!(matches!(err, S3Error::Service { ref code, .. } if code.as_deref() == Some("NoSuchBucketPolicy")));
    }
}
