//! End-to-end tests of the client against a mock gateway

use bytes::Bytes;
use mefs_client::{Client, ClientError, Config, Context, Credentials, LfsOptions, RequestBody};
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{body_bytes, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS: &str = "0x39051EECB105f203fA5613deb5ee33b35a07834a";

// Client with millisecond backoff so retry tests stay fast
async fn spawn_gateway() -> (MockServer, Client) {
    let server = MockServer::start().await;
    let config = Config::new(server.uri())
        .with_retry_backoff(Duration::from_millis(1), Duration::from_millis(10))
        .with_timeout(Duration::from_secs(5));
    let client = Client::new(config, Credentials::new_static_v4(ADDRESS, "123456", "")).unwrap();
    (server, client)
}

fn head_object_reply() -> serde_json::Value {
    serde_json::json!({
        "Method": "Head Object",
        "Objects": [{
            "ObjectName": "report.pdf",
            "ObjectSize": 52_428,
            "MD5": "9e107d9d372bb6826bd81d3542a419d6",
            "Ctime": "2024-03-01 Fri 10:20:30 CST",
            "Dir": false,
            "LatestChalTime": ""
        }]
    })
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/head_object"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/head_object"))
        .respond_with(ResponseTemplate::new(200).set_body_json(head_object_reply()))
        .mount(&server)
        .await;

    let info = client.stat_object("docs", "report.pdf").await.unwrap();
    assert_eq!(info.key, "report.pdf");
    assert_eq!(info.size, 52_428);
    assert_eq!(info.etag, "9e107d9d372bb6826bd81d3542a419d6");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_stat_object_sends_address_and_args() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/head_object"))
        .and(query_param("arg", "docs"))
        .and(query_param("arg", "report.pdf"))
        .and(query_param("address", ADDRESS))
        .respond_with(ResponseTemplate::new(200).set_body_json(head_object_reply()))
        .expect(1)
        .mount(&server)
        .await;

    let info = client.stat_object("docs", "report.pdf").await.unwrap();
    assert!(info.last_modified.is_some());
}

#[tokio::test]
async fn test_missing_object_is_not_retried() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("GET"))
        .and(path("/docs/missing.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message>\
             <RequestId>4442587FB7D0A2F9</RequestId></Error>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = mefs_client::RequestMetadata::new()
        .bucket("docs")
        .object("missing.txt");
    let err = client
        .execute(&Context::background(), mefs_client::Method::GET, metadata)
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    let resp = err.error_response().unwrap();
    assert_eq!(resp.request_id, "4442587FB7D0A2F9");
    assert_eq!(resp.bucket_name, "docs");
    assert!(String::from_utf8_lossy(&resp.body).contains("NoSuchKey"));
}

#[tokio::test]
async fn test_bucket_exists_maps_missing_bucket_to_false() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/head_Bucket"))
        .and(query_param("arg", "present"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Method": "Head Bucket",
            "Buckets": [{"BucketName": "present", "BucketID": 1, "Ctime": "", "Policy": 1, "DataCount": 3, "ParityCount": 2}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/head_Bucket"))
        .and(query_param("arg", "absent"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.bucket_exists("present").await.unwrap());
    assert!(!client.bucket_exists("absent").await.unwrap());
}

#[tokio::test]
async fn test_file_upload_is_replayed_after_failure() {
    let (server, client) = spawn_gateway().await;
    let payload = b"ledger entries for march".to_vec();

    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/put_object"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/put_object"))
        .and(body_bytes(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Method": "Put Object",
            "Objects": [{"ObjectName": "march.log", "ObjectSize": 24, "MD5": "", "Ctime": "", "Dir": false, "LatestChalTime": ""}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&payload).unwrap();
    let reader = tokio::fs::File::open(file.path()).await.unwrap();

    let info = client
        .put_object("logs", "march.log", RequestBody::seekable(reader), &LfsOptions::new())
        .await
        .unwrap();
    assert_eq!(info.key, "march.log");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.body == payload));
}

#[tokio::test]
async fn test_stream_upload_gets_one_attempt() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/put_object"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let body = RequestBody::stream(std::io::Cursor::new(b"piped data".to_vec()));
    let err = client
        .put_object("logs", "piped.log", body, &LfsOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.error_response().unwrap().status, 503);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redirects_are_not_followed() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/version"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/elsewhere", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.version().await.unwrap_err();
    assert_eq!(err.error_response().unwrap().status, 301);
}

#[tokio::test]
async fn test_list_keepers_and_location() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/lfs/list_keepers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Peers": [
                {"PeerID": "8MGxCuiT75bje883b7uFb6eMrJt5cP", "Connected": true},
                {"PeerID": "8MHyzMvKv2eCg1yXJ7RjkJtfSbdgbr", "Connected": false}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/"))
        .and(query_param("location", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<LocationConstraint xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\"></LocationConstraint>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let keepers = client.list_keepers(&LfsOptions::new()).await.unwrap();
    assert_eq!(
        keepers.to_string(),
        "8MGxCuiT75bje883b7uFb6eMrJt5cP connected\n8MHyzMvKv2eCg1yXJ7RjkJtfSbdgbr unconnected\n"
    );

    assert_eq!(client.get_bucket_location("docs").await.unwrap(), "us-east-1");
    assert_eq!(client.get_bucket_location("docs").await.unwrap(), "us-east-1");
}

#[tokio::test]
async fn test_deadline_cuts_slow_request() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/swarm/peers"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let ctx = Context::background().with_timeout(Duration::from_millis(100));
    let err = client.swarm_peers(&ctx).await.unwrap_err();
    assert!(matches!(err, ClientError::DeadlineExceeded));
}

#[tokio::test]
async fn test_block_get_returns_raw_bytes() {
    let (server, client) = spawn_gateway().await;

    Mock::given(method("POST"))
        .and(path("/api/v0/block/get"))
        .and(query_param("arg", "bafkreihdwdcef"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 255]))
        .mount(&server)
        .await;

    let block = client.block_get("bafkreihdwdcef").await.unwrap();
    assert_eq!(block, Bytes::from_static(&[0, 1, 2, 255]));
}
