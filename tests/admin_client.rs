use rgw_usage_exporter::{
    auth::Credentials,
    errors::AppError,
    models::UsageQuery,
    services::{AdminApi, RgwAdminClient},
};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{header_exists, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn client(server: &MockServer) -> RgwAdminClient {
    RgwAdminClient::with_options(
        &server.uri(),
        Credentials {
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        },
        "default",
        Duration::from_secs(5),
        false,
    )
    .unwrap()
}

#[tokio::test]
async fn test_get_usage_sends_signed_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/usage"))
        .and(query_param("format", "json"))
        .and(query_param("show-summary", "false"))
        .and(query_param("start", "2024-05-01"))
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .and(header_exists("x-amz-content-sha256"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{
                "user": "alice",
                "buckets": [{
                    "bucket": "photos",
                    "owner": "alice",
                    "time": "2024-05-01T00:00:00.000000Z",
                    "epoch": 1714521600,
                    "categories": [{
                        "category": "get_obj",
                        "bytes_sent": 1024,
                        "bytes_received": 0,
                        "ops": 4,
                        "successful_ops": 3
                    }]
                }]
            }],
            "summary": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = client(&server)
        .get_usage(&UsageQuery {
            start: "2024-05-01".to_string(),
            show_summary: false,
        })
        .await
        .unwrap();

    assert_eq!(report.entries.len(), 1);
    let category = &report.entries[0].buckets[0].categories[0];
    assert_eq!(category.ops, 4);
    assert_eq!(category.successful_ops, 3);
    assert_eq!(category.bytes_sent, 1024);
}

#[tokio::test]
async fn test_list_buckets_with_stat() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/bucket"))
        .and(query_param("stats", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "bucket": "photos",
                "owner": "alice",
                "num_shards": 11,
                "usage": { "rgw.main": { "size": 2048, "size_actual": 4096, "num_objects": 2 } },
                "bucket_quota": { "enabled": true, "max_size": 8192, "max_objects": -1 }
            },
            { "bucket": "empty", "owner": "bob", "usage": {} }
        ])))
        .mount(&server)
        .await;

    let buckets = client(&server).list_buckets_with_stat().await.unwrap();

    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].size(), 2048.0);
    assert_eq!(buckets[0].shard_count(), 11.0);
    assert_eq!(buckets[1].objects(), 0.0);
}

#[tokio::test]
async fn test_get_users_and_user() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/metadata/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["alice", "bob"])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/user"))
        .and(query_param("uid", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "alice",
            "display_name": "Alice",
            "email": "alice@example.net",
            "suspended": 1,
            "max_buckets": 1000,
            "user_quota": { "enabled": true, "max_size_kb": 10, "max_objects": 500 },
            "bucket_quota": { "enabled": false, "max_size": -1, "max_objects": -1 }
        })))
        .mount(&server)
        .await;

    let client = client(&server);

    assert_eq!(client.get_users().await.unwrap(), vec!["alice", "bob"]);

    let user = client.get_user("alice").await.unwrap();
    assert_eq!(user.display_name, "Alice");
    assert_eq!(user.suspended, Some(1));
    assert_eq!(user.user_quota.normalize().max_size_bytes, 10240.0);
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/bucket"))
        .respond_with(ResponseTemplate::new(403).set_body_string(r#"{"Code":"AccessDenied"}"#))
        .mount(&server)
        .await;

    let err = client(&server).list_buckets_with_stat().await.unwrap_err();

    match err {
        AppError::AdminApi { status, path, body } => {
            assert_eq!(status, 403);
            assert_eq!(path, "/admin/bucket");
            assert!(body.contains("AccessDenied"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/metadata/user"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).get_users().await.unwrap_err();
    assert!(matches!(err, AppError::Decode(_)));
}
