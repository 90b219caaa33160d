//! Contract tests for RobloxClient against mocked users and inventory APIs.

use seisen_client::config::DEFAULT_ROBLOX_PRODUCT_ID;
use seisen_client::{OwnershipError, OwnershipSource, RetryPolicy, RobloxClient, RobloxConfig};
use seisen_core::Timestamp;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCT: u64 = DEFAULT_ROBLOX_PRODUCT_ID;

fn client(mock_server: &MockServer, api_key: Option<&str>) -> RobloxClient {
    let mut config = RobloxConfig::local_mock(&mock_server.uri()).unwrap();
    config.api_key = api_key.map(|k| zeroize::Zeroizing::new(k.to_string()));
    RobloxClient::new(&config)
        .unwrap()
        .with_retry(RetryPolicy::NONE)
}

async fn mount_user(mock_server: &MockServer, id: u64, name: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/usernames/users"))
        .and(body_partial_json(json!({ "excludeBannedUsers": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "requestedUsername": name.to_lowercase(), "id": id, "name": name, "displayName": name }]
        })))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn observe_picks_newest_instance() {
    let mock_server = MockServer::start().await;
    mount_user(&mock_server, 1234, "Builderman").await;

    Mock::given(method("GET"))
        .and(path(format!("/v1/users/1234/items/Asset/{PRODUCT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "previousPageCursor": null,
            "nextPageCursor": null,
            "data": [
                { "type": "Asset", "id": PRODUCT, "instanceId": 111, "created": "2024-01-01T00:00:00Z" },
                { "type": "Asset", "id": PRODUCT, "instanceId": 222, "created": "2024-06-01T00:00:00Z" }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let report = client(&mock_server, None)
        .observe("builderman", PRODUCT)
        .await
        .unwrap();
    assert_eq!(report.user_id, 1234);
    assert_eq!(report.username, "Builderman");
    assert_eq!(report.transaction_id().as_str(), format!("ROBLOX_1234_{PRODUCT}"));
    assert_eq!(report.observation.observed_signal.as_deref(), Some("222"));
    assert_eq!(
        report.observation.observed_created,
        Some(Timestamp::parse("2024-06-01T00:00:00Z").unwrap())
    );
}

#[tokio::test]
async fn observe_without_created_leaves_it_unset() {
    let mock_server = MockServer::start().await;
    mount_user(&mock_server, 5, "Guest").await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/users/5/items/Asset/{PRODUCT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "instanceId": 9 }]
        })))
        .mount(&mock_server)
        .await;

    let report = client(&mock_server, None).observe("Guest", PRODUCT).await.unwrap();
    assert_eq!(report.observation.observed_signal.as_deref(), Some("9"));
    assert_eq!(report.observation.observed_created, None);
}

#[tokio::test]
async fn unknown_user_is_reported() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/usernames/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server, None)
        .observe("nobody", PRODUCT)
        .await
        .unwrap_err();
    assert!(matches!(err, OwnershipError::UserNotFound { .. }));
    assert_eq!(err.to_string(), "Roblox user not found");
}

#[tokio::test]
async fn empty_inventory_is_not_owned() {
    let mock_server = MockServer::start().await;
    mount_user(&mock_server, 77, "Window").await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/users/77/items/Asset/{PRODUCT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server, None)
        .observe("Window", PRODUCT)
        .await
        .unwrap_err();
    assert!(matches!(err, OwnershipError::NotOwned { user_id: 77, .. }));
}

#[tokio::test]
async fn private_inventory_is_reported() {
    let mock_server = MockServer::start().await;
    mount_user(&mock_server, 78, "Shy").await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/users/78/items/Asset/{PRODUCT}")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "errors": [{ "code": 4, "message": "You don't have permissions to view the specified user's inventory." }]
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server, None).observe("Shy", PRODUCT).await.unwrap_err();
    assert!(matches!(err, OwnershipError::InventoryPrivate { user_id: 78 }));
}

#[tokio::test]
async fn upstream_failure_is_wrapped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/usernames/users"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server, None).observe("any", PRODUCT).await.unwrap_err();
    match err {
        OwnershipError::Upstream(inner) => assert_eq!(inner.status(), Some(503)),
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn api_key_is_sent_when_configured() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/usernames/users"))
        .and(header("x-api-key", "rbx-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let _ = client(&mock_server, Some("rbx-secret"))
        .observe("someone", PRODUCT)
        .await;
}
