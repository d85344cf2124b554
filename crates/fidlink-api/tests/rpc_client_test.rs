#![allow(clippy::unwrap_used)]
// Integration tests for `RpcClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fidlink_api::{
    Error, RemoteCommand, RpcClient, SetChannelsRequest, ShutterAction, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RpcClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = RpcClient::with_client(reqwest::Client::new(), base_url, "PC61");
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_get_status_unwraps_result() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/PC61/get_status"))
        .and(body_json(json!({ "args": [], "kwargs": {} })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "10": 50, "11": -1 } })),
        )
        .mount(&server)
        .await;

    let status: std::collections::HashMap<String, f64> =
        client.call_as(&RemoteCommand::GetStatus).await.unwrap();

    assert_eq!(status["10"], 50.0);
    assert_eq!(status["11"], -1.0);
}

#[tokio::test]
async fn test_set_channels_sends_positional_args() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/PC61/set_channels"))
        .and(body_json(json!({
            "args": [["can0", "can1"], [10, 11], [5.0, 0.0]],
            "kwargs": {}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "SUCCESS" })))
        .expect(1)
        .mount(&server)
        .await;

    let cmd = RemoteCommand::SetChannels(SetChannelsRequest {
        bus_ids: vec!["can0".into(), "can1".into()],
        channel_ids: vec![10, 11],
        duty: vec![5.0, 0.0],
    });
    let result = client.call(&cmd).await.unwrap();

    assert_eq!(result, json!("SUCCESS"));
}

#[tokio::test]
async fn test_empty_body_is_null_result() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/PC61/nir_shutter"))
        .and(body_json(json!({ "args": ["open"], "kwargs": {} })))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = client
        .call(&RemoteCommand::NirShutter {
            action: ShutterAction::Open,
        })
        .await
        .unwrap();

    assert!(result.is_null());
}

// ── Error tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_envelope_is_remote_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/PC61/get_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "type": "CanBusError", "message": "can0 is down" }
        })))
        .mount(&server)
        .await;

    let result = client.call(&RemoteCommand::GetStatus).await;

    match result {
        Err(Error::Remote {
            command, message, ..
        }) => {
            assert_eq!(command, "get_status");
            assert_eq!(message, "CanBusError: can0 is down");
        }
        other => panic!("expected Remote error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_controller_is_transient_timeout() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = RpcClient::new(
        base_url,
        "PC61",
        &TransportConfig::with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/PC61/get_status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "result": {} }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.call(&RemoteCommand::GetStatus).await.unwrap_err();

    assert!(
        matches!(err, Error::Timeout { timeout_secs: 1 }),
        "expected Timeout, got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_http_failure_is_transient_remote_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/PC61/get_status"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.call(&RemoteCommand::GetStatus).await.unwrap_err();

    assert!(
        matches!(err, Error::Remote { status: 503, ref message, .. } if message == "busy"),
        "expected Remote 503, got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_invalid_request_never_reaches_server() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cmd = RemoteCommand::SetChannels(SetChannelsRequest {
        bus_ids: vec!["can0".into()],
        channel_ids: vec![10, 11],
        duty: vec![5.0, 5.0],
    });
    let err = client.call(&cmd).await.unwrap_err();

    assert!(err.is_invalid_request(), "got: {err:?}");
}

#[tokio::test]
async fn test_mistyped_result_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/PC61/get_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [1, 2, 3] })))
        .mount(&server)
        .await;

    let result: Result<std::collections::HashMap<String, f64>, _> =
        client.call_as(&RemoteCommand::GetStatus).await;

    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}
