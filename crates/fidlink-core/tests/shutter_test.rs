#![allow(clippy::unwrap_used)]
// Shutter harness tests against wiremock spectrograph controllers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fidlink_core::{Preparation, ShutterAction, ShutterBank, Spectrograph, SpectrographTarget};

fn spectrograph(server: &MockServer, name: &str) -> Spectrograph {
    let addr = server.address();
    let target: SpectrographTarget = format!("{name}@{}:{}", addr.ip(), addr.port())
        .parse()
        .unwrap();
    Spectrograph::connect(target, Duration::from_secs(5))
}

async fn mount_ok(server: &MockServer, route: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": null })))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_prepare_powers_and_deflates_when_needed() {
    let server = MockServer::start().await;

    mount_ok(&server, "/SP5/configure", 1).await;
    Mock::given(method("POST"))
        .and(path("/SP5/get"))
        .and(body_json(json!({ "args": ["mechanism"], "kwargs": {} })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "nir_shutter_power": "OFF", "nir_shutter_seal": "INFLATED", "hartmann": "CLOSED" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/SP5/power"))
        .and(body_json(json!({ "args": [], "kwargs": { "device": "nir_shutter", "action": "on" } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/SP5/seal"))
        .and(body_json(
            json!({ "args": [], "kwargs": { "shutter": "nir_shutter", "action": "deflate" } }),
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let prep = spectrograph(&server, "SP5").prepare().await.unwrap();
    assert_eq!(
        prep,
        Preparation {
            powered_on: true,
            deflated: true
        }
    );
}

#[tokio::test]
async fn test_prepare_leaves_ready_spectrograph_alone() {
    let server = MockServer::start().await;

    mount_ok(&server, "/SP6/configure", 1).await;
    Mock::given(method("POST"))
        .and(path("/SP6/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "nir_shutter_power": "ON", "nir_shutter_seal": "DEFLATED" }
        })))
        .mount(&server)
        .await;
    mount_ok(&server, "/SP6/power", 0).await;
    mount_ok(&server, "/SP6/seal", 0).await;

    let prep = spectrograph(&server, "SP6").prepare().await.unwrap();
    assert_eq!(prep, Preparation::default());
}

#[tokio::test]
async fn test_bank_delivers_every_action_to_every_spectrograph() {
    let server = MockServer::start().await;

    for name in ["SP5", "SP6"] {
        for action in ["open", "close"] {
            Mock::given(method("POST"))
                .and(path(format!("/{name}/nir_shutter")))
                .and(body_json(json!({ "args": [action], "kwargs": {} })))
                .respond_with(ResponseTemplate::new(200))
                .expect(2)
                .mount(&server)
                .await;
        }
    }

    let bank = ShutterBank::new(
        vec![
            Arc::new(spectrograph(&server, "SP5")),
            Arc::new(spectrograph(&server, "SP6")),
        ],
        4,
    );
    assert_eq!(bank.len(), 2);

    for _ in 0..2 {
        bank.send_all(ShutterAction::Open).await.unwrap();
        bank.send_all(ShutterAction::Close).await.unwrap();
    }
    bank.shutdown().await;
}

#[tokio::test]
async fn test_worker_keeps_going_after_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/SP7/nir_shutter"))
        .and(body_json(json!({ "args": ["open"], "kwargs": {} })))
        .respond_with(ResponseTemplate::new(500).set_body_string("jammed"))
        .expect(2)
        .mount(&server)
        .await;
    mount_ok(&server, "/SP7/nir_shutter", 1).await;

    let bank = ShutterBank::new(vec![Arc::new(spectrograph(&server, "SP7"))], 1);
    bank.send_all(ShutterAction::Open).await.unwrap();
    bank.send_all(ShutterAction::Close).await.unwrap();
    bank.shutdown().await;
}
