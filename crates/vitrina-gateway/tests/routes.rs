// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use vitrina_config::model::GatewayConfig;
use vitrina_core::InboundMessage;
use vitrina_gateway::{GatewayState, build_router};

fn app(api_key: Option<&str>) -> (Router, mpsc::Receiver<InboundMessage>) {
    let (tx, rx) = mpsc::channel(8);
    let config = GatewayConfig {
        api_key: api_key.map(str::to_string),
        ..GatewayConfig::default()
    };
    (build_router(&config, GatewayState::new(tx)), rx)
}

fn webhook(body: impl Into<Body>, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/webhook").header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("apikey", key);
    }
    builder.body(body.into()).unwrap()
}

fn text_upsert(id: &str, text: &str) -> String {
    json!({
        "event": "messages.upsert",
        "instance": "vitrina",
        "data": {
            "key": {"remoteJid": "5491122334455@s.whatsapp.net", "fromMe": false, "id": id},
            "message": {"conversation": text},
            "messageTimestamp": 1700000000
        }
    })
    .to_string()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn webhook_queues_normalized_message() {
    let (app, mut rx) = app(None);
    let response = app.oneshot(webhook(text_upsert("ABC1", "hola"), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["accepted"], 1);

    let message = rx.try_recv().unwrap();
    assert_eq!(message.id.0, "ABC1");
    assert_eq!(message.phone, "5491122334455");
    assert_eq!(message.text(), Some("hola"));
}

#[tokio::test]
async fn malformed_payload_still_gets_200() {
    let (app, mut rx) = app(None);
    let response = app.oneshot(webhook("{not json", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ignored");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn connection_events_are_acknowledged_and_dropped() {
    let (app, mut rx) = app(None);
    let body = json!({"event": "QR_UPDATED", "data": {"qrcode": "..."}}).to_string();
    let response = app.oneshot(webhook(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["accepted"], 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn api_key_is_enforced_when_configured() {
    let (app, mut rx) = app(Some("s3cret"));

    let missing = app
        .clone()
        .oneshot(webhook(text_upsert("A", "hola"), None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(webhook(text_upsert("B", "hola"), Some("nope")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(rx.try_recv().is_err());

    let ok = app
        .oneshot(webhook(text_upsert("C", "hola"), Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(rx.try_recv().unwrap().id.0, "C");
}

#[tokio::test]
async fn health_is_public() {
    let (app, _rx) = app(Some("s3cret"));
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn closed_agent_queue_does_not_fail_delivery() {
    let (app, rx) = app(None);
    drop(rx);
    let response = app.oneshot(webhook(text_upsert("Z", "hola"), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["accepted"], 0);
}

#[tokio::test]
async fn full_agent_queue_answers_without_waiting() {
    let (tx, mut rx) = mpsc::channel(1);
    let app = build_router(&GatewayConfig::default(), GatewayState::new(tx));

    let first = app
        .clone()
        .oneshot(webhook(text_upsert("Q1", "hola"), None))
        .await
        .unwrap();
    assert_eq!(json_body(first).await["accepted"], 1);

    let overflow = tokio::time::timeout(
        std::time::Duration::from_millis(500),
        app.oneshot(webhook(text_upsert("Q2", "hola"), None)),
    )
    .await
    .expect("webhook blocked on a full queue")
    .unwrap();
    assert_eq!(overflow.status(), StatusCode::OK);
    assert_eq!(json_body(overflow).await["accepted"], 0);

    assert_eq!(rx.try_recv().unwrap().id.0, "Q1");
    assert!(rx.try_recv().is_err());
}
