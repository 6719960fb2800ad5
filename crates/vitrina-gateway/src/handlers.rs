// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers.

use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::server::{GatewayState, HealthState};

/// Acknowledgement returned for every webhook delivery.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    /// Messages queued for the agent.
    pub accepted: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// POST {webhook_path}
///
/// Always answers 200 so the provider does not redeliver payloads the agent
/// cannot use; dropped events are logged instead. Never waits for room in
/// the agent queue.
pub async fn post_webhook(State(state): State<GatewayState>, body: Bytes) -> Json<WebhookAck> {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "webhook body is not JSON");
            return Json(WebhookAck {
                status: "ignored",
                accepted: 0,
            });
        }
    };
    let messages = match vitrina_whatsapp::normalize_payload(&payload) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(error = %e, "unrecognized webhook envelope");
            return Json(WebhookAck {
                status: "ignored",
                accepted: 0,
            });
        }
    };

    let mut accepted = 0;
    for message in messages {
        let id = message.id.clone();
        match state.inbound_tx.try_send(message) {
            Ok(()) => {
                debug!(%id, "message queued");
                accepted += 1;
            }
            Err(TrySendError::Full(_)) => warn!(%id, "inbound queue full, message dropped"),
            Err(TrySendError::Closed(_)) => warn!(%id, "agent loop not accepting messages"),
        }
    }
    Json(WebhookAck {
        status: "received",
        accepted,
    })
}

/// GET /health
pub async fn get_health(State(health): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: health.start_time.elapsed().as_secs(),
    })
}
