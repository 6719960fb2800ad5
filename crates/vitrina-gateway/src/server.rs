// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use vitrina_config::model::GatewayConfig;
use vitrina_core::{InboundMessage, VitrinaError};

use crate::auth::{AuthConfig, api_key_middleware};
use crate::handlers;

#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
}

/// Shared state for the webhook handler.
#[derive(Clone)]
pub struct GatewayState {
    /// Queue feeding the agent loop.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(inbound_tx: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            inbound_tx,
            health: HealthState {
                start_time: Instant::now(),
            },
        }
    }
}

/// Routes:
/// - POST `webhook_path` (API key checked when configured)
/// - GET /health (public)
pub fn build_router(config: &GatewayConfig, state: GatewayState) -> Router {
    let path = if config.webhook_path.starts_with('/') {
        config.webhook_path.clone()
    } else {
        format!("/{}", config.webhook_path)
    };
    let auth = AuthConfig {
        api_key: config.api_key.clone(),
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.health.clone());

    let webhook_routes = Router::new()
        .route(&path, post(handlers::post_webhook))
        .route_layer(axum_middleware::from_fn_with_state(auth, api_key_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serves until `cancel` fires.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), VitrinaError> {
    let app = build_router(config, state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VitrinaError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(%addr, webhook = %config.webhook_path, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| VitrinaError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
