// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional shared-secret check for webhook deliveries.
//!
//! When `gateway.api_key` is set, requests must carry it in the `apikey`
//! header, which is how the WhatsApp bridge signs its webhook calls. Without
//! a key every delivery is accepted.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Webhook authentication configuration.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

pub async fn api_key_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };
    let provided = request
        .headers()
        .get("apikey")
        .and_then(|v| v.to_str().ok());
    if provided == Some(expected) {
        Ok(next.run(request).await)
    } else {
        tracing::debug!(present = provided.is_some(), "webhook rejected: api key mismatch");
        Err(StatusCode::UNAUTHORIZED)
    }
}
