// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of the agent.
//!
//! The messaging provider posts webhook events to the configured path; each
//! event is normalized and queued for the agent loop. `GET /health` is always
//! public.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{GatewayState, HealthState, build_router, start_server};
