// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! SIGTERM and SIGINT cancel a [`CancellationToken`] watched by the agent
//! loop, the timeout worker and the gateway. In-flight message handlers are
//! then given a bounded grace period to finish.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, shutting down");
        }

        trigger.cancel();
        debug!("signal handler finished");
    });

    token
}

/// Waits up to `timeout` for tracked handlers to finish.
///
/// Returns true when everything drained in time.
pub async fn drain_handlers(tracker: &TaskTracker, timeout: Duration) -> bool {
    tracker.close();
    if tracker.is_empty() {
        info!("no in-flight messages to drain");
        return true;
    }

    info!(count = tracker.len(), "waiting for in-flight messages");
    match tokio::time::timeout(timeout, tracker.wait()).await {
        Ok(()) => {
            info!("all handlers drained");
            true
        }
        Err(_) => {
            warn!(remaining = tracker.len(), "drain timeout reached, abandoning handlers");
            false
        }
    }
}
