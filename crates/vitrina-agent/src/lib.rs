// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation engine for the Vitrina commerce agent.
//!
//! The [`AgentLoop`] is the central coordinator that:
//! - Receives canonical messages from the webhook gateway
//! - Drops re-delivered message ids
//! - Routes album images through the [`AlbumAggregator`]
//! - Runs everything else through the [`ConversationPipeline`] in the background
//! - Drains in-flight handlers on shutdown

pub mod actions;
pub mod album;
pub mod dedupe;
pub mod intent;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod shutdown;
pub mod state;
pub mod timeout;
pub mod tone;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use vitrina_core::{InboundMessage, MessageContent};

pub use album::{AlbumAggregator, AlbumSettings};
pub use dedupe::IdempotencyGuard;
pub use pipeline::{Adapters, ConversationPipeline};
pub use session::SessionStore;
pub use timeout::TimeoutWorker;

/// Grace period for in-flight handlers at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Where an inbound message goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Already seen; drop silently.
    Duplicate,
    /// Album image still to be buffered.
    Album,
    /// Straight into the conversation pipeline.
    Pipeline,
}

/// Claims the message id and picks the route for `message`.
///
/// A failing idempotency check lets the message through: a cache outage
/// must not silence the bot.
pub async fn route(guard: &IdempotencyGuard, message: &InboundMessage) -> Route {
    match guard.try_claim(&message.id).await {
        Ok(true) => {}
        Ok(false) => return Route::Duplicate,
        Err(e) => warn!(id = %message.id, error = %e, "idempotency check failed, processing anyway"),
    }
    let unresolved_album_image = message.album_id.is_some()
        && matches!(&message.content, MessageContent::Image { resolved, .. } if resolved.is_empty());
    if unresolved_album_image {
        Route::Album
    } else {
        Route::Pipeline
    }
}

/// Receives canonical inbound messages and dispatches them.
pub struct AgentLoop {
    rx: mpsc::Receiver<InboundMessage>,
    guard: IdempotencyGuard,
    albums: AlbumAggregator,
    pipeline: Arc<ConversationPipeline>,
    tracker: TaskTracker,
}

impl AgentLoop {
    pub fn new(
        rx: mpsc::Receiver<InboundMessage>,
        guard: IdempotencyGuard,
        albums: AlbumAggregator,
        pipeline: Arc<ConversationPipeline>,
    ) -> Self {
        Self {
            rx,
            guard,
            albums,
            pipeline,
            tracker: TaskTracker::new(),
        }
    }

    /// Handle to the in-flight handler set, for tests and shutdown.
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// Runs until `cancel` fires or every sender is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("agent loop running");
        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(message) => self.dispatch(message).await,
                    None => {
                        debug!("agent channel closed");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping agent loop");
                    break;
                }
            }
        }

        self.albums.cancel_all();
        shutdown::drain_handlers(&self.tracker, DRAIN_TIMEOUT).await;
        info!("agent loop stopped");
    }

    async fn dispatch(&self, message: InboundMessage) {
        match route(&self.guard, &message).await {
            Route::Duplicate => {
                debug!(id = %message.id, "duplicate delivery dropped");
            }
            Route::Album => {
                let albums = self.albums.clone();
                let seq = albums.next_seq();
                self.tracker.spawn(async move {
                    if let Err(e) = albums.add(message, seq).await {
                        warn!(error = %e, "album image dropped");
                    }
                });
            }
            Route::Pipeline => {
                let pipeline = self.pipeline.clone();
                self.tracker.spawn(async move {
                    let id = message.id.clone();
                    if let Err(e) = pipeline.handle(message).await {
                        error!(%id, error = %e, "failed to handle inbound message");
                    }
                });
            }
        }
    }
}
