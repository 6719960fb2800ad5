// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message conversation pipeline.
//!
//! load/init session -> heuristics -> classify -> execute -> transition ->
//! save -> reply. Every step that talks to a collaborator degrades to a
//! message for the operator instead of failing the turn.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use vitrina_config::VitrinaConfig;
use vitrina_core::{
    CacheAdapter, CatalogAdapter, EnrichmentAdapter, HistoryEntry, InboundMessage,
    InferenceAdapter, MediaAttachment, MessageContent, MessagingAdapter, ProductDraft, Role,
    SessionState, VitrinaError,
};

use crate::actions::{ActionExecutor, ActionOutcome};
use crate::intent::IntentProcessor;
use crate::session::{SessionStore, warned_key};
use crate::tone::{self, by_tone};
use crate::{prompt, state};

/// The external collaborators the agent is wired to.
#[derive(Clone)]
pub struct Adapters {
    pub cache: Arc<dyn CacheAdapter>,
    pub catalog: Arc<dyn CatalogAdapter>,
    pub messenger: Arc<dyn MessagingAdapter>,
    pub inference: Arc<dyn InferenceAdapter>,
    pub enricher: Arc<dyn EnrichmentAdapter>,
}

/// Processes one canonical inbound message end to end.
pub struct ConversationPipeline {
    store: Arc<SessionStore>,
    intents: IntentProcessor,
    executor: ActionExecutor,
    messenger: Arc<dyn MessagingAdapter>,
    inference: Arc<dyn InferenceAdapter>,
    media_timeout: Duration,
    transcription_timeout: Duration,
}

impl ConversationPipeline {
    pub fn new(config: &VitrinaConfig, adapters: &Adapters, store: Arc<SessionStore>) -> Self {
        Self {
            store,
            intents: IntentProcessor::new(
                adapters.inference.clone(),
                adapters.catalog.clone(),
                config.agent.history_window,
                Duration::from_secs(config.inference.timeout_secs),
            ),
            executor: ActionExecutor::new(
                adapters.catalog.clone(),
                adapters.messenger.clone(),
                adapters.enricher.clone(),
                config.agent.search_limit,
                config.agent.low_stock_threshold,
            ),
            messenger: adapters.messenger.clone(),
            inference: adapters.inference.clone(),
            media_timeout: Duration::from_secs(config.whatsapp.media_timeout_secs),
            transcription_timeout: Duration::from_secs(config.inference.transcription_timeout_secs),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn handle(&self, message: InboundMessage) -> Result<(), VitrinaError> {
        let phone = message.phone.clone();
        debug!(%phone, id = %message.id, "handling message");

        // Any inbound message restarts the inactivity policy.
        self.store.cache().delete(&warned_key(&phone)).await?;

        let transcription = match &message.content {
            MessageContent::Audio { media } => match self.transcribe(media).await {
                Some(text) => Some(text),
                None => {
                    self.send(
                        &phone,
                        "No pude escuchar el audio. ¿Me lo podés escribir?",
                    )
                    .await;
                    return Ok(());
                }
            },
            _ => None,
        };

        let text = transcription.as_deref().or(message.text()).unwrap_or_default();
        let pre = tone::pre_classify(text, message.is_image());
        let mut session = if pre.greeting.is_some() {
            // A greeting always starts over.
            self.store.delete(&phone).await?;
            self.store.create_new(None, &phone)
        } else {
            self.store.get_or_create(&phone).await?.0
        };
        let now = Utc::now();
        session.last_activity = now;
        tone::apply(&mut session, &pre);

        if pre.pure_greeting {
            let reply = tone::greeting_reply(session.user_tone);
            session.message_history.push(HistoryEntry::new(Role::User, text, now));
            session.message_history.push(HistoryEntry::new(Role::Assistant, reply, now));
            self.store.save(&session).await?;
            self.send(&phone, reply).await;
            return Ok(());
        }

        if let MessageContent::Image {
            images,
            resolved,
            caption,
        } = &message.content
        {
            state::transition(&mut session, SessionState::Collecting);
            let urls = if resolved.is_empty() {
                self.resolve_images(images).await
            } else {
                resolved.clone()
            };
            if session.product_data.ai_result.take().is_some() {
                debug!(%phone, "new photos invalidate the generated listing");
            }
            session.product_data.merge(ProductDraft {
                images: urls,
                price: caption.as_deref().and_then(tone::extract_price),
                additional_context: caption.clone(),
                ..Default::default()
            });
        }

        let user_text = prompt::render_user_message(&message, transcription.as_deref());
        let intent = self.intents.process(&session, &user_text).await;
        session
            .message_history
            .push(HistoryEntry::new(Role::User, user_text, now));

        let outcome = match self.executor.execute(&mut session, &intent).await {
            Ok(outcome) => {
                session.last_error = None;
                outcome
            }
            Err(e) if e.is_user_facing() => ActionOutcome {
                reply: Some(e.to_string()),
                next_state: Some(session.state),
                ..Default::default()
            },
            Err(e) => {
                warn!(action = intent.action.name(), error = %e, "action failed");
                session.last_error = Some(e.to_string());
                ActionOutcome {
                    reply: Some(
                        by_tone(
                            session.user_tone,
                            "Disculpe, no pude completar la operación. Intente de nuevo en un momento.",
                            "Perdón, no pude completar eso. Probá de nuevo en un ratito.",
                        )
                        .to_string(),
                    ),
                    next_state: Some(session.state),
                    ..Default::default()
                }
            }
        };

        let entered = state::transition(&mut session, outcome.next_state.unwrap_or(intent.next_state));
        info!(action = intent.action.name(), state = %entered, "turn complete");

        let reply = if outcome.already_sent {
            None
        } else {
            outcome.reply.or(Some(intent.message))
        };

        if outcome.close_session {
            if let Some(reply) = &reply {
                self.send(&phone, reply).await;
            }
            self.store.delete(&phone).await?;
            debug!(%phone, "conversation closed");
            return Ok(());
        }

        if let Some(reply) = &reply {
            session
                .message_history
                .push(HistoryEntry::new(Role::Assistant, reply.clone(), Utc::now()));
        }
        self.store.save(&session).await?;
        if let Some(reply) = &reply {
            self.send(&phone, reply).await;
        }
        Ok(())
    }

    async fn transcribe(&self, media: &MediaAttachment) -> Option<String> {
        let url = self.resolve_media(media).await?;
        match tokio::time::timeout(self.transcription_timeout, self.inference.transcribe(&url)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(Ok(_)) => {
                debug!("empty transcription");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "transcription failed");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.transcription_timeout, "transcription timed out");
                None
            }
        }
    }

    async fn resolve_images(&self, images: &[MediaAttachment]) -> Vec<String> {
        let mut urls = Vec::with_capacity(images.len());
        for media in images {
            if let Some(url) = self.resolve_media(media).await {
                urls.push(url);
            }
        }
        urls
    }

    /// Decrypted URL, or the raw webhook URL when decryption fails.
    async fn resolve_media(&self, media: &MediaAttachment) -> Option<String> {
        match tokio::time::timeout(self.media_timeout, self.messenger.decrypt_media(media)).await {
            Ok(Ok(url)) => return Some(url),
            Ok(Err(e)) => warn!(error = %e, "media decryption failed"),
            Err(_) => warn!(timeout = ?self.media_timeout, "media decryption timed out"),
        }
        media.url.clone()
    }

    async fn send(&self, phone: &str, body: &str) {
        if let Err(e) = self.messenger.send_text(phone, body).await {
            warn!(error = %e, "failed to send reply");
        }
    }
}
