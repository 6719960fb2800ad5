// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inactivity sweep: warn once, then close.
//!
//! The warning marker is a cache key holding the warning time. Any inbound
//! message deletes it (see the pipeline), which restarts the policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vitrina_config::model::TimeoutConfig;
use vitrina_core::{ConversationSession, MessagingAdapter, SessionState, VitrinaError};

use crate::session::{SESSION_PREFIX, SessionStore, warned_key};
use crate::tone::by_tone;

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub warned: usize,
    pub closed: usize,
}

/// Periodic warn-then-close sweep over stored sessions.
pub struct TimeoutWorker {
    store: Arc<SessionStore>,
    messenger: Arc<dyn MessagingAdapter>,
    warn_after: Duration,
    close_after: Duration,
    poll_interval: Duration,
}

impl TimeoutWorker {
    pub fn new(store: Arc<SessionStore>, messenger: Arc<dyn MessagingAdapter>, config: &TimeoutConfig) -> Self {
        Self {
            store,
            messenger,
            warn_after: Duration::from_secs(config.warn_after_secs),
            close_after: Duration::from_secs(config.close_after_secs),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
        }
    }

    /// The marker outlives the close threshold by two polls so a late sweep still sees it.
    fn marker_ttl(&self) -> Duration {
        self.close_after + self.poll_interval * 2
    }

    /// Sweeps until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval = ?self.poll_interval, "timeout worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.sweep_at(Utc::now()).await {
                        Ok(report) if report != SweepReport::default() => {
                            info!(warned = report.warned, closed = report.closed, "timeout sweep");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "timeout sweep failed"),
                    }
                }
            }
        }
        debug!("timeout worker stopped");
    }

    /// One pass over every stored session as of `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, VitrinaError> {
        let mut report = SweepReport::default();
        let keys = self.store.cache().keys(SESSION_PREFIX).await?;
        for key in keys {
            let phone = &key[SESSION_PREFIX.len()..];
            let session = match self.store.get(phone).await {
                Ok(Some(session)) => session,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable session");
                    continue;
                }
            };
            if let Err(e) = self.check(&session, now, &mut report).await {
                warn!(error = %e, "timeout check failed");
            }
        }
        Ok(report)
    }

    async fn check(
        &self,
        session: &ConversationSession,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), VitrinaError> {
        if session.state == SessionState::Idle && session.product_data.is_empty() {
            return Ok(());
        }
        let cache = self.store.cache();
        let marker = warned_key(&session.phone);

        let warned_at = cache
            .get(&marker)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|t| t.with_timezone(&Utc));

        match warned_at {
            // Activity after the warning invalidates it.
            Some(warned_at) if session.last_activity > warned_at => {
                cache.delete(&marker).await?;
            }
            Some(warned_at) => {
                if elapsed(warned_at, now) >= self.close_after {
                    self.messenger
                        .send_text(&session.phone, closing_message(session))
                        .await?;
                    self.store.delete(&session.phone).await?;
                    debug!(phone = %session.phone, "session closed for inactivity");
                    report.closed += 1;
                }
            }
            None => {
                if elapsed(session.last_activity, now) >= self.warn_after {
                    self.messenger
                        .send_text(&session.phone, warning_message(session))
                        .await?;
                    cache
                        .set(&marker, &now.to_rfc3339(), self.marker_ttl())
                        .await?;
                    debug!(phone = %session.phone, "inactivity warning sent");
                    report.warned += 1;
                }
            }
        }
        Ok(())
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or_default()
}

fn warning_message(session: &ConversationSession) -> &'static str {
    by_tone(
        session.user_tone,
        "¿Sigue ahí? Si no recibo respuesta en unos minutos, voy a cerrar esta conversación.",
        "¿Seguís ahí? Si no me respondés en unos minutos, cierro la conversación.",
    )
}

fn closing_message(session: &ConversationSession) -> &'static str {
    by_tone(
        session.user_tone,
        "Cerré la conversación por inactividad. Escríbame cuando quiera retomar.",
        "Cerré la conversación por inactividad. Escribime cuando quieras retomar.",
    )
}
