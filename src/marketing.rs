//! # Marketing Scheduler
//!
//! Daily broadcast of bilingual marketing messages to every Telegram user.
//!
//! Delivery is at-least-once: `last_sent_at` is written after a fan-out
//! finishes and nothing prevents a scheduled scan and an operator-triggered
//! [`MarketingScheduler::send_now`] from broadcasting the same message at
//! the same time. Users may then receive it twice.

use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channel::OutboundChannel;
use crate::config::SchedulerConfig;
use crate::error::{BotError, Result};
use crate::models::{MarketingMessage, Platform, User};
use crate::storage::Storage;

/// Active, and never sent or last sent at least `interval_days` ago
pub fn is_eligible(message: &MarketingMessage, now: DateTime<Utc>) -> bool {
    if !message.is_active {
        return false;
    }
    match message.last_sent_at {
        None => true,
        Some(last_sent) => now - last_sent >= ChronoDuration::days(i64::from(message.interval_days)),
    }
}

/// Next occurrence of `hour:minute` strictly after `now`, in `now`'s timezone
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    let today = now.date_naive().and_hms_opt(hour, minute, 0);
    let candidate = today.and_then(|at| at.and_local_timezone(now.timezone()).earliest());
    match candidate {
        Some(at) if at > *now => at,
        Some(at) => {
            let tomorrow = at.naive_local() + ChronoDuration::days(1);
            tomorrow
                .and_local_timezone(now.timezone())
                .earliest()
                .unwrap_or_else(|| now.clone() + ChronoDuration::days(1))
        }
        // Skipped by a DST transition
        None => now.clone() + ChronoDuration::days(1),
    }
}

/// Outcome of one scheduled scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub messages_sent: usize,
    pub deliveries: usize,
}

pub struct MarketingScheduler {
    storage: Arc<dyn Storage>,
    channel: Arc<dyn OutboundChannel>,
    config: SchedulerConfig,
}

impl MarketingScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        channel: Arc<dyn OutboundChannel>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            channel,
            config,
        }
    }

    /// Run the daily scan loop on a background task
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        info!(
            hour = self.config.send_hour,
            minute = self.config.send_minute,
            "Marketing scheduler started"
        );
        loop {
            let now = Local::now();
            let next = next_run_after(&now, self.config.send_hour, self.config.send_minute);
            let wait = (next.clone() - now).to_std().unwrap_or(Duration::ZERO);
            debug!(next_run = %next, "Marketing scheduler sleeping");
            tokio::time::sleep(wait).await;

            match self.run_scheduled_scan(Utc::now()).await {
                Ok(report) => info!(
                    messages_sent = report.messages_sent,
                    deliveries = report.deliveries,
                    "Marketing scan finished"
                ),
                Err(e) => error!(error = %e, "Marketing scan failed"),
            }
        }
    }

    /// Broadcast every eligible message; each message is judged on its own
    pub async fn run_scheduled_scan(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let messages = self.storage.get_active_marketing_messages().await?;
        let mut report = ScanReport::default();

        for message in messages.iter().filter(|m| is_eligible(m, now)) {
            match self.broadcast(message).await {
                Ok(delivered) => {
                    report.messages_sent += 1;
                    report.deliveries += delivered;
                }
                Err(e) => error!(message_id = message.id, error = %e, "Marketing broadcast failed"),
            }
        }

        Ok(report)
    }

    /// Operator-triggered broadcast ignoring eligibility; returns the
    /// number of users reached
    pub async fn send_now(&self, message_id: i64) -> Result<usize> {
        let message = self
            .storage
            .get_marketing_message(message_id)
            .await?
            .ok_or_else(|| BotError::not_found("MarketingMessage", message_id))?;
        info!(message_id, "Immediate marketing broadcast requested");
        self.broadcast(&message).await
    }

    async fn broadcast(&self, message: &MarketingMessage) -> Result<usize> {
        let recipients: Vec<User> = self
            .storage
            .get_all_users()
            .await?
            .into_iter()
            .filter(|user| user.platform_type == Platform::Telegram)
            .collect();

        info!(message_id = message.id, recipients = recipients.len(), "Broadcasting marketing message");

        let delay = Duration::from_millis(self.config.send_delay_ms);
        let mut delivered = 0;

        for (index, user) in recipients.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.deliver(message, user).await {
                delivered += 1;
            }
        }

        // Written even after partial failure: failed users wait for the next window
        if let Err(e) = self
            .storage
            .update_marketing_last_sent(message.id, Utc::now())
            .await
        {
            error!(message_id = message.id, error = %e, "Failed to record marketing send time");
        }

        info!(message_id = message.id, delivered, "Marketing broadcast finished");
        Ok(delivered)
    }

    /// One user; failures are logged, never retried in the same run
    async fn deliver(&self, message: &MarketingMessage, user: &User) -> bool {
        let Ok(chat_id) = user.platform_id.parse::<i64>() else {
            warn!(user_id = user.id, platform_id = %user.platform_id, "Skipping user with non-numeric chat id");
            return false;
        };

        let language = user.language.unwrap_or_default();
        let text = format!("{}\n\n{}", message.title(language), message.content(language));

        if let Some(image_url) = &message.image_url {
            match self.channel.send_photo(chat_id, image_url, Some(&text), None).await {
                Ok(()) => return true,
                Err(e) => warn!(
                    user_id = user.id,
                    message_id = message.id,
                    error = %e,
                    "Marketing photo failed, falling back to text"
                ),
            }
        }

        match self.channel.send_message(chat_id, &text, None).await {
            Ok(()) => true,
            Err(e) => {
                error!(user_id = user.id, message_id = message.id, error = %e, "Marketing send failed");
                false
            }
        }
    }
}
