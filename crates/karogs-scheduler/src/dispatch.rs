//! Reminder dispatch: sends the flag-day reminder to subscribers.
//!
//! Recipients are processed in fixed-size batches. Every send in a batch runs
//! concurrently and the whole batch settles before the next one starts, with a
//! short pause in between to stay under the transport's rate limits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use karogs_calendar::FlagDayRegistry;
use karogs_core::{ChatId, FlagDay, MessageTransport, SubscriberDirectory};

use crate::message;

/// Recipients per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Pause between batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderOutcome {
    pub chat_id: ChatId,
    pub success: bool,
    pub permanent_failure: bool,
}

/// Totals for one dispatch run. `success + failed` always equals the number
/// of recipients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub success: usize,
    pub failed: usize,
    /// Subscribers dropped because delivery was forbidden.
    pub removed: usize,
    pub batches: usize,
    pub elapsed: Duration,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

/// Fans a reminder out to subscribers and unsubscribes unreachable chats.
pub struct ReminderDispatcher {
    transport: Arc<dyn MessageTransport>,
    directory: Arc<dyn SubscriberDirectory>,
    registry: Arc<FlagDayRegistry>,
    batch_size: usize,
    batch_delay: Duration,
}

impl ReminderDispatcher {
    pub fn new(
        transport: Arc<dyn MessageTransport>,
        directory: Arc<dyn SubscriberDirectory>,
        registry: Arc<FlagDayRegistry>,
    ) -> Self {
        Self {
            transport,
            directory,
            registry,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    /// Override batching. A batch size of 0 is treated as 1.
    pub fn with_batching(mut self, batch_size: usize, batch_delay: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_delay = batch_delay;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Reminder text for `flag_day`, dated today and pointing at the next
    /// flag day.
    pub fn build_reminder(&self, flag_day: &FlagDay) -> String {
        let next = self.registry.next_flag_day();
        message::reminder(flag_day, self.registry.today(), next.as_ref())
    }

    /// Send today's reminder to every subscriber.
    pub async fn dispatch(&self, flag_day: &FlagDay, subscribers: &[ChatId]) -> DispatchSummary {
        let started = Instant::now();
        let text = self.build_reminder(flag_day);
        let mut summary = DispatchSummary::default();

        tracing::info!(
            "📣 Sending reminders to {} subscribers for: {}",
            subscribers.len(),
            flag_day.description
        );

        let batch_count = subscribers.len().div_ceil(self.batch_size);
        for (index, batch) in subscribers.chunks(self.batch_size).enumerate() {
            let outcomes = join_all(batch.iter().map(|&chat_id| self.deliver(chat_id, &text))).await;
            summary.batches += 1;

            for outcome in outcomes {
                if outcome.success {
                    summary.success += 1;
                } else {
                    summary.failed += 1;
                    if outcome.permanent_failure {
                        summary.removed += 1;
                    }
                }
            }

            tracing::debug!(
                "📦 Batch {}/{} settled ({} recipients)",
                index + 1,
                batch_count,
                batch.len()
            );

            if index + 1 < batch_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            "✅ Reminder sending completed in {}ms. Success: {}, Errors: {}, Removed: {}",
            summary.elapsed.as_millis(),
            summary.success,
            summary.failed,
            summary.removed
        );
        summary
    }

    async fn deliver(&self, chat_id: ChatId, text: &str) -> ReminderOutcome {
        match self.transport.send_text(chat_id, text).await {
            Ok(()) => ReminderOutcome {
                chat_id,
                success: true,
                permanent_failure: false,
            },
            Err(e) if e.is_permanent() => {
                tracing::warn!("🚫 Bot blocked by {chat_id}, removing subscriber: {e}");
                if let Err(remove_err) = self.directory.remove(chat_id).await {
                    tracing::warn!("⚠️ Failed to remove subscriber {chat_id}: {remove_err}");
                }
                ReminderOutcome {
                    chat_id,
                    success: false,
                    permanent_failure: true,
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to send reminder to {chat_id}: {e}");
                ReminderOutcome {
                    chat_id,
                    success: false,
                    permanent_failure: false,
                }
            }
        }
    }
}
