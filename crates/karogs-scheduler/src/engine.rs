//! Notification scheduler: the daily loop that checks for a flag day and
//! triggers the reminder dispatch.
//! Uses tokio timers only. The task sleeps until the next trigger.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use karogs_calendar::FlagDayRegistry;
use karogs_core::SubscriberDirectory;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::daily;
use crate::dispatch::{DispatchSummary, ReminderDispatcher};

/// Longest single sleep before the remaining time is recomputed.
const MAX_SLEEP: Duration = Duration::from_secs(3600);

/// What one daily check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoFlagDay,
    NoSubscribers,
    Dispatched(DispatchSummary),
    Failed(String),
}

struct RunningTrigger {
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Fires once per calendar day at `hour:00` in the registry's timezone.
pub struct NotificationScheduler {
    registry: Arc<FlagDayRegistry>,
    directory: Arc<dyn SubscriberDirectory>,
    dispatcher: Arc<ReminderDispatcher>,
    hour: u8,
    running: Mutex<Option<RunningTrigger>>,
}

impl NotificationScheduler {
    pub fn new(
        registry: Arc<FlagDayRegistry>,
        directory: Arc<dyn SubscriberDirectory>,
        dispatcher: Arc<ReminderDispatcher>,
        hour: u8,
    ) -> Self {
        Self {
            registry,
            directory,
            dispatcher,
            hour,
            running: Mutex::new(None),
        }
    }

    /// Install the daily trigger. Returns false (and does nothing) if it is
    /// already installed.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.lock_running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            tracing::warn!("⚠️ Notification scheduler already started");
            return false;
        }

        let stop = Arc::new(Notify::new());
        let handle = tokio::spawn(Arc::clone(self).run_loop(Arc::clone(&stop)));
        *running = Some(RunningTrigger { stop, handle });

        tracing::info!(
            "⏰ Notification scheduler started ({:02}:00 {})",
            self.hour,
            self.registry.timezone()
        );
        true
    }

    /// Cancel future ticks. A tick that is already running finishes.
    /// Returns false if the scheduler was not started.
    pub fn stop(&self) -> bool {
        match self.lock_running().take() {
            Some(trigger) => {
                trigger.stop.notify_one();
                tracing::info!("⏹️ Notification scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_running()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// One daily check: is today a flag day, and if so remind everyone.
    pub async fn run_tick(&self) -> TickOutcome {
        tracing::info!(
            "🔔 Running flag day check at {}",
            self.registry.now_local().to_rfc3339()
        );

        let Some(flag_day) = self.registry.flag_day_today() else {
            tracing::info!("No flag day today");
            return TickOutcome::NoFlagDay;
        };

        let subscribers = match self.directory.all().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::error!("❌ Could not load subscribers: {e}");
                return TickOutcome::Failed(e.to_string());
            }
        };

        if subscribers.is_empty() {
            tracing::info!("No subscribers to notify for: {}", flag_day.description);
            return TickOutcome::NoSubscribers;
        }

        let summary = self.dispatcher.dispatch(&flag_day, &subscribers).await;
        TickOutcome::Dispatched(summary)
    }

    async fn run_loop(self: Arc<Self>, stop: Arc<Notify>) {
        let tz = self.registry.timezone();
        let mut last_fired: Option<DateTime<Utc>> = None;

        loop {
            let Some(next) = self.next_trigger(last_fired) else {
                tracing::error!("❌ Invalid notification hour {}, scheduler exiting", self.hour);
                return;
            };
            tracing::info!("⏰ Next flag day check at {}", next.with_timezone(&tz).to_rfc3339());

            loop {
                let remaining = (next - self.now_utc()).to_std().unwrap_or(Duration::ZERO);
                let capped = remaining > MAX_SLEEP;
                tokio::select! {
                    _ = tokio::time::sleep(remaining.min(MAX_SLEEP)) => {}
                    _ = stop.notified() => {
                        tracing::debug!("Scheduler loop received stop");
                        return;
                    }
                }
                if !capped {
                    break;
                }
            }
            last_fired = Some(next);

            match AssertUnwindSafe(self.run_tick()).catch_unwind().await {
                Ok(TickOutcome::Failed(reason)) => {
                    tracing::error!("❌ Flag day check failed: {reason}");
                }
                Ok(outcome) => tracing::debug!("Flag day check finished: {outcome:?}"),
                Err(_) => tracing::error!("❌ Flag day check panicked; will retry tomorrow"),
            }
        }
    }

    /// The trigger after `last_fired`. Triggers that passed while a tick was
    /// still running are skipped, never queued.
    fn next_trigger(&self, last_fired: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let now = self.now_utc();
        let after = last_fired.map_or(now, |fired| fired.max(now));
        daily::next_daily_run(self.hour, self.registry.timezone(), after)
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.registry.now_local().with_timezone(&Utc)
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<RunningTrigger>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}
