//! # Karogs Scheduler
//!
//! Once a day, at a configured local hour, check whether today is a flag day
//! and remind every subscriber.
//!
//! ## Architecture
//! ```text
//! NotificationScheduler (tokio task, sleeps until HH:00 local)
//!   └── run_tick
//!         ├── FlagDayRegistry::flag_day_today()   → none? done
//!         ├── SubscriberDirectory::all()
//!         └── ReminderDispatcher::dispatch
//!               ├── batch 1: join_all(send × ≤50) → pause 100ms
//!               ├── batch 2: ...
//!               └── 403 Forbidden → SubscriberDirectory::remove
//! ```

pub mod daily;
pub mod dispatch;
pub mod engine;
pub mod message;
pub mod store;

pub use dispatch::{DispatchSummary, ReminderDispatcher, ReminderOutcome};
pub use engine::{NotificationScheduler, TickOutcome};
pub use store::{DEFAULT_WATCH_INTERVAL, FileSubscriberStore, InMemoryDirectory};
