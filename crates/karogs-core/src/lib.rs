//! # Karogs Core
//!
//! Shared vocabulary for the flag-day bot: the flag-day record, the
//! subscriber and transport seams, configuration, and the error type.

pub mod config;
pub mod error;
pub mod process;
pub mod traits;
pub mod types;

pub use config::KarogsConfig;
pub use error::{DeliveryError, KarogsError, Result};
pub use traits::{MessageTransport, SubscriberDirectory};
pub use types::{ChatId, FlagDay, FlagDayType};
