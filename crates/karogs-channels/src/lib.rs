//! # Karogs Channels
//!
//! The Telegram side of the bot.
//!
//! ```text
//! getUpdates (long poll) ──► TelegramPollingStream ──► TelegramBot
//!                                                        └── CommandProcessor
//!                                                              ├── FlagDayRegistry
//!                                                              └── SubscriberDirectory
//! ReminderDispatcher ──► MessageTransport (TelegramChannel::send_text)
//! ```

pub mod commands;
pub mod telegram;

pub use commands::{BotCommand, BotReply, CommandProcessor, InlineKeyboard};
pub use telegram::{BotEvent, TelegramBot, TelegramChannel};
