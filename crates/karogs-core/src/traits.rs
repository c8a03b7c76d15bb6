//! Seams between the reminder engine and the outside world.

use async_trait::async_trait;

use crate::error::{DeliveryError, Result};
use crate::types::ChatId;

/// Persistent set of subscribed chats.
///
/// Implementations must keep one consistent in-memory view shared by the
/// command handlers and the dispatcher, and persist every mutation.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Returns true if the chat was newly added.
    async fn add(&self, chat_id: ChatId) -> Result<bool>;

    /// Returns true if the chat was present. Removing an absent chat is a no-op.
    async fn remove(&self, chat_id: ChatId) -> Result<bool>;

    /// All subscribed chats.
    async fn all(&self) -> Result<Vec<ChatId>>;

    async fn is_member(&self, chat_id: ChatId) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}

/// Something that can deliver a text message to a chat.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Send Markdown text to a chat.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> std::result::Result<(), DeliveryError>;
}
