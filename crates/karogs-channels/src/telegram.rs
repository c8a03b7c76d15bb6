//! Telegram Bot channel: long polling + message sending via Bot API.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use karogs_core::config::TelegramConfig;
use karogs_core::{ChatId, DeliveryError, KarogsError, MessageTransport, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::commands::{BOT_COMMANDS, BotCommand, BotReply, CommandProcessor};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram Bot API client.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    last_update_id: AtomicI64,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            last_update_id: AtomicI64::new(0),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    /// POST a Bot API method and unwrap the `{ok, result}` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<T, DeliveryError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transient(format!("{method} failed: {e}")))?;

        let status = response.status().as_u16();
        let body: TelegramApiResponse<T> = response.json().await.map_err(|e| {
            DeliveryError::Transient(format!("Invalid {method} response (HTTP {status}): {e}"))
        })?;
        body.into_result(status)
    }

    /// Get updates using long polling.
    pub async fn get_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst) + 1;
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", "30".into()),
                ("allowed_updates", "[\"message\",\"callback_query\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| KarogsError::channel(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| KarogsError::channel(format!("Invalid Telegram response: {e}")))?;

        if !body.ok {
            return Err(KarogsError::channel(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }

        let updates = body.result.unwrap_or_default();
        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }
        Ok(updates)
    }

    /// Send a command reply as a new message.
    pub async fn send_reply(&self, chat_id: ChatId, reply: &BotReply) -> std::result::Result<(), DeliveryError> {
        let _: serde_json::Value = self.call("sendMessage", &reply_payload(chat_id, None, reply)).await?;
        Ok(())
    }

    /// Replace the text and keyboard of a message the bot sent earlier.
    pub async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: i64,
        reply: &BotReply,
    ) -> std::result::Result<(), DeliveryError> {
        let _: serde_json::Value = self
            .call("editMessageText", &reply_payload(chat_id, Some(message_id), reply))
            .await?;
        Ok(())
    }

    /// Stop the button's loading spinner, optionally with a toast.
    pub async fn answer_callback_query(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> std::result::Result<(), DeliveryError> {
        let mut body = serde_json::json!({ "callback_query_id": query_id });
        if let Some(text) = text {
            body["text"] = text.into();
        }
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Register the command list shown in Telegram's menu.
    pub async fn set_my_commands(&self) -> Result<()> {
        let commands: Vec<_> = BOT_COMMANDS
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();
        let _: bool = self
            .call("setMyCommands", &serde_json::json!({ "commands": commands }))
            .await
            .map_err(|e| KarogsError::channel(format!("setMyCommands failed: {e}")))?;
        Ok(())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        self.call("getMe", &serde_json::json!({}))
            .await
            .map_err(|e| KarogsError::channel(format!("getMe failed: {e}")))
    }

    /// Start polling loop. Returns a stream of bot events. The stream ends
    /// once `stop` is notified.
    pub fn start_polling(self: Arc<Self>, stop: Arc<Notify>) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            tracing::info!("📡 Telegram polling loop started");

            loop {
                let updates = tokio::select! {
                    updates = self.get_updates() => updates,
                    _ = stop.notified() => break,
                };

                let pause = match updates {
                    Ok(updates) => {
                        for event in updates.iter().filter_map(TelegramUpdate::to_event) {
                            if tx.send(event).is_err() {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                        Duration::from_secs(self.config.poll_interval)
                    }
                    Err(e) => {
                        tracing::error!("❌ Telegram polling error: {e}");
                        ERROR_BACKOFF
                    }
                };

                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = stop.notified() => break,
                }
            }

            tracing::info!("📡 Telegram polling loop stopped");
        });

        TelegramPollingStream { rx }
    }
}

#[async_trait]
impl MessageTransport for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> std::result::Result<(), DeliveryError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "link_preview_options": { "is_disabled": true },
        });
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }
}

/// Request body for `sendMessage`, or `editMessageText` when `message_id` is set.
fn reply_payload(chat_id: ChatId, message_id: Option<i64>, reply: &BotReply) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": reply.text,
    });
    if let Some(message_id) = message_id {
        body["message_id"] = message_id.into();
    }
    if reply.markdown {
        body["parse_mode"] = "Markdown".into();
    }
    if reply.disable_preview {
        body["link_preview_options"] = serde_json::json!({ "is_disabled": true });
    }
    if let Some(keyboard) = &reply.keyboard {
        body["reply_markup"] = serde_json::json!(keyboard);
    }
    body
}

/// Stream of bot events from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<BotEvent>,
}

impl Stream for TelegramPollingStream {
    type Item = BotEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Something a user did that the bot should answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    Command {
        chat_id: ChatId,
        from_id: i64,
        command: BotCommand,
    },
    Callback {
        query_id: String,
        chat_id: ChatId,
        message_id: i64,
        from_id: i64,
        command: BotCommand,
    },
    /// A button press with nothing to act on: the message is gone or the
    /// data is unknown. It still needs an answer to clear the spinner.
    StaleCallback { query_id: String },
}

/// Connects the polling stream to the command processor.
pub struct TelegramBot {
    channel: Arc<TelegramChannel>,
    processor: Arc<CommandProcessor>,
}

impl TelegramBot {
    pub fn new(channel: Arc<TelegramChannel>, processor: Arc<CommandProcessor>) -> Self {
        Self { channel, processor }
    }

    /// Answer updates until `stop` is notified.
    pub async fn run(self, stop: Arc<Notify>) -> Result<()> {
        let me = self.channel.get_me().await?;
        tracing::info!(
            "🤖 Telegram bot: @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.first_name
        );

        if let Err(e) = self.channel.set_my_commands().await {
            tracing::warn!("⚠️ Failed to set bot commands: {e}");
        }

        let mut events = Arc::clone(&self.channel).start_polling(stop);
        while let Some(event) = events.next().await {
            self.handle_event(event).await;
        }
        Ok(())
    }

    async fn handle_event(&self, event: BotEvent) {
        match event {
            BotEvent::Command {
                chat_id,
                from_id,
                command,
            } => {
                let Some(reply) = self.processor.handle(command, chat_id, Some(from_id)).await else {
                    return;
                };
                if let Err(e) = self.channel.send_reply(chat_id, &reply).await {
                    tracing::warn!("⚠️ Failed to reply to {chat_id}: {e}");
                }
            }
            BotEvent::Callback {
                query_id,
                chat_id,
                message_id,
                from_id,
                command,
            } => {
                let reply = self.processor.handle(command, chat_id, Some(from_id)).await;
                let toast = match &reply {
                    Some(reply) if reply.error => Some(reply.text.as_str()),
                    Some(reply) => {
                        if let Err(e) = self.channel.edit_message_text(chat_id, message_id, reply).await {
                            tracing::warn!("⚠️ Failed to edit message in {chat_id}: {e}");
                        }
                        reply.callback_text.as_deref()
                    }
                    None => None,
                };
                if let Err(e) = self.channel.answer_callback_query(&query_id, toast).await {
                    tracing::warn!("⚠️ Failed to answer callback in {chat_id}: {e}");
                }
            }
            BotEvent::StaleCallback { query_id } => {
                tracing::debug!("Answering callback {query_id} without a message");
                if let Err(e) = self.channel.answer_callback_query(&query_id, None).await {
                    tracing::warn!("⚠️ Failed to answer callback {query_id}: {e}");
                }
            }
        }
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> TelegramApiResponse<T> {
    /// A 403 (blocked, kicked, deactivated) is permanent. Everything else may
    /// succeed on a later attempt.
    pub fn into_result(self, http_status: u16) -> std::result::Result<T, DeliveryError> {
        if self.ok {
            return self
                .result
                .ok_or_else(|| DeliveryError::Transient("Telegram response without result".into()));
        }

        let description = self.description.unwrap_or_default();
        if self.error_code == Some(403) || http_status == 403 {
            return Err(DeliveryError::Forbidden { description });
        }
        Err(DeliveryError::Transient(format!(
            "Telegram API error {}: {description}",
            self.error_code.unwrap_or(i64::from(http_status))
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    pub message: Option<TelegramMessage>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
}

impl TelegramUpdate {
    /// Commands and button presses. Plain text and other bots are ignored.
    pub fn to_event(&self) -> Option<BotEvent> {
        if let Some(query) = &self.callback_query {
            let command = query.data.as_deref().and_then(BotCommand::from_callback);
            return Some(match (query.message.as_ref(), command) {
                (Some(msg), Some(command)) => BotEvent::Callback {
                    query_id: query.id.clone(),
                    chat_id: msg.chat.id,
                    message_id: msg.message_id,
                    from_id: query.from.id,
                    command,
                },
                _ => BotEvent::StaleCallback {
                    query_id: query.id.clone(),
                },
            });
        }

        let msg = self.message.as_ref()?;
        let from = msg.from.as_ref()?;
        if from.is_bot {
            return None;
        }

        Some(BotEvent::Command {
            chat_id: msg.chat.id,
            from_id: from.id,
            command: BotCommand::parse(msg.text.as_deref()?)?,
        })
    }
}
