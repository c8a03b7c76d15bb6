//! Bot commands: turns a `/command` or an inline-button press into a reply.
//!
//! Transport-agnostic. The Telegram runner decides whether a reply becomes a
//! new message or an edit of the message that carried the button.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Datelike;
use karogs_calendar::FlagDayRegistry;
use karogs_core::{ChatId, SubscriberDirectory};
use karogs_scheduler::message;
use serde::Serialize;

const WELCOME: &str = "Sveiki! Es esmu Latvijas karoga izkāršanas dienu atgādinātājs.\n\n\
Saskaņā ar Satversmes tiesas lēmumu, kas stājās spēkā 2015. gadā, pilsoņiem ir sagaidāms izkārt karogu \
svētku dienās, taču par tā neizkāršanu sods netiek piemērots. Plašāku informāciju vari atrast šeit: \
[https://lvportals.lv/skaidrojumi/277720-privatpersonas-nevar-sodit-par-valsts-karoga-neizkarsanu-2016]\
(https://lvportals.lv/skaidrojumi/277720-privatpersonas-nevar-sodit-par-valsts-karoga-neizkarsanu-2016).";

/// Commands advertised through `setMyCommands`.
pub const BOT_COMMANDS: [(&str, &str); 6] = [
    ("start", "Sākt darbu ar botu"),
    ("menu", "Parādīt galveno izvēlni"),
    ("list", "Parādīt karoga dienas"),
    ("next", "Parādīt nākamo karoga dienu"),
    ("subscribe", "Abonēt atgādinājumus"),
    ("unsubscribe", "Atcelt abonementu"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Menu,
    List,
    Next,
    Subscribe,
    Unsubscribe,
    Health,
    Unknown,
}

impl BotCommand {
    /// Parse message text. Plain text (no leading `/`) is not a command.
    /// Handles `/list@SomeBot` and trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next().unwrap_or_default();
        let name = word.split('@').next().unwrap_or_default();
        Some(match name {
            "start" => Self::Start,
            "menu" => Self::Menu,
            "list" => Self::List,
            "next" => Self::Next,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "health" => Self::Health,
            _ => Self::Unknown,
        })
    }

    /// Inline-button callback data.
    pub fn from_callback(data: &str) -> Option<Self> {
        match data {
            "main_menu" => Some(Self::Menu),
            "list_flag_days" => Some(Self::List),
            "next" => Some(Self::Next),
            "subscribe" => Some(Self::Subscribe),
            "unsubscribe" => Some(Self::Unsubscribe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    fn new(text: &str, callback_data: &str) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Telegram `InlineKeyboardMarkup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Subscription toggle first, then the list and next buttons.
    pub fn main_menu(subscribed: bool) -> Self {
        let toggle = if subscribed {
            InlineButton::new("🔕 Atcelt abonementu", "unsubscribe")
        } else {
            InlineButton::new("🔔 Abonēt atgādinājumus", "subscribe")
        };
        Self {
            inline_keyboard: vec![
                vec![toggle],
                vec![InlineButton::new("📅 Karoga dienas", "list_flag_days")],
                vec![InlineButton::new("➡️ Nākamā karoga diena", "next")],
            ],
        }
    }

    pub fn back_to_menu() -> Self {
        Self {
            inline_keyboard: vec![vec![InlineButton::new("⬅️ Atpakaļ uz izvēlni", "main_menu")]],
        }
    }
}

/// What to send back for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub text: String,
    pub markdown: bool,
    pub keyboard: Option<InlineKeyboard>,
    /// Toast shown when answering a button press.
    pub callback_text: Option<String>,
    pub disable_preview: bool,
    /// The command failed. Button presses only get the text as a toast.
    pub error: bool,
}

impl BotReply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
            keyboard: None,
            callback_text: None,
            disable_preview: false,
            error: false,
        }
    }

    fn markdown(text: impl Into<String>) -> Self {
        Self {
            markdown: true,
            ..Self::plain(text)
        }
    }

    fn failure(text: &str) -> Self {
        Self {
            error: true,
            ..Self::plain(text)
        }
    }

    fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    fn with_callback_text(mut self, text: &str) -> Self {
        self.callback_text = Some(text.into());
        self
    }

    fn without_preview(mut self) -> Self {
        self.disable_preview = true;
        self
    }
}

/// Answers bot commands against the registry and the subscriber directory.
pub struct CommandProcessor {
    registry: Arc<FlagDayRegistry>,
    directory: Arc<dyn SubscriberDirectory>,
    admin_id: Option<i64>,
    started: Instant,
}

impl CommandProcessor {
    pub fn new(
        registry: Arc<FlagDayRegistry>,
        directory: Arc<dyn SubscriberDirectory>,
        admin_id: Option<i64>,
    ) -> Self {
        Self {
            registry,
            directory,
            admin_id,
            started: Instant::now(),
        }
    }

    /// Reply to `command` sent in `chat_id` by user `from_id`.
    /// `None` means stay silent.
    pub async fn handle(&self, command: BotCommand, chat_id: ChatId, from_id: Option<i64>) -> Option<BotReply> {
        tracing::debug!("Command {command:?} from chat {chat_id}");
        let reply = match command {
            BotCommand::Start => self.start(chat_id).await,
            BotCommand::Menu => self.menu(chat_id).await,
            BotCommand::List => self.list(),
            BotCommand::Next => self.next(),
            BotCommand::Subscribe => self.subscribe(chat_id).await,
            BotCommand::Unsubscribe => self.unsubscribe(chat_id).await,
            BotCommand::Health => return self.health(from_id).await,
            BotCommand::Unknown => self.unknown(chat_id).await,
        };
        Some(reply)
    }

    async fn is_subscribed(&self, chat_id: ChatId) -> bool {
        self.directory.is_member(chat_id).await.unwrap_or_else(|e| {
            tracing::warn!("⚠️ Membership check failed for {chat_id}: {e}");
            false
        })
    }

    async fn start(&self, chat_id: ChatId) -> BotReply {
        BotReply::markdown(WELCOME)
            .without_preview()
            .with_keyboard(InlineKeyboard::main_menu(self.is_subscribed(chat_id).await))
    }

    async fn menu(&self, chat_id: ChatId) -> BotReply {
        match self.directory.is_member(chat_id).await {
            Ok(subscribed) => {
                BotReply::plain("Izvēlieties darbību:").with_keyboard(InlineKeyboard::main_menu(subscribed))
            }
            Err(e) => {
                tracing::error!("❌ Menu failed for {chat_id}: {e}");
                BotReply::failure("Kļūda ielādējot izvēlni.")
            }
        }
    }

    fn list(&self) -> BotReply {
        let year = self.registry.today().year();
        let days = self.registry.all_flag_days_for_year(year);
        BotReply::markdown(message::flag_days_list(&days, year))
            .without_preview()
            .with_keyboard(InlineKeyboard::back_to_menu())
    }

    fn next(&self) -> BotReply {
        let reply = match self.registry.next_flag_day() {
            Some(next) => BotReply::markdown(message::next_flag_day(&next)),
            None => BotReply::plain("Neizdevās atrast nākamo karoga dienu."),
        };
        reply.with_keyboard(InlineKeyboard::back_to_menu())
    }

    async fn subscribe(&self, chat_id: ChatId) -> BotReply {
        let added = match self.directory.add(chat_id).await {
            Ok(added) => added,
            Err(e) => {
                tracing::error!("❌ Subscribe failed for {chat_id}: {e}");
                return BotReply::failure("Kļūda abonējot atgādinājumus.");
            }
        };

        let text = if added {
            let count = self.directory.count().await.unwrap_or_default();
            format!(
                "✅ Abonements aktivizēts! Jūs tagad saņemsiet atgādinājumus par karoga dienām.\nKopā abonentu: {count}"
            )
        } else {
            "✅ Jūs jau esat abonējis atgādinājumus.".to_string()
        };

        BotReply::plain(text)
            .with_keyboard(InlineKeyboard::back_to_menu())
            .with_callback_text("Abonements aktivizēts!")
    }

    async fn unsubscribe(&self, chat_id: ChatId) -> BotReply {
        let reply = match self.directory.remove(chat_id).await {
            Ok(true) => BotReply::plain("🔕 Abonements atcelts.").with_callback_text("Abonements atcelts!"),
            Ok(false) => BotReply::plain("❌ Jūs neesat abonējis atgādinājumus.")
                .with_callback_text("Jūs neesat abonējis"),
            Err(e) => {
                tracing::error!("❌ Unsubscribe failed for {chat_id}: {e}");
                return BotReply::failure("Kļūda atceļot abonementu.");
            }
        };
        reply.with_keyboard(InlineKeyboard::back_to_menu())
    }

    async fn health(&self, from_id: Option<i64>) -> Option<BotReply> {
        let is_admin = matches!((self.admin_id, from_id), (Some(admin), Some(from)) if admin == from);
        if !is_admin {
            return None;
        }

        Some(match self.directory.count().await {
            Ok(count) => BotReply::markdown(health_text(
                self.started.elapsed(),
                count,
                karogs_core::process::resident_memory_mb(),
            )),
            Err(e) => {
                tracing::error!("❌ Health command failed: {e}");
                BotReply::failure("Kļūda iegūstot veselības informāciju.")
            }
        })
    }

    async fn unknown(&self, chat_id: ChatId) -> BotReply {
        BotReply::plain("Nezināma komanda.")
            .with_keyboard(InlineKeyboard::main_menu(self.is_subscribed(chat_id).await))
    }
}

fn health_text(uptime: Duration, subscribers: usize, memory_mb: Option<u64>) -> String {
    let secs = uptime.as_secs();
    let memory = memory_mb.map_or_else(|| "n/a".to_string(), |mb| format!("{mb}MB"));
    format!(
        "*Bot Health Status*\n\n- Uptime: {}h {}m\n- Subscribers: {}\n- Memory: {}",
        secs / 3600,
        (secs % 3600) / 60,
        subscribers,
        memory
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe::Riga;
    use karogs_calendar::{DynamicDateCalculator, FixedClock};
    use karogs_core::KarogsError;
    use karogs_scheduler::InMemoryDirectory;

    struct FailingDirectory;

    #[async_trait]
    impl SubscriberDirectory for FailingDirectory {
        async fn add(&self, _: ChatId) -> karogs_core::Result<bool> {
            Err(KarogsError::storage("no space left"))
        }
        async fn remove(&self, _: ChatId) -> karogs_core::Result<bool> {
            Err(KarogsError::storage("no space left"))
        }
        async fn all(&self) -> karogs_core::Result<Vec<ChatId>> {
            Err(KarogsError::storage("no space left"))
        }
        async fn is_member(&self, _: ChatId) -> karogs_core::Result<bool> {
            Err(KarogsError::storage("no space left"))
        }
        async fn count(&self) -> karogs_core::Result<usize> {
            Err(KarogsError::storage("no space left"))
        }
    }

    fn registry() -> Arc<FlagDayRegistry> {
        let now = Riga.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap().with_timezone(&Utc);
        Arc::new(FlagDayRegistry::new(
            Arc::new(DynamicDateCalculator::new()),
            Arc::new(FixedClock::new(now)),
            Riga,
        ))
    }

    fn processor(directory: Arc<dyn SubscriberDirectory>) -> CommandProcessor {
        CommandProcessor::new(registry(), directory, Some(99))
    }

    fn toggle(reply: &BotReply) -> &str {
        &reply.keyboard.as_ref().unwrap().inline_keyboard[0][0].callback_data
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("/list@KarogsBot"), Some(BotCommand::List));
        assert_eq!(BotCommand::parse("  /next please"), Some(BotCommand::Next));
        assert_eq!(BotCommand::parse("/help"), Some(BotCommand::Unknown));
        assert_eq!(BotCommand::parse("/"), Some(BotCommand::Unknown));
        assert_eq!(BotCommand::parse("sveiki"), None);
    }

    #[test]
    fn test_parse_callbacks() {
        assert_eq!(BotCommand::from_callback("main_menu"), Some(BotCommand::Menu));
        assert_eq!(BotCommand::from_callback("list_flag_days"), Some(BotCommand::List));
        assert_eq!(BotCommand::from_callback("health"), None);
    }

    #[tokio::test]
    async fn test_start_shows_welcome_and_menu() {
        let p = processor(Arc::new(InMemoryDirectory::new()));
        let reply = p.handle(BotCommand::Start, 1, Some(1)).await.unwrap();
        assert!(reply.text.starts_with("Sveiki!"));
        assert!(reply.text.contains("lvportals.lv"));
        assert!(reply.markdown);
        assert!(reply.disable_preview);
        assert_eq!(toggle(&reply), "subscribe");
    }

    #[tokio::test]
    async fn test_subscribe_toggle() {
        let directory = Arc::new(InMemoryDirectory::new());
        let p = processor(directory.clone());

        let reply = p.handle(BotCommand::Subscribe, 5, Some(5)).await.unwrap();
        assert!(reply.text.starts_with("✅ Abonements aktivizēts!"));
        assert!(reply.text.ends_with("Kopā abonentu: 1"));
        assert_eq!(reply.callback_text.as_deref(), Some("Abonements aktivizēts!"));

        let again = p.handle(BotCommand::Subscribe, 5, Some(5)).await.unwrap();
        assert_eq!(again.text, "✅ Jūs jau esat abonējis atgādinājumus.");

        let menu = p.handle(BotCommand::Menu, 5, Some(5)).await.unwrap();
        assert_eq!(menu.text, "Izvēlieties darbību:");
        assert_eq!(toggle(&menu), "unsubscribe");

        let reply = p.handle(BotCommand::Unsubscribe, 5, Some(5)).await.unwrap();
        assert_eq!(reply.text, "🔕 Abonements atcelts.");
        let reply = p.handle(BotCommand::Unsubscribe, 5, Some(5)).await.unwrap();
        assert_eq!(reply.text, "❌ Jūs neesat abonējis atgādinājumus.");
        assert_eq!(reply.callback_text.as_deref(), Some("Jūs neesat abonējis"));
        assert_eq!(directory.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_and_next() {
        let p = processor(Arc::new(InMemoryDirectory::new()));

        let list = p.handle(BotCommand::List, 1, None).await.unwrap();
        assert!(list.text.starts_with("*Latvijas valsts karoga izkāršanas dienas 2024. gadā:*"));
        assert!(list.text.contains("*18.11*"));
        assert_eq!(toggle(&list), "main_menu");

        // 2024-11-20: the next one is the first Sunday of December.
        let next = p.handle(BotCommand::Next, 1, None).await.unwrap();
        assert!(next.text.starts_with("🏴 Nākamā karoga diena:\n\n*01.12, 2024*"));
    }

    #[tokio::test]
    async fn test_health_admin_only() {
        let p = processor(Arc::new(InMemoryDirectory::with_members([1, 2])));
        assert!(p.handle(BotCommand::Health, 1, Some(1)).await.is_none());
        assert!(p.handle(BotCommand::Health, 1, None).await.is_none());

        let reply = p.handle(BotCommand::Health, 1, Some(99)).await.unwrap();
        assert!(reply.text.starts_with("*Bot Health Status*"));
        assert!(reply.text.contains("- Subscribers: 2"));

        let no_admin = CommandProcessor::new(registry(), Arc::new(InMemoryDirectory::new()), None);
        assert!(no_admin.handle(BotCommand::Health, 1, Some(99)).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_command_offers_menu() {
        let p = processor(Arc::new(InMemoryDirectory::with_members([3])));
        let reply = p.handle(BotCommand::Unknown, 3, Some(3)).await.unwrap();
        assert_eq!(reply.text, "Nezināma komanda.");
        assert_eq!(toggle(&reply), "unsubscribe");
    }

    #[tokio::test]
    async fn test_directory_errors_become_messages() {
        let p = processor(Arc::new(FailingDirectory));
        let reply = p.handle(BotCommand::Subscribe, 1, Some(1)).await.unwrap();
        assert_eq!(reply.text, "Kļūda abonējot atgādinājumus.");
        assert!(reply.error);

        let reply = p.handle(BotCommand::Unsubscribe, 1, Some(1)).await.unwrap();
        assert_eq!(reply.text, "Kļūda atceļot abonementu.");

        let reply = p.handle(BotCommand::Health, 1, Some(99)).await.unwrap();
        assert_eq!(reply.text, "Kļūda iegūstot veselības informāciju.");
    }

    #[test]
    fn test_health_text() {
        assert_eq!(
            health_text(Duration::from_secs(3 * 3600 + 25 * 60 + 7), 12, Some(38)),
            "*Bot Health Status*\n\n- Uptime: 3h 25m\n- Subscribers: 12\n- Memory: 38MB"
        );
        assert!(health_text(Duration::ZERO, 0, None).ends_with("- Memory: n/a"));
    }
}
