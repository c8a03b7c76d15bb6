//! Karogs configuration system.
//!
//! Values come from `~/.karogs/config.toml` (or an explicit path) and are
//! then overridden by environment variables, so a container can be configured
//! with nothing but `BOT_TOKEN`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{KarogsError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KarogsConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl KarogsConfig {
    /// Load config from the default path (~/.karogs/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KarogsError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| KarogsError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Karogs home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".karogs")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(admin) = lookup("ADMIN_ID") {
            let id = admin
                .trim()
                .parse::<i64>()
                .map_err(|_| KarogsError::config(format!("ADMIN_ID must be an integer, got '{admin}'")))?;
            self.telegram.admin_id = Some(id);
        }
        if let Some(hour) = lookup("NOTIFICATION_TIME") {
            self.notification.hour = parse_hour(&hour)?;
        }
        if let Some(tz) = lookup("TIMEZONE") {
            self.notification.timezone = tz;
        }
        if let Some(path) = lookup("STORAGE_PATH") {
            self.storage.path = path;
        }
        if let Some(port) = lookup("HTTP_PORT") {
            self.gateway.port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| KarogsError::config(format!("Invalid HTTP_PORT: {port}")))?;
        }
        Ok(())
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.notification.hour > 23 {
            return Err(KarogsError::config("NOTIFICATION_TIME must be between 0 and 23"));
        }
        self.notification.tz()?;
        if self.notification.batch_size == 0 {
            return Err(KarogsError::config("notification.batch_size must be at least 1"));
        }
        if self.gateway.enabled && self.gateway.port == 0 {
            return Err(KarogsError::config(format!("Invalid HTTP_PORT: {}", self.gateway.port)));
        }
        tracing::debug!(
            hour = self.notification.hour,
            timezone = %self.notification.timezone,
            storage = %self.storage.path,
            port = self.gateway.port,
            "Configuration validated"
        );
        Ok(())
    }

    /// Like [`validate`](Self::validate), but also requires a bot token.
    pub fn validate_for_bot(&self) -> Result<()> {
        self.validate()?;
        if self.telegram.bot_token.trim().is_empty() {
            return Err(KarogsError::config("Missing required environment variable: BOT_TOKEN"));
        }
        Ok(())
    }
}

/// Accepts "7" as well as the older "07:00" form; minutes are ignored.
fn parse_hour(raw: &str) -> Result<u8> {
    let hour_part = raw.trim().split(':').next().unwrap_or_default();
    match hour_part.parse::<u8>() {
        Ok(h) if h <= 23 => Ok(h),
        _ => Err(KarogsError::config(format!(
            "NOTIFICATION_TIME must be between 0 and 23, got '{raw}'"
        ))),
    }
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Telegram user allowed to run `/health`.
    #[serde(default)]
    pub admin_id: Option<i64>,
    /// Seconds between `getUpdates` calls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 { 1 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_id: None,
            poll_interval: default_poll_interval(),
        }
    }
}

/// Daily reminder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Local hour (0–23) at which the daily check runs.
    #[serde(default = "default_hour")]
    pub hour: u8,
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Recipients per concurrent batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches, in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_hour() -> u8 { 7 }
fn default_timezone() -> String { "Europe/Riga".into() }
fn default_batch_size() -> usize { 50 }
fn default_batch_delay_ms() -> u64 { 100 }

impl NotificationConfig {
    /// Parsed timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| KarogsError::config(format!("Invalid timezone: {}", self.timezone)))
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            hour: default_hour(),
            timezone: default_timezone(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

/// Subscriber storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File, or directory that will hold `subscribers.json`. `~` is expanded.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String { "./data".into() }

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }

    /// The JSON file holding the subscriber list. A path ending in `.json`
    /// is used as-is, anything else is a directory.
    pub fn subscribers_file(&self) -> PathBuf {
        let path = self.resolved_path();
        if path.extension().is_some_and(|ext| ext == "json") {
            path
        } else {
            path.join("subscribers.json")
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Health endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn bool_true() -> bool { true }
fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 3000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_default_config() {
        let config = KarogsConfig::default();
        assert_eq!(config.notification.hour, 7);
        assert_eq!(config.notification.timezone, "Europe/Riga");
        assert_eq!(config.notification.batch_size, 50);
        assert_eq!(config.notification.batch_delay_ms, 100);
        assert_eq!(config.gateway.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [telegram]
            bot_token = "123:abc"
            admin_id = 42

            [notification]
            hour = 9
            timezone = "Europe/Tallinn"
            batch_size = 20
        "#;

        let config: KarogsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.admin_id, Some(42));
        assert_eq!(config.notification.hour, 9);
        assert_eq!(config.notification.batch_size, 20);
        assert_eq!(config.notification.batch_delay_ms, 100);
        assert_eq!(config.notification.tz().unwrap(), chrono_tz::Europe::Tallinn);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: KarogsConfig = toml::from_str("").unwrap();
        assert_eq!(config.storage.path, "./data");
        assert_eq!(config.telegram.poll_interval, 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\npath = \"/var/lib/karogs\"\n").unwrap();
        let config = KarogsConfig::load_from(&path).unwrap();
        assert_eq!(config.storage.path, "/var/lib/karogs");
        assert_eq!(
            config.storage.subscribers_file(),
            PathBuf::from("/var/lib/karogs/subscribers.json")
        );
    }

    #[test]
    fn test_storage_path_with_json_file() {
        let storage = StorageConfig {
            path: "/srv/bot/subs.json".into(),
        };
        assert_eq!(storage.subscribers_file(), PathBuf::from("/srv/bot/subs.json"));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("BOT_TOKEN", "999:xyz"),
            ("NOTIFICATION_TIME", "08:00"),
            ("STORAGE_PATH", "/tmp/karogs"),
            ("HTTP_PORT", "8080"),
            ("ADMIN_ID", "17"),
        ]);
        let mut config = KarogsConfig::default();
        config.apply_overrides(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.telegram.bot_token, "999:xyz");
        assert_eq!(config.notification.hour, 8);
        assert_eq!(config.storage.path, "/tmp/karogs");
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.telegram.admin_id, Some(17));
        assert!(config.validate_for_bot().is_ok());
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let mut config = KarogsConfig::default();
        let vars = env(&[("NOTIFICATION_TIME", "24")]);
        assert!(config.apply_overrides(|k| vars.get(k).cloned()).is_err());

        let vars = env(&[("HTTP_PORT", "http")]);
        assert!(config.apply_overrides(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = KarogsConfig::default();
        assert!(config.validate_for_bot().is_err());

        config.notification.timezone = "Mars/Olympus".into();
        assert!(matches!(config.validate(), Err(KarogsError::Config(_))));

        config.notification.timezone = "Europe/Riga".into();
        config.notification.hour = 30;
        assert!(config.validate().is_err());

        config.notification.hour = 7;
        config.notification.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_home_dir() {
        let home = KarogsConfig::home_dir();
        assert!(home.to_string_lossy().contains("karogs"));
    }
}
