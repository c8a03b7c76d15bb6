//! File-based subscriber store.
//! Subscribers are saved as a pretty-printed JSON array of chat ids.
//! Every mutation rewrites the file through a temp file + rename, so a crash
//! never leaves a truncated list behind. [`FileSubscriberStore::watch`] picks
//! up edits made to the file by other processes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use karogs_core::{ChatId, KarogsError, Result, SubscriberDirectory};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

const DEFAULT_FILE_NAME: &str = "subscribers.json";

/// How often [`FileSubscriberStore::watch`] looks at the file.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Modification time and length, enough to notice a rewrite.
type FileStamp = (Option<SystemTime>, u64);

/// JSON-file backed subscriber directory.
pub struct FileSubscriberStore {
    path: PathBuf,
    subscribers: Mutex<BTreeSet<ChatId>>,
    /// Stamp of the file as this process last read or wrote it.
    seen: std::sync::Mutex<Option<FileStamp>>,
}

impl FileSubscriberStore {
    /// Open (or create) the store. If `path` is an existing directory the
    /// list lives in `subscribers.json` inside it.
    pub async fn open(path: &Path) -> Result<Self> {
        let path = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                tracing::warn!(
                    "⚠️ Storage path {} is a directory, using {DEFAULT_FILE_NAME}",
                    path.display()
                );
                path.join(DEFAULT_FILE_NAME)
            }
            _ => path.to_path_buf(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            path,
            subscribers: Mutex::new(BTreeSet::new()),
            seen: std::sync::Mutex::new(None),
        };

        match read_set(&store.path).await? {
            Some(set) => {
                tracing::info!("📂 Loaded {} subscribers from {}", set.len(), store.path.display());
                *store.subscribers.lock().await = set;
                store.mark_seen().await;
            }
            None => {
                tracing::info!(
                    "📂 Subscribers file not found at {}, creating empty file",
                    store.path.display()
                );
                store.persist(&BTreeSet::new()).await?;
            }
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file, picking up edits made outside the process.
    pub async fn reload(&self) -> Result<usize> {
        let mut subscribers = self.subscribers.lock().await;
        if let Some(set) = read_set(&self.path).await? {
            *subscribers = set;
        }
        self.mark_seen().await;
        tracing::info!("🔄 Reloaded {} subscribers", subscribers.len());
        Ok(subscribers.len())
    }

    /// Poll the file every `interval` and reload it when another process
    /// rewrites it. Runs until `stop` is notified.
    pub fn watch(self: Arc<Self>, interval: Duration, stop: Arc<Notify>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("👀 Watching {} for external changes", self.path.display());
            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let Some(current) = file_stamp(&self.path).await else {
                    continue;
                };
                if self.lock_seen().as_ref() == Some(&current) {
                    continue;
                }

                tracing::info!("📝 {} changed on disk", self.path.display());
                if let Err(e) = self.reload().await {
                    tracing::error!("❌ Failed to reload subscribers: {e}");
                    // Don't retry the same broken content every tick.
                    *self.lock_seen() = Some(current);
                }
            }
            tracing::info!("👀 Stopped watching {}", self.path.display());
        })
    }

    async fn mark_seen(&self) {
        let stamp = file_stamp(&self.path).await;
        *self.lock_seen() = stamp;
    }

    fn lock_seen(&self) -> std::sync::MutexGuard<'_, Option<FileStamp>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write the set to `<file>.tmp`, then rename over the real file.
    async fn persist(&self, set: &BTreeSet<ChatId>) -> Result<()> {
        let ids: Vec<ChatId> = set.iter().copied().collect();
        let json = serde_json::to_string_pretty(&ids)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| KarogsError::storage(format!("Write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| KarogsError::storage(format!("Rename to {}: {e}", self.path.display())))?;

        self.mark_seen().await;

        tracing::debug!("💾 Saved {} subscribers to {}", ids.len(), self.path.display());
        Ok(())
    }
}

async fn file_stamp(path: &Path) -> Option<FileStamp> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.modified().ok(), meta.len()))
}

/// `Ok(None)` when the file does not exist.
async fn read_set(path: &Path) -> Result<Option<BTreeSet<ChatId>>> {
    match tokio::fs::read_to_string(path).await {
        Ok(json) => {
            let ids: Vec<ChatId> = serde_json::from_str(&json).map_err(|e| {
                KarogsError::storage(format!("Failed to parse {}: {e}", path.display()))
            })?;
            Ok(Some(ids.into_iter().collect()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(KarogsError::storage(format!("Failed to read {}: {e}", path.display()))),
    }
}

#[async_trait]
impl SubscriberDirectory for FileSubscriberStore {
    async fn add(&self, chat_id: ChatId) -> Result<bool> {
        let mut subscribers = self.subscribers.lock().await;
        if !subscribers.insert(chat_id) {
            return Ok(false);
        }
        if let Err(e) = self.persist(&subscribers).await {
            subscribers.remove(&chat_id);
            return Err(e);
        }
        tracing::info!("➕ Subscriber added: {chat_id} (total {})", subscribers.len());
        Ok(true)
    }

    async fn remove(&self, chat_id: ChatId) -> Result<bool> {
        let mut subscribers = self.subscribers.lock().await;
        if !subscribers.remove(&chat_id) {
            return Ok(false);
        }
        if let Err(e) = self.persist(&subscribers).await {
            subscribers.insert(chat_id);
            return Err(e);
        }
        tracing::info!("➖ Subscriber removed: {chat_id} (total {})", subscribers.len());
        Ok(true)
    }

    async fn all(&self) -> Result<Vec<ChatId>> {
        Ok(self.subscribers.lock().await.iter().copied().collect())
    }

    async fn is_member(&self, chat_id: ChatId) -> Result<bool> {
        Ok(self.subscribers.lock().await.contains(&chat_id))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.subscribers.lock().await.len())
    }
}

/// Non-persistent directory for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    subscribers: std::sync::Mutex<BTreeSet<ChatId>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(ids: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            subscribers: std::sync::Mutex::new(ids.into_iter().collect()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<ChatId>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SubscriberDirectory for InMemoryDirectory {
    async fn add(&self, chat_id: ChatId) -> Result<bool> {
        Ok(self.lock().insert(chat_id))
    }

    async fn remove(&self, chat_id: ChatId) -> Result<bool> {
        Ok(self.lock().remove(&chat_id))
    }

    async fn all(&self) -> Result<Vec<ChatId>> {
        Ok(self.lock().iter().copied().collect())
    }

    async fn is_member(&self, chat_id: ChatId) -> Result<bool> {
        Ok(self.lock().contains(&chat_id))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock().len())
    }
}
