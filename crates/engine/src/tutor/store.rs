//! Chat persistence.
//!
//! [`JsonChatStore`] keeps one `<chatId>.json` document per chat under a
//! directory, with an in-memory write-through cache so a running chat is
//! only read from disk once. File I/O runs on the blocking pool.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use tg_domain::error::{Error, Result};

use super::session::ChatSession;

#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a new chat. Fails if the id is already taken.
    async fn create(&self, session: &ChatSession) -> Result<()>;

    /// Load a chat, or `Error::NotFound`.
    async fn load(&self, chat_id: &str) -> Result<ChatSession>;

    /// Replace the stored state of an existing chat.
    async fn save(&self, session: &ChatSession) -> Result<()>;

    /// A user's chats, most recently updated first.
    async fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<ChatSession>>;
}

fn not_found(chat_id: &str) -> Error {
    Error::NotFound(format!("chat '{chat_id}'"))
}

fn most_recent(mut chats: Vec<ChatSession>, limit: usize) -> Vec<ChatSession> {
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    chats.truncate(limit);
    chats
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryChatStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct MemoryChatStore {
    chats: RwLock<HashMap<String, ChatSession>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryChatStore {
    async fn create(&self, session: &ChatSession) -> Result<()> {
        let mut chats = self.chats.write();
        if chats.contains_key(&session.id) {
            return Err(Error::Store(format!("chat '{}' already exists", session.id)));
        }
        chats.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, chat_id: &str) -> Result<ChatSession> {
        self.chats
            .read()
            .get(chat_id)
            .cloned()
            .ok_or_else(|| not_found(chat_id))
    }

    async fn save(&self, session: &ChatSession) -> Result<()> {
        let mut chats = self.chats.write();
        match chats.get_mut(&session.id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => Err(not_found(&session.id)),
        }
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<ChatSession>> {
        let chats = self
            .chats
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        Ok(most_recent(chats, limit))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JsonChatStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct JsonChatStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, ChatSession>>,
}

impl JsonChatStore {
    /// Open (creating if needed) a chat directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(Error::Io)?;
        tracing::info!(path = %dir.display(), "chat store opened");
        Ok(Self {
            dir: dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn path_for(&self, chat_id: &str) -> Result<PathBuf> {
        // Ids become file names; refuse anything that could escape the directory.
        let valid = !chat_id.is_empty()
            && chat_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::NotFound(format!("chat '{chat_id}'")));
        }
        Ok(self.dir.join(format!("{chat_id}.json")))
    }

    /// Write to disk first; the cache is only updated if I/O succeeds.
    async fn write_through(&self, session: &ChatSession, create: bool) -> Result<()> {
        let path = self.path_for(&session.id)?;
        let json = serde_json::to_string_pretty(session)?;

        tokio::task::spawn_blocking(move || write_document(&path, &json, create))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache.write().insert(session.id.clone(), session.clone());
        Ok(())
    }
}

/// Each write goes to its own temp file in the chat directory and is then
/// renamed into place, so readers only ever see a complete document.
fn write_document(path: &Path, json: &str, create: bool) -> Result<()> {
    if !create && !path.exists() {
        return Err(Error::NotFound(format!("{}", path.display())));
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(Error::Io)?;
    tmp.write_all(json.as_bytes()).map_err(Error::Io)?;

    if create {
        tmp.persist_noclobber(path).map_err(|e| match e.error.kind() {
            std::io::ErrorKind::AlreadyExists => {
                Error::Store(format!("{} already exists", path.display()))
            }
            _ => Error::Io(e.error),
        })?;
    } else {
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<Option<ChatSession>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::Store(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

fn read_all(dir: &Path) -> Result<Vec<ChatSession>> {
    let mut chats = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(Error::Io)? {
        let path = entry.map_err(Error::Io)?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match read_document(&path) {
            Ok(Some(chat)) => chats.push(chat),
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable chat"),
        }
    }
    Ok(chats)
}

#[async_trait::async_trait]
impl ChatStore for JsonChatStore {
    async fn create(&self, session: &ChatSession) -> Result<()> {
        self.write_through(session, true).await
    }

    async fn load(&self, chat_id: &str) -> Result<ChatSession> {
        // Fast path: return from cache.
        {
            let cache = self.cache.read();
            if let Some(chat) = cache.get(chat_id) {
                return Ok(chat.clone());
            }
        }

        let path = self.path_for(chat_id)?;
        let chat = tokio::task::spawn_blocking(move || read_document(&path))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??
            .ok_or_else(|| not_found(chat_id))?;

        self.cache.write().insert(chat_id.to_owned(), chat.clone());
        Ok(chat)
    }

    async fn save(&self, session: &ChatSession) -> Result<()> {
        self.write_through(session, false).await
    }

    async fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<ChatSession>> {
        let dir = self.dir.clone();
        let chats = tokio::task::spawn_blocking(move || read_all(&dir))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
        let mine = chats.into_iter().filter(|c| c.user_id == user_id).collect();
        Ok(most_recent(mine, limit))
    }
}
