//! SQLite-backed [`CredentialStore`].
//!
//! One connection behind a mutex; every call runs on the blocking pool.
//! Counter writes are a single `UPDATE ... WHERE <guard> RETURNING`, so the
//! check and the modification are one statement.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use tg_domain::access::{AccessLayer, ClassAccessConfig, Credential, ModelSpec};
use tg_domain::config::ProviderKind;
use tg_domain::error::{Error, Result};

use crate::store::CredentialStore;

const LAYER_CONSUMER: &str = "consumer";
const LAYER_USER_CLASS: &str = "user_class";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SqliteCredentialStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct SqliteCredentialStore {
    default_tokens: u32,
    connection: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>, default_tokens: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut connection = open_connection(&path)?;
        initialize_schema(&mut connection)?;
        tracing::debug!(path = %path.display(), "opened sqlite credential store");
        Ok(Self {
            default_tokens,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Insert or replace a class's policy, both layers included.
    pub async fn put_class(&self, config: ClassAccessConfig) -> Result<()> {
        self.with_connection(move |conn| {
            let tx = conn.transaction().map_err(db_err)?;
            tx.execute(
                "INSERT INTO classes (class_id, enabled, query_limit) VALUES (?1, ?2, ?3)
                 ON CONFLICT(class_id) DO UPDATE SET enabled = ?2, query_limit = ?3",
                params![config.class_id, config.enabled, config.query_limit],
            )
            .map_err(db_err)?;
            tx.execute(
                "DELETE FROM class_layers WHERE class_id = ?1",
                params![config.class_id],
            )
            .map_err(db_err)?;
            for (name, layer) in [
                (LAYER_CONSUMER, &config.consumer),
                (LAYER_USER_CLASS, &config.user_class),
            ] {
                let Some(layer) = layer else { continue };
                tx.execute(
                    "INSERT INTO class_layers (class_id, layer, credential, provider, model)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        config.class_id,
                        name,
                        layer.credential.as_ref().map(|c| c.expose().to_string()),
                        layer.model.as_ref().map(|m| m.provider.as_str()),
                        layer.model.as_ref().map(|m| m.model.clone()),
                    ],
                )
                .map_err(db_err)?;
            }
            tx.commit().map_err(db_err)
        })
        .await
    }

    /// Overwrite a user's balance (replenishment is an admin action).
    pub async fn set_quota(&self, user_id: &str, tokens: u32) -> Result<()> {
        let user_id = user_id.to_string();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO users (user_id, query_tokens) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET query_tokens = ?2",
                params![user_id, tokens],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Store(format!("sqlite task failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn class_config(&self, class_id: &str) -> Result<Option<ClassAccessConfig>> {
        let class_id = class_id.to_string();
        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    "SELECT enabled, query_limit FROM classes WHERE class_id = ?1",
                    params![class_id],
                    |row| Ok((row.get::<_, bool>(0)?, row.get::<_, Option<u32>>(1)?)),
                )
                .optional()
                .map_err(db_err)?;
            let Some((enabled, query_limit)) = row else {
                return Ok(None);
            };

            let mut config = ClassAccessConfig {
                class_id: class_id.clone(),
                enabled,
                consumer: None,
                user_class: None,
                query_limit,
            };

            let mut stmt = conn
                .prepare(
                    "SELECT layer, credential, provider, model FROM class_layers
                     WHERE class_id = ?1",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![class_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                })
                .map_err(db_err)?;
            for row in rows {
                let (name, credential, provider, model) = row.map_err(db_err)?;
                let layer = AccessLayer {
                    credential: credential.map(Credential::new),
                    model: match model {
                        Some(model) => Some(ModelSpec::new(parse_provider(provider.as_deref())?, model)),
                        None => None,
                    },
                };
                match name.as_str() {
                    LAYER_CONSUMER => config.consumer = Some(layer),
                    LAYER_USER_CLASS => config.user_class = Some(layer),
                    other => {
                        return Err(Error::Store(format!("unknown class layer '{other}'")));
                    }
                }
            }
            Ok(Some(config))
        })
        .await
    }

    async fn quota_balance(&self, user_id: &str) -> Result<u32> {
        let user_id = user_id.to_string();
        let default_tokens = self.default_tokens;
        self.with_connection(move |conn| {
            // Unknown users read as the default grant; the row is written on
            // first spend.
            let tokens: Option<u32> = conn
                .query_row(
                    "SELECT query_tokens FROM users WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            Ok(tokens.unwrap_or(default_tokens))
        })
        .await
    }

    async fn decrement_quota_if_positive(&self, user_id: &str) -> Result<Option<u32>> {
        let user_id = user_id.to_string();
        let default_tokens = self.default_tokens;
        self.with_connection(move |conn| {
            ensure_user(conn, &user_id, default_tokens)?;
            conn.query_row(
                "UPDATE users SET query_tokens = query_tokens - 1
                 WHERE user_id = ?1 AND query_tokens > 0
                 RETURNING query_tokens",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
        })
        .await
    }

    async fn class_queries_used(&self, class_id: &str, user_id: &str) -> Result<u32> {
        let (class_id, user_id) = (class_id.to_string(), user_id.to_string());
        self.with_connection(move |conn| {
            let used: Option<u32> = conn
                .query_row(
                    "SELECT queries_used FROM class_queries WHERE class_id = ?1 AND user_id = ?2",
                    params![class_id, user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            Ok(used.unwrap_or(0))
        })
        .await
    }

    async fn increment_class_queries_below(
        &self,
        class_id: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Option<u32>> {
        let (class_id, user_id) = (class_id.to_string(), user_id.to_string());
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO class_queries (class_id, user_id, queries_used)
                 VALUES (?1, ?2, 0)",
                params![class_id, user_id],
            )
            .map_err(db_err)?;
            conn.query_row(
                "UPDATE class_queries SET queries_used = queries_used + 1
                 WHERE class_id = ?1 AND user_id = ?2 AND queries_used < ?3
                 RETURNING queries_used",
                params![class_id, user_id, limit],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
        })
        .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn db_err(err: rusqlite::Error) -> Error {
    Error::Store(err.to_string())
}

fn open_connection(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(path, flags).map_err(db_err)?;
    apply_pragmas(&connection)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection) -> Result<()> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
        .map_err(db_err)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(5_000))
        .map_err(db_err)?;
    Ok(())
}

fn initialize_schema(connection: &mut Connection) -> Result<()> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS classes (
             class_id    TEXT PRIMARY KEY,
             enabled     INTEGER NOT NULL,
             query_limit INTEGER
         );
         CREATE TABLE IF NOT EXISTS class_layers (
             class_id   TEXT NOT NULL REFERENCES classes(class_id) ON DELETE CASCADE,
             layer      TEXT NOT NULL CHECK (layer IN ('consumer', 'user_class')),
             credential TEXT,
             provider   TEXT,
             model      TEXT,
             PRIMARY KEY (class_id, layer)
         );
         CREATE TABLE IF NOT EXISTS users (
             user_id      TEXT PRIMARY KEY,
             query_tokens INTEGER NOT NULL CHECK (query_tokens >= 0)
         );
         CREATE TABLE IF NOT EXISTS class_queries (
             class_id     TEXT NOT NULL,
             user_id      TEXT NOT NULL,
             queries_used INTEGER NOT NULL DEFAULT 0,
             PRIMARY KEY (class_id, user_id)
         );",
    )
    .map_err(db_err)?;
    tx.commit().map_err(db_err)
}

fn ensure_user(conn: &Connection, user_id: &str, default_tokens: u32) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO users (user_id, query_tokens) VALUES (?1, ?2)",
        params![user_id, default_tokens],
    )
    .map_err(db_err)?;
    Ok(())
}

fn parse_provider(raw: Option<&str>) -> Result<ProviderKind> {
    match raw {
        None | Some("openai") => Ok(ProviderKind::Openai),
        Some("google") => Ok(ProviderKind::Google),
        Some(other) => Err(Error::Store(format!("unknown provider '{other}'"))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteCredentialStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCredentialStore::open(dir.path().join("access.db"), 20).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn class_layers_round_trip() {
        let (_dir, store) = open_temp();
        let config = ClassAccessConfig {
            class_id: "cs101".into(),
            enabled: true,
            consumer: Some(AccessLayer {
                credential: None,
                model: Some(ModelSpec::new(ProviderKind::Google, "gemini-2.0-flash")),
            }),
            user_class: Some(AccessLayer {
                credential: Some(Credential::new("sk-user")),
                model: None,
            }),
            query_limit: Some(10),
        };
        store.put_class(config.clone()).await.unwrap();

        let loaded = store.class_config("cs101").await.unwrap().unwrap();
        assert_eq!(loaded, config);
        assert!(store.class_config("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn decrement_returns_post_value_and_stops_at_zero() {
        let (_dir, store) = open_temp();
        store.set_quota("u1", 2).await.unwrap();
        assert_eq!(store.decrement_quota_if_positive("u1").await.unwrap(), Some(1));
        assert_eq!(store.decrement_quota_if_positive("u1").await.unwrap(), Some(0));
        assert_eq!(store.decrement_quota_if_positive("u1").await.unwrap(), None);
        assert_eq!(store.quota_balance("u1").await.unwrap(), 0);
    }

    fn user_rows(store: &SqliteCredentialStore) -> u32 {
        store
            .connection
            .lock()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn new_user_gets_default_grant() {
        let (_dir, store) = open_temp();
        assert_eq!(store.quota_balance("fresh").await.unwrap(), 20);
        assert_eq!(user_rows(&store), 0);
        assert_eq!(store.decrement_quota_if_positive("fresh").await.unwrap(), Some(19));
        assert_eq!(user_rows(&store), 1);
    }

    #[tokio::test]
    async fn balance_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.db");
        {
            let store = SqliteCredentialStore::open(&path, 5).unwrap();
            store.decrement_quota_if_positive("u1").await.unwrap();
        }
        let store = SqliteCredentialStore::open(&path, 5).unwrap();
        assert_eq!(store.quota_balance("u1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn class_counter_respects_limit() {
        let (_dir, store) = open_temp();
        assert_eq!(store.increment_class_queries_below("c", "u", 1).await.unwrap(), Some(1));
        assert_eq!(store.increment_class_queries_below("c", "u", 1).await.unwrap(), None);
        assert_eq!(store.class_queries_used("c", "u").await.unwrap(), 1);
    }
}
