use anyhow::Context;
use isles_protocol::{Game, Island};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const UNSYNCED: &str = "unsynced";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    ActiveGame,
    Islands,
}

impl Namespace {
    pub fn key(self) -> &'static str {
        match self {
            Self::ActiveGame => "activeGame",
            Self::Islands => "islands",
        }
    }
}

/// Durable local copy of the active game and its island list.
///
/// The two namespaces are independent; callers keep them consistent by
/// writing both whenever a change touches both. A missing namespace is a
/// valid empty state, not an error.
pub trait SnapshotStore {
    fn get(&self, ns: Namespace) -> anyhow::Result<Option<Value>>;

    /// `None` removes the namespace.
    fn set(&self, ns: Namespace, value: Option<Value>) -> anyhow::Result<()>;

    fn active_game(&self) -> anyhow::Result<Option<Game>> {
        Ok(self.get(Namespace::ActiveGame)?.and_then(|v| decode(Namespace::ActiveGame, v)))
    }

    /// Stores the game as in sync with the remote store.
    fn set_active_game(&self, game: Option<&Game>) -> anyhow::Result<()> {
        let value = game.map(serde_json::to_value).transpose()?;
        self.set(Namespace::ActiveGame, value)
    }

    /// Stores the game with local changes the remote game record has not
    /// accepted yet. The mark stays until the next [`set_active_game`].
    ///
    /// [`set_active_game`]: SnapshotStore::set_active_game
    fn set_active_game_unsynced(&self, game: &Game) -> anyhow::Result<()> {
        let mut value = serde_json::to_value(game)?;
        if let Value::Object(fields) = &mut value {
            fields.insert(UNSYNCED.to_string(), Value::Bool(true));
        }
        self.set(Namespace::ActiveGame, Some(value))
    }

    fn active_game_unsynced(&self) -> anyhow::Result<bool> {
        Ok(self
            .get(Namespace::ActiveGame)?
            .and_then(|v| v.get(UNSYNCED).and_then(Value::as_bool))
            .unwrap_or(false))
    }

    fn islands(&self) -> anyhow::Result<Option<Vec<Island>>> {
        Ok(self.get(Namespace::Islands)?.and_then(|v| decode(Namespace::Islands, v)))
    }

    fn set_islands(&self, islands: Option<&[Island]>) -> anyhow::Result<()> {
        let value = islands.map(serde_json::to_value).transpose()?;
        self.set(Namespace::Islands, value)
    }
}

fn decode<T: DeserializeOwned>(ns: Namespace, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::warn!(namespace = ns.key(), %err, "discarding unreadable snapshot");
            None
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

/// SQLite-backed snapshot store; survives process restarts.
#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    db_path: PathBuf,
}

impl SqliteSnapshotStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create snapshot dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open snapshot db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn)?;
        Ok(conn)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn get(&self, ns: Namespace) -> anyhow::Result<Option<Value>> {
        let conn = self.open()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM snapshots WHERE namespace = ?1",
                [ns.key()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)
                .map_err(|err| {
                    tracing::warn!(namespace = ns.key(), %err, "snapshot row is not json");
                })
                .ok()),
            None => Ok(None),
        }
    }

    fn set(&self, ns: Namespace, value: Option<Value>) -> anyhow::Result<()> {
        let conn = self.open()?;
        match value {
            Some(value) => {
                conn.execute(
                    "INSERT INTO snapshots (namespace, value_json, updated_at_ms) VALUES (?1, ?2, ?3)
                     ON CONFLICT(namespace) DO UPDATE SET value_json = excluded.value_json, updated_at_ms = excluded.updated_at_ms",
                    (ns.key(), value.to_string(), now_ms()),
                )
                .with_context(|| format!("write snapshot {}", ns.key()))?;
            }
            None => {
                conn.execute("DELETE FROM snapshots WHERE namespace = ?1", [ns.key()])
                    .with_context(|| format!("clear snapshot {}", ns.key()))?;
            }
        }
        Ok(())
    }
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS snapshots (
  namespace TEXT PRIMARY KEY,
  value_json TEXT NOT NULL,
  updated_at_ms INTEGER NOT NULL
);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    Ok(())
}

/// In-process snapshot store. Lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: Mutex<HashMap<Namespace, Value>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self, ns: Namespace) -> anyhow::Result<Option<Value>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot lock poisoned"))?;
        Ok(slots.get(&ns).cloned())
    }

    fn set(&self, ns: Namespace, value: Option<Value>) -> anyhow::Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot lock poisoned"))?;
        match value {
            Some(value) => slots.insert(ns, value),
            None => slots.remove(&ns),
        };
        Ok(())
    }
}
