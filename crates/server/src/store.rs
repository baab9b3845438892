use anyhow::Context;
use isles_protocol::{slug, Game, Island};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(i64::MAX)
}

fn new_id(prefix: &str) -> String {
    let c = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{c}", now_ms())
}

/// SQLite-backed game and island records, scoped by session owner.
///
/// `owner` is the caller's session token; `None` is the anonymous owner.
/// A record is only visible to the owner that created it.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db_path: PathBuf,
}

impl RecordStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn open(&self) -> anyhow::Result<Connection> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn)?;
        Ok(conn)
    }

    /// Games of `owner`, oldest first. Anonymous callers own no list.
    pub fn list_games(&self, owner: Option<&str>) -> anyhow::Result<Vec<Game>> {
        let Some(owner) = owner else {
            return Ok(Vec::new());
        };
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, islands_json FROM games WHERE owner = ?1 ORDER BY created_at_ms, rowid",
        )?;
        let rows = stmt.query_map([owner], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut games = Vec::new();
        for row in rows {
            let (id, name, islands_json) = row?;
            games.push(game_from_row(id, name, &islands_json)?);
        }
        Ok(games)
    }

    pub fn create_game(
        &self,
        owner: Option<&str>,
        name: &str,
        islands: &[String],
    ) -> anyhow::Result<Game> {
        let conn = self.open()?;
        let id = new_id("game");
        let islands_json = serde_json::to_string(islands)?;
        conn.execute(
            "INSERT INTO games (id, owner, name, islands_json, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            (&id, owner, name, &islands_json, now_ms()),
        )?;
        Ok(Game {
            object_id: Some(id),
            name: name.to_string(),
            islands: islands.to_vec(),
            active: false,
        })
    }

    /// `None` when the game does not exist for `owner`.
    pub fn update_game(
        &self,
        owner: Option<&str>,
        id: &str,
        name: &str,
        islands: &[String],
    ) -> anyhow::Result<Option<Game>> {
        let conn = self.open()?;
        let islands_json = serde_json::to_string(islands)?;
        let n = conn.execute(
            "UPDATE games SET name = ?1, islands_json = ?2, updated_at_ms = ?3
             WHERE id = ?4 AND owner IS ?5",
            (name, &islands_json, now_ms(), id, owner),
        )?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Game {
            object_id: Some(id.to_string()),
            name: name.to_string(),
            islands: islands.to_vec(),
            active: false,
        }))
    }

    /// Deletes the game and every island that belongs to it.
    pub fn delete_game(&self, owner: Option<&str>, id: &str) -> anyhow::Result<bool> {
        let conn = self.open()?;
        let n = conn.execute(
            "DELETE FROM games WHERE id = ?1 AND owner IS ?2",
            (id, owner),
        )?;
        Ok(n > 0)
    }

    pub fn list_islands(&self, owner: Option<&str>, game_id: &str) -> anyhow::Result<Vec<Island>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, game_id, url FROM islands WHERE game_id = ?1 AND owner IS ?2
             ORDER BY created_at_ms, rowid",
        )?;
        let rows = stmt.query_map((game_id, owner), island_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// `None` when `game_id` is not one of `owner`'s games.
    pub fn create_island(
        &self,
        owner: Option<&str>,
        game_id: &str,
        name: &str,
    ) -> anyhow::Result<Option<Island>> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let known: Option<String> = tx
            .query_row(
                "SELECT id FROM games WHERE id = ?1 AND owner IS ?2",
                (game_id, owner),
                |row| row.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Ok(None);
        }

        let id = new_id("island");
        let url = slug(name);
        let ts = now_ms();
        tx.execute(
            "INSERT INTO islands (id, owner, game_id, name, url, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            (&id, owner, game_id, name, &url, ts),
        )?;
        tx.commit()?;
        Ok(Some(Island {
            object_id: Some(id),
            name: name.to_string(),
            game: game_id.to_string(),
            url,
        }))
    }

    /// Renames an island; its url is always recomputed from the new name.
    pub fn update_island(
        &self,
        owner: Option<&str>,
        id: &str,
        name: &str,
    ) -> anyhow::Result<Option<Island>> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let url = slug(name);
        let n = tx.execute(
            "UPDATE islands SET name = ?1, url = ?2, updated_at_ms = ?3
             WHERE id = ?4 AND owner IS ?5",
            (name, &url, now_ms(), id, owner),
        )?;
        if n == 0 {
            return Ok(None);
        }
        let island = tx.query_row(
            "SELECT id, name, game_id, url FROM islands WHERE id = ?1",
            [id],
            island_from_row,
        )?;
        tx.commit()?;
        Ok(Some(island))
    }

    pub fn delete_island(&self, owner: Option<&str>, id: &str) -> anyhow::Result<bool> {
        let conn = self.open()?;
        let n = conn.execute(
            "DELETE FROM islands WHERE id = ?1 AND owner IS ?2",
            (id, owner),
        )?;
        Ok(n > 0)
    }
}

fn game_from_row(id: String, name: String, islands_json: &str) -> anyhow::Result<Game> {
    let islands: Vec<String> = serde_json::from_str(islands_json)
        .with_context(|| format!("decode island order of game {id}"))?;
    Ok(Game {
        object_id: Some(id),
        name,
        islands,
        active: false,
    })
}

fn island_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Island> {
    Ok(Island {
        object_id: Some(row.get(0)?),
        name: row.get(1)?,
        game: row.get(2)?,
        url: row.get(3)?,
    })
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS games (
  id TEXT PRIMARY KEY,
  owner TEXT,
  name TEXT NOT NULL,
  islands_json TEXT NOT NULL DEFAULT '[]',
  created_at_ms INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_games_owner ON games(owner);

CREATE TABLE IF NOT EXISTS islands (
  id TEXT PRIMARY KEY,
  owner TEXT,
  game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  url TEXT NOT NULL,
  created_at_ms INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_islands_game ON islands(game_id);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    Ok(())
}
