use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

pub const BASE_URL_KEY: &str = "api_base_url";

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    pub fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM preferences WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("storage: query preference {key}"))
    }

    pub fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            bail!("storage: preference key required");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO preferences (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key, value, Utc::now().timestamp()],
        )
        .with_context(|| format!("storage: write preference {key}"))?;
        Ok(())
    }

    pub fn base_url(&self) -> Result<Option<String>> {
        self.get_preference(BASE_URL_KEY)
    }

    pub fn set_base_url(&self, url: &str) -> Result<()> {
        self.set_preference(BASE_URL_KEY, url)
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().timestamp()],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS preferences (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("post-browser").join("state.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_at(path: &std::path::Path) -> Store {
        Store::open(Options {
            path: Some(path.to_path_buf()),
        })
        .unwrap()
    }

    #[test]
    fn open_creates_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        let store = open_at(&path);
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn missing_base_url_is_none() {
        let dir = tempdir().unwrap();
        let store = open_at(&dir.path().join("state.db"));
        assert_eq!(store.base_url().unwrap(), None);
    }

    #[test]
    fn base_url_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = open_at(&path);
        store.set_base_url("http://localhost:5002/api").unwrap();
        store.set_base_url("http://localhost:5003/api").unwrap();
        store.close().unwrap();

        let reopened = open_at(&path);
        assert_eq!(
            reopened.base_url().unwrap().as_deref(),
            Some("http://localhost:5003/api")
        );
    }

    #[test]
    fn migrations_and_preferences_share_a_clock() {
        let dir = tempdir().unwrap();
        let store = open_at(&dir.path().join("state.db"));
        let before = Utc::now().timestamp();
        store.set_base_url("http://localhost:5002/api").unwrap();

        let conn = store.conn.lock();
        let applied: i64 = conn
            .query_row("SELECT applied_at FROM schema_migrations WHERE version = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        let updated: i64 = conn
            .query_row(
                "SELECT updated_at FROM preferences WHERE key = ?1",
                params![BASE_URL_KEY],
                |row| row.get(0),
            )
            .unwrap();
        assert!(applied <= updated);
        assert!(updated >= before && updated - before < 60);
        assert!(before - applied < 60);
    }

    #[test]
    fn empty_key_is_rejected() {
        let dir = tempdir().unwrap();
        let store = open_at(&dir.path().join("state.db"));
        assert!(store.set_preference("", "value").is_err());
    }
}
