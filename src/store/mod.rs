//! The embedded relational store (§4.1). Single writer, many readers, via
//! the same `Mutex<rusqlite::Connection>` pattern the teacher uses in
//! `db.rs` — this crate never reaches for a connection pool because the
//! teacher never does either, and the spec only asks for bounded-wait
//! lock tolerance, not concurrent writers.

mod schema;

pub mod audit;
pub mod classification;
pub mod content;
pub mod draft;
pub mod entity;
pub mod gem;
pub mod message;
pub mod metadata;
pub mod overrides;
pub mod profile;
pub mod relationship;
pub mod run;
pub mod segment;
pub mod sync_state;
pub mod thread;

use crate::error::{AppError, AppResult};
use rusqlite::Connection;
use std::sync::Mutex;
use std::time::Duration;

pub struct Store {
    pub conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &str) -> AppResult<Self> {
        if path != ":memory:"
            && let Some(parent) = std::path::Path::new(path).parent()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )?;
        let store = Store {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Store {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        schema::run_migrations(&conn)
    }

    pub fn reset(&self) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        schema::reset(&conn)
    }

    pub fn stats(&self) -> AppResult<serde_json::Value> {
        let conn = self.conn.lock().unwrap();
        schema::stats(&conn)
    }
}

/// Runs `f` against the connection, retrying a bounded number of times if
/// SQLite reports the database is locked (§4.1, §5 "bounded wait").
/// `busy_timeout` already blocks inside SQLite for simple statements; this
/// extra layer covers the rarer case of a retryable error surfacing through
/// a transaction boundary.
pub fn with_retry<T>(mut f: impl FnMut() -> rusqlite::Result<T>) -> AppResult<T> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 0;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::DatabaseBusy && attempt < MAX_ATTEMPTS - 1 =>
            {
                attempt += 1;
                std::thread::sleep(Duration::from_millis(100 * attempt as u64));
            }
            Err(e) => return Err(AppError::from(e)),
        }
    }
}
