use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Owner recorded for history rows until requests carry an authenticated user
pub const DEFAULT_OWNER_ID: i64 = 1;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub owner_id: i64,
    pub user_input: String,
    pub ai_response: Value,
    pub created_at: String,
}

/// SQLite store for users and modernization history
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let _ = std::fs::create_dir_all(parent);
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            -- Registered accounts
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                hashed_password TEXT NOT NULL,
                full_name TEXT,
                created_at TEXT NOT NULL
            );

            -- Successful modernization results
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                user_input TEXT NOT NULL,
                ai_response TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_owner ON history(owner_id);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        // A panic while holding the lock leaves the connection itself usable
        let conn: MutexGuard<'_, Connection> =
            self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&conn)
    }

    // ============ Users ============

    pub fn create_user(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<&str>,
    ) -> Result<User> {
        let now = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO users (email, hashed_password, full_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, hashed_password, full_name, now],
            )?;

            Ok(User {
                id: conn.last_insert_rowid(),
                email: email.to_string(),
                hashed_password: hashed_password.to_string(),
                full_name: full_name.map(str::to_string),
                created_at: now.clone(),
            })
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, email, hashed_password, full_name, created_at
                 FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        hashed_password: row.get(2)?,
                        full_name: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    // ============ History ============

    pub fn create_history_entry(
        &self,
        owner_id: i64,
        user_input: &str,
        ai_response: &Value,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let response_json = ai_response.to_string();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO history (owner_id, user_input, ai_response, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![owner_id, user_input, response_json, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Every history row, oldest first
    pub fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, user_input, ai_response, created_at
                 FROM history
                 ORDER BY id ASC",
            )?;

            let entries = stmt.query_map([], |row| {
                let raw: String = row.get(3)?;
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    user_input: row.get(2)?,
                    ai_response: serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
                    created_at: row.get(4)?,
                })
            })?;

            entries.collect()
        })
    }

    pub fn count_history(&self) -> Result<i64> {
        self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))
        })
    }
}
