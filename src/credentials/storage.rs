//! Token record storage using SQLite.
//!
//! Stores labels and encrypted envelopes. This module never sees plaintext.

use super::TokenRecord;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Keyed store of token records backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE user_tokens (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     label TEXT,
///     token_enc TEXT,      -- base64 envelope
///     created_at TEXT      -- RFC 3339 timestamp
/// );
/// ```
///
/// # Thread Safety
/// - One owned connection behind a Mutex
/// - Each operation holds the lock for a single statement and never across an `.await`
pub struct TokenStore {
    conn: Mutex<Connection>,
}

impl TokenStore {
    /// Creates or opens a token store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS user_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT,
                token_enc TEXT,
                created_at TEXT
            )
            "#,
            [],
        )
        .context("Failed to create user_tokens table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Token store connection lock poisoned"))
    }

    /// Inserts a new record and returns its id.
    ///
    /// # Arguments
    /// * `label` - Free-form label supplied by the caller
    /// * `envelope` - Encrypted token (already sealed)
    pub fn insert(&self, label: &str, envelope: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_tokens (label, token_enc, created_at) VALUES (?1, ?2, ?3)",
            params![label, envelope, now],
        )
        .context("Failed to insert token")?;

        Ok(conn.last_insert_rowid())
    }

    /// Fetches a record by id.
    ///
    /// # Returns
    /// * `Ok(Some(TokenRecord))` - Record found
    /// * `Ok(None)` - No record with that id
    /// * `Err` - If the database operation fails
    pub fn get(&self, id: i64) -> Result<Option<TokenRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, label, token_enc, created_at FROM user_tokens WHERE id = ?1")
            .context("Failed to prepare query")?;

        let mut rows = stmt.query(params![id]).context("Failed to execute query")?;

        if let Some(row) = rows.next().context("Failed to read row")? {
            let label: Option<String> = row.get(1)?;
            let created_at: Option<String> = row.get(3)?;
            let created_at = created_at.as_deref().and_then(|raw| {
                let parsed = parse_created_at(raw);
                if parsed.is_none() {
                    warn!(id, "Unparseable created_at timestamp");
                }
                parsed
            });

            Ok(Some(TokenRecord {
                id: row.get(0)?,
                label: label.unwrap_or_default(),
                encrypted_token: row.get(2)?,
                created_at,
            }))
        } else {
            Ok(None)
        }
    }

    /// Deletes a record by id.
    ///
    /// # Returns
    /// * `Ok(1)` - Record deleted
    /// * `Ok(0)` - No record with that id (not an error)
    pub fn delete(&self, id: i64) -> Result<usize> {
        let rows_affected = self
            .conn()?
            .execute("DELETE FROM user_tokens WHERE id = ?1", params![id])
            .context("Failed to delete token")?;

        Ok(rows_affected)
    }
}

/// RFC 3339, or a naive ISO 8601 timestamp taken as UTC (rows written without an offset).
fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> TokenStore {
        TokenStore::new(":memory:").expect("Failed to create test store")
    }

    #[test]
    fn test_insert_and_get() {
        let store = create_test_store();

        let id = store.insert("work", "ZW52ZWxvcGU=").expect("Failed to insert");
        assert_eq!(id, 1);

        let record = store
            .get(id)
            .expect("Failed to get")
            .expect("Record not found");

        assert_eq!(record.id, id);
        assert_eq!(record.label, "work");
        assert_eq!(record.encrypted_token, "ZW52ZWxvcGU=");
        assert!(record.created_at.unwrap() <= Utc::now());
    }

    #[test]
    fn test_ids_are_unique() {
        let store = create_test_store();

        let first = store.insert("a", "x").unwrap();
        let second = store.insert("a", "x").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();

        let result = store.get(42).expect("Failed to get");
        assert!(result.is_none());
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let id = store.insert("work", "x").unwrap();

        assert_eq!(store.delete(id).unwrap(), 1);
        assert!(store.get(id).unwrap().is_none());

        // Deleting again is not an error
        assert_eq!(store.delete(id).unwrap(), 0);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let store = create_test_store();

        let first = store.insert("a", "x").unwrap();
        store.delete(first).unwrap();
        let second = store.insert("b", "y").unwrap();

        assert!(second > first);
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");

        let id = {
            let store = TokenStore::new(&path).unwrap();
            store.insert("persisted", "ZW52").unwrap()
        };

        let store = TokenStore::new(&path).unwrap();
        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.label, "persisted");
        assert_eq!(record.encrypted_token, "ZW52");
    }

    fn insert_raw(path: &Path, created_at: Option<&str>) -> i64 {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "INSERT INTO user_tokens (label, token_enc, created_at) VALUES ('legacy', 'ZW52', ?1)",
            params![created_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_naive_timestamp_rows_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");
        let store = TokenStore::new(&path).unwrap();

        let id = insert_raw(&path, Some("2024-05-01T12:00:00.123456"));

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.label, "legacy");
        assert_eq!(
            record.created_at.unwrap().to_rfc3339(),
            "2024-05-01T12:00:00.123456+00:00"
        );
    }

    #[test]
    fn test_missing_or_garbage_timestamp_does_not_fail_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.db");
        let store = TokenStore::new(&path).unwrap();

        let null_id = insert_raw(&path, None);
        let garbage_id = insert_raw(&path, Some("yesterday"));

        let record = store.get(null_id).unwrap().unwrap();
        assert!(record.created_at.is_none());
        assert_eq!(record.encrypted_token, "ZW52");

        let record = store.get(garbage_id).unwrap().unwrap();
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_parse_created_at() {
        assert!(parse_created_at("2024-05-01T12:00:00+02:00").is_some());
        assert!(parse_created_at("2024-05-01T12:00:00").is_some());
        assert!(parse_created_at("2024-05-01T12:00:00.5").is_some());
        assert!(parse_created_at("").is_none());
        assert!(parse_created_at("2024-05-01").is_none());
    }
}
