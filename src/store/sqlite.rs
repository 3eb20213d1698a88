// SQLite-backed credential store

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{AuditEntry, CredentialStore, StoreError};
use crate::auth::CredentialPair;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    bearer_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    slack_user_id TEXT NOT NULL,
    mc_number TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('invite', 'decline'))
);
";

/// Singleton `tokens` row plus `audit_log`, in one SQLite file
///
/// The connection is opened lazily by the first operation, normally `initialize()`.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(None),
        }
    }

    fn connect(path: &Path) -> Result<Connection, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "cannot create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Unavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(conn)
    }

    fn with_conn<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        if guard.is_none() {
            *guard = Some(Self::connect(&self.path)?);
        }
        let conn = guard
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("connection not open".to_string()))?;
        op(conn)
    }
}

impl CredentialStore for SqliteStore {
    fn initialize(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)
                .map_err(|e| StoreError::Unavailable(format!("schema setup failed: {}", e)))
        })?;
        tracing::info!("Database initialized: {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
        let row = self.with_conn(|conn| {
            conn.query_row(
                "SELECT bearer_token, refresh_token, updated_at FROM tokens WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::from)
        })?;

        let Some((bearer_token, refresh_token, updated_at)) = row else {
            return Ok(None);
        };

        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Query(format!("invalid tokens.updated_at: {}", e)))?;

        Ok(Some(CredentialPair {
            bearer_token,
            refresh_token,
            updated_at,
        }))
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tokens (id, bearer_token, refresh_token, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    bearer_token = excluded.bearer_token,
                    refresh_token = excluded.refresh_token,
                    updated_at = excluded.updated_at",
                params![
                    pair.bearer_token,
                    pair.refresh_token,
                    pair.updated_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })?;
        tracing::info!("Tokens saved to database");
        Ok(())
    }

    fn record_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_log (timestamp, slack_user_id, mc_number, action)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.timestamp.to_rfc3339(),
                    entry.actor,
                    entry.subject,
                    entry.action.as_str()
                ],
            )?;
            Ok(())
        })?;
        tracing::info!(
            actor = %entry.actor,
            subject = %entry.subject,
            action = %entry.action,
            "Audit entry logged"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
