// Credential persistence
// Durable backstop for the credential pair plus the audit log

pub mod env_file;
#[cfg(test)]
pub mod memory;
pub mod sqlite;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::auth::CredentialPair;

pub use env_file::EnvFileStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing service cannot be reached or opened
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("credential store query failed: {0}")]
    Query(String),

    #[error("credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

/// User actions recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Invite,
    Decline,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Invite => "invite",
            AuditAction::Decline => "decline",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invite" => Ok(AuditAction::Invite),
            "decline" => Ok(AuditAction::Decline),
            other => Err(format!("unknown audit action: {}", other)),
        }
    }
}

/// One append-only audit row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// Slack user who acted
    pub actor: String,
    /// MC number acted upon
    pub subject: String,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(actor: impl Into<String>, subject: impl Into<String>, action: AuditAction) -> Self {
        Self {
            actor: actor.into(),
            subject: subject.into(),
            action,
            timestamp: Utc::now(),
        }
    }
}

/// Durable storage for the singleton credential row and the audit log
///
/// Implementations are synchronous; async callers go through [`run_blocking`].
/// `save` must be an atomic upsert so overlapping writers end last-write-wins.
pub trait CredentialStore: Send + Sync {
    /// Idempotently create whatever schema or file the store needs
    fn initialize(&self) -> Result<(), StoreError>;

    /// The stored pair, or `None` if nothing was ever saved
    fn load(&self) -> Result<Option<CredentialPair>, StoreError>;

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError>;

    fn record_audit(&self, entry: &AuditEntry) -> Result<(), StoreError>;

    /// Short name for logs
    fn describe(&self) -> String;
}

/// Run a store operation on the blocking pool
pub async fn run_blocking<T, F>(store: &Arc<dyn CredentialStore>, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn CredentialStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_action_round_trip_names() {
        assert_eq!(AuditAction::Invite.to_string(), "invite");
        assert_eq!("decline".parse::<AuditAction>(), Ok(AuditAction::Decline));
        assert!("approve".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_store_error_messages() {
        let err = StoreError::Unavailable("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "credential store unavailable: connection refused"
        );
        assert_eq!(StoreError::Poisoned.to_string(), "credential store lock poisoned");
    }

    #[tokio::test]
    async fn test_run_blocking_passes_result_through() {
        let store: Arc<dyn CredentialStore> = Arc::new(memory::MemoryStore::new());
        let loaded = run_blocking(&store, |s| s.load()).await.unwrap();
        assert!(loaded.is_none());
    }
}
