// Dotenv-file credential store
// Rewrites BEARER_TOKEN / REFRESH_TOKEN in place, keeping every other line

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use super::{AuditEntry, CredentialStore, StoreError};
use crate::auth::CredentialPair;

const BEARER_KEY: &str = "BEARER_TOKEN";
const REFRESH_KEY: &str = "REFRESH_TOKEN";
const UPDATED_KEY: &str = "CREDENTIALS_UPDATED_AT";

/// Credential pair kept in a dotenv file, audit rows in a JSON-lines sidecar
pub struct EnvFileStore {
    path: PathBuf,
    audit_path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl EnvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut audit_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ".env".into());
        audit_name.push(".audit.jsonl");
        let audit_path = path.with_file_name(audit_name);

        Self {
            path,
            audit_path,
            write_lock: Mutex::new(()),
        }
    }

    fn read_values(&self) -> Result<Vec<(String, String)>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let iter = dotenvy::from_path_iter(&self.path).map_err(|e| {
            StoreError::Query(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        iter.map(|item| item.map_err(|e| StoreError::Query(e.to_string())))
            .collect()
    }

    /// Replace or append `KEY=value` lines, leaving comments and other keys intact
    fn rewrite(existing: &str, updates: &[(&str, String)]) -> String {
        let mut pending: Vec<&(&str, String)> = updates.iter().collect();
        let mut lines: Vec<String> = Vec::new();

        for line in existing.lines() {
            let key = line
                .trim_start()
                .trim_start_matches("export ")
                .split('=')
                .next()
                .unwrap_or_default()
                .trim();
            if let Some(pos) = pending.iter().position(|(k, _)| *k == key) {
                let (k, v) = pending.remove(pos);
                lines.push(format!("{}={}", k, quote(v)));
            } else {
                lines.push(line.to_string());
            }
        }

        for (k, v) in pending {
            lines.push(format!("{}={}", k, quote(v)));
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Single-quote a value so dotenv parsing returns it byte for byte.
///
/// Single quotes disable `$` substitution, `#` comments and backslash escapes.
/// An embedded `'` closes the quote, is written escaped, and reopens it.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

impl CredentialStore for EnvFileStore {
    fn initialize(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                StoreError::Unavailable(format!("cannot open {}: {}", self.path.display(), e))
            })?;
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
        let values = self.read_values()?;
        let lookup = |key: &str| {
            values
                .iter()
                .find(|(k, _)| k == key)
                .filter(|(_, v)| !v.trim().is_empty())
                .map(|(_, v)| v.clone())
        };

        // Seed values from the operator are not a stored pair until we stamp them
        let (Some(bearer_token), Some(refresh_token), Some(updated_at)) =
            (lookup(BEARER_KEY), lookup(REFRESH_KEY), lookup(UPDATED_KEY))
        else {
            return Ok(None);
        };

        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Query(format!("invalid {}: {}", UPDATED_KEY, e)))?;

        Ok(Some(CredentialPair {
            bearer_token,
            refresh_token,
            updated_at,
        }))
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let content = Self::rewrite(
            &existing,
            &[
                (BEARER_KEY, pair.bearer_token.clone()),
                (REFRESH_KEY, pair.refresh_token.clone()),
                (UPDATED_KEY, pair.updated_at.to_rfc3339()),
            ],
        );

        // Write-then-rename so readers never see a truncated file
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ".env".into());
        tmp_name.push(format!(".tmp-{}", std::process::id()));
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::info!(".env file updated successfully: {}", self.path.display());
        Ok(())
    }

    fn record_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        let line = serde_json::to_string(entry)
            .map_err(|e| StoreError::Query(format!("cannot encode audit entry: {}", e)))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_path)?;
        writeln!(file, "{}", line)?;

        tracing::info!(
            actor = %entry.actor,
            subject = %entry.subject,
            action = %entry.action,
            "Audit entry logged"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("env-file:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AuditAction;

    #[test]
    fn test_rewrite_preserves_other_lines() {
        let existing = "# comment\nSLACK_SIGNING_SECRET=abc\nBEARER_TOKEN=old\n";
        let out = EnvFileStore::rewrite(
            existing,
            &[
                (BEARER_KEY, "new".to_string()),
                (REFRESH_KEY, "r".to_string()),
            ],
        );
        assert_eq!(
            out,
            "# comment\nSLACK_SIGNING_SECRET=abc\nBEARER_TOKEN='new'\nREFRESH_TOKEN='r'\n"
        );
    }

    #[test]
    fn test_seed_only_file_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "BEARER_TOKEN=A1\nREFRESH_TOKEN=R1\n").unwrap();

        let store = EnvFileStore::new(&path);
        store.initialize().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "PORT=3001\nBEARER_TOKEN=A1\nREFRESH_TOKEN=R1\n").unwrap();

        let store = EnvFileStore::new(&path);
        store.initialize().unwrap();
        let pair = CredentialPair::new("A2", "R2");
        store.save(&pair).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.same_tokens(&pair));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("PORT=3001\n"));
        assert!(content.contains("BEARER_TOKEN='A2'"));
        assert!(!content.contains("A1"));
    }

    #[test]
    fn test_tokens_with_dotenv_metacharacters_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let store = EnvFileStore::new(&path);
        store.initialize().unwrap();

        for token in [
            "abc$HOME",
            "abc${PATH}def",
            "abc #frag",
            "abc#frag",
            "abc\\def",
            "a'b\"c",
            "'leading and trailing'",
            "  padded=value  ",
        ] {
            let pair = CredentialPair::new(token, format!("refresh-{}", token));
            store.save(&pair).unwrap();

            let loaded = store.load().unwrap().unwrap();
            assert_eq!(loaded.bearer_token, token);
            assert_eq!(loaded.refresh_token, format!("refresh-{}", token));
        }
    }

    #[test]
    fn test_audit_rows_go_to_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = EnvFileStore::new(dir.path().join(".env"));
        store
            .record_audit(&AuditEntry::new("U1", "123456", AuditAction::Invite))
            .unwrap();
        store
            .record_audit(&AuditEntry::new("U2", "654321", AuditAction::Decline))
            .unwrap();

        assert_eq!(store.audit_path, dir.path().join(".env.audit.jsonl"));
        let content = std::fs::read_to_string(&store.audit_path).unwrap();
        let rows: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["action"], "invite");
        assert_eq!(rows[1]["actor"], "U2");
    }
}
