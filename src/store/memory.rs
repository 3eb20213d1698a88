// In-memory store with failure injection, for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{AuditEntry, CredentialStore, StoreError};
use crate::auth::CredentialPair;

#[derive(Default)]
pub struct MemoryStore {
    pair: Mutex<Option<CredentialPair>>,
    audit: Mutex<Vec<AuditEntry>>,
    fail_initialize: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        let store = Self::default();
        *store.pair.lock().unwrap() = Some(pair);
        store
    }

    pub fn unreachable() -> Self {
        let store = Self::default();
        store.fail_initialize.store(true, Ordering::SeqCst);
        store
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<CredentialPair> {
        self.pair.lock().unwrap().clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().unwrap().clone()
    }
}

impl CredentialStore for MemoryStore {
    fn initialize(&self) -> Result<(), StoreError> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn load(&self) -> Result<Option<CredentialPair>, StoreError> {
        Ok(self.stored())
    }

    fn save(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Query("disk I/O error".to_string()));
        }
        *self.pair.lock().map_err(|_| StoreError::Poisoned)? = Some(pair.clone());
        Ok(())
    }

    fn record_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.audit
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .push(entry.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
