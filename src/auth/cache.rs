// In-memory credential holder

use std::sync::{Arc, RwLock};

use super::types::CredentialPair;

/// Process-wide current credential pair
///
/// Reads never suspend. The whole pair is replaced at once, so a reader can
/// never see a bearer token next to a refresh token from another generation.
#[derive(Clone)]
pub struct CredentialCache {
    current: Arc<RwLock<CredentialPair>>,
}

impl CredentialCache {
    pub fn new(initial: CredentialPair) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// Snapshot of the current pair
    pub fn get(&self) -> CredentialPair {
        // Poisoning cannot leave a half-written pair: set() is a single assignment
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn bearer_token(&self) -> String {
        self.get().bearer_token
    }

    /// Replace the pair atomically
    pub fn set(&self, pair: CredentialPair) {
        match self.current.write() {
            Ok(mut guard) => *guard = pair,
            Err(poisoned) => *poisoned.into_inner() = pair,
        }
    }
}
