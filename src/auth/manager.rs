use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::cache::CredentialCache;
use super::coordinator::RefreshCoordinator;
use super::types::{CredentialPair, RefreshOutcome, TokenEndpoint};
use crate::store::{self, CredentialStore};

/// Settings needed to bring credentials up
#[derive(Clone, Debug)]
pub struct AuthSettings {
    /// Seed pair used on first run or when the store is unreachable
    pub seed_bearer_token: String,
    pub seed_refresh_token: String,
    pub endpoint: TokenEndpoint,
    pub token_timeout: Duration,
}

/// Authentication manager
/// Owns the credential cache and the refresh coordinator for the process
pub struct AuthManager {
    cache: CredentialCache,
    coordinator: RefreshCoordinator,
    /// `None` when running without durability
    store: Option<Arc<dyn CredentialStore>>,
}

impl AuthManager {
    /// Build from an already-known pair, skipping the store lookup
    pub fn new(
        settings: &AuthSettings,
        pair: CredentialPair,
        store: Option<Arc<dyn CredentialStore>>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.token_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let cache = CredentialCache::new(pair);
        let coordinator = RefreshCoordinator::new(
            client,
            settings.endpoint.clone(),
            cache.clone(),
            store.clone(),
        );

        Ok(Self {
            cache,
            coordinator,
            store,
        })
    }

    /// Load credentials at startup
    ///
    /// Stored pair wins over the seed. An empty store is seeded and written
    /// through. An unreachable store is dropped and the process carries on with
    /// the seed pair and durability disabled.
    pub async fn bootstrap(
        settings: &AuthSettings,
        store: Option<Arc<dyn CredentialStore>>,
    ) -> Result<Self> {
        let seed = CredentialPair::new(
            settings.seed_bearer_token.clone(),
            settings.seed_refresh_token.clone(),
        );

        let Some(store) = store else {
            tracing::warn!("No credential store configured; refreshed tokens will be lost on restart");
            return Self::new(settings, seed, None);
        };

        let loaded = match store::run_blocking(&store, |s| {
            s.initialize()?;
            s.load()
        })
        .await
        {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    store = %store.describe(),
                    "Error loading tokens from credential store"
                );
                tracing::warn!(
                    "Falling back to configured tokens; running with durability disabled"
                );
                return Self::new(settings, seed, None);
            }
        };

        let pair = match loaded {
            Some(pair) => {
                tracing::info!(
                    updated_at = %pair.updated_at.to_rfc3339(),
                    "Loaded tokens from {}",
                    store.describe()
                );
                pair
            }
            None => {
                tracing::info!("No tokens in credential store, saving from configuration");
                let to_save = seed.clone();
                if let Err(e) = store::run_blocking(&store, move |s| s.save(&to_save)).await {
                    tracing::error!(error = %e, "Failed to save seed tokens to credential store");
                }
                seed
            }
        };

        Self::new(settings, pair, Some(store))
    }

    /// Current bearer token, no I/O
    pub fn bearer_token(&self) -> String {
        self.cache.bearer_token()
    }

    /// Current pair, no I/O
    pub fn credentials(&self) -> CredentialPair {
        self.cache.get()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.coordinator.refresh().await
    }

    pub fn durability_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Option<&Arc<dyn CredentialStore>> {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::SqliteStore;

    fn settings() -> AuthSettings {
        AuthSettings {
            seed_bearer_token: "seed-bearer".to_string(),
            seed_refresh_token: "seed-refresh".to_string(),
            endpoint: TokenEndpoint::new("http://127.0.0.1:9/token"),
            token_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_prefers_stored_pair() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("A1", "R1")));
        let manager = AuthManager::bootstrap(&settings(), Some(store.clone()))
            .await
            .unwrap();

        assert_eq!(manager.bearer_token(), "A1");
        assert_eq!(manager.credentials().refresh_token, "R1");
        assert!(manager.durability_enabled());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_empty_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn CredentialStore> =
            Arc::new(SqliteStore::new(dir.path().join("credentials.sqlite3")));

        let manager = AuthManager::bootstrap(&settings(), Some(store.clone()))
            .await
            .unwrap();
        assert_eq!(manager.bearer_token(), "seed-bearer");

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.bearer_token, "seed-bearer");
        assert_eq!(loaded.refresh_token, "seed-refresh");
    }

    #[tokio::test]
    async fn test_bootstrap_falls_back_when_store_unreachable() {
        let store = Arc::new(MemoryStore::unreachable());
        let manager = AuthManager::bootstrap(&settings(), Some(store.clone()))
            .await
            .unwrap();

        assert_eq!(manager.bearer_token(), "seed-bearer");
        assert!(!manager.durability_enabled());
        assert!(manager.store().is_none());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_survives_failed_seed_save() {
        let store = Arc::new(MemoryStore::new());
        store.fail_saves(true);

        let manager = AuthManager::bootstrap(&settings(), Some(store.clone()))
            .await
            .unwrap();
        assert_eq!(manager.bearer_token(), "seed-bearer");
        assert!(manager.durability_enabled());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_without_store() {
        let manager = AuthManager::bootstrap(&settings(), None).await.unwrap();
        assert_eq!(manager.credentials().refresh_token, "seed-refresh");
        assert!(!manager.durability_enabled());
    }
}
