// Single-flight token refresh

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use std::sync::{Arc, Mutex, MutexGuard};

use super::cache::CredentialCache;
use super::refresh;
use super::types::{
    CredentialPair, Persistence, RefreshFailure, RefreshOutcome, RefreshSuccess, TokenEndpoint,
};
use crate::store::{self, CredentialStore};

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// `Refreshing` holds the one in-flight exchange every caller subscribes to
enum RefreshState {
    Idle,
    Refreshing(PendingRefresh),
}

/// Runs refresh exchanges, at most one at a time
///
/// Concurrent `refresh()` calls made while an exchange is in flight all
/// resolve to that exchange's outcome. A token endpoint that rotates refresh
/// tokens would otherwise see the second caller present a consumed token.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    endpoint: TokenEndpoint,
    cache: CredentialCache,
    store: Option<Arc<dyn CredentialStore>>,
    state: Mutex<RefreshState>,
}

/// Puts the state back to `Idle` even if the exchange task unwinds
struct IdleOnDrop(Arc<Inner>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        *self.0.lock_state() = RefreshState::Idle;
    }
}

impl RefreshCoordinator {
    pub fn new(
        client: Client,
        endpoint: TokenEndpoint,
        cache: CredentialCache,
        store: Option<Arc<dyn CredentialStore>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                endpoint,
                cache,
                store,
                state: Mutex::new(RefreshState::Idle),
            }),
        }
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.inner.cache
    }

    pub fn durability_enabled(&self) -> bool {
        self.inner.store.is_some()
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock_state(), RefreshState::Refreshing(_))
    }

    /// Refresh the bearer token, or join the refresh already running
    pub async fn refresh(&self) -> RefreshOutcome {
        let pending = {
            let mut state = self.inner.lock_state();
            match &*state {
                RefreshState::Refreshing(pending) => {
                    tracing::debug!("Refresh already in flight, waiting for its outcome");
                    pending.clone()
                }
                RefreshState::Idle => {
                    // Spawned so the exchange finishes even if this caller is dropped.
                    // The task resets the state through IdleOnDrop, which needs this
                    // lock, so it cannot go Idle before we store Refreshing below.
                    let inner = Arc::clone(&self.inner);
                    let task = tokio::spawn(async move {
                        let _idle = IdleOnDrop(Arc::clone(&inner));
                        inner.run_exchange().await
                    });
                    let pending = async move {
                        task.await
                            .unwrap_or_else(|e| Err(RefreshFailure::Aborted(e.to_string())))
                    }
                    .boxed()
                    .shared();
                    *state = RefreshState::Refreshing(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        // The state is a plain enum swap; a poisoned guard is still consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_exchange(&self) -> RefreshOutcome {
        let current = self.cache.get();

        let token_data =
            refresh::exchange_refresh_token(&self.client, &self.endpoint, &current.refresh_token)
                .await?;

        let refresh_token_rotated = token_data.refresh_token.is_some();
        let pair = CredentialPair::new(
            token_data.access_token,
            token_data.refresh_token.unwrap_or(current.refresh_token),
        );

        // Memory first: the new bearer token is usable whatever happens to the store
        self.cache.set(pair.clone());

        let persistence = self.persist(pair).await;

        Ok(RefreshSuccess {
            refresh_token_rotated,
            persistence,
        })
    }

    async fn persist(&self, pair: CredentialPair) -> Persistence {
        let Some(store) = &self.store else {
            tracing::warn!("Durability disabled; refreshed tokens will be lost on restart");
            return Persistence::Disabled;
        };

        match store::run_blocking(store, move |s| s.save(&pair)).await {
            Ok(()) => Persistence::Saved,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    store = %store.describe(),
                    "Failed to persist refreshed tokens; in-memory token remains valid but will be lost on restart"
                );
                Persistence::Failed(e.to_string())
            }
        }
    }
}
