// Authentication module
// Credential cache, single-flight refresh, and startup loading

mod cache;
mod coordinator;
mod manager;
mod refresh;
mod types;

pub use cache::CredentialCache;
pub use coordinator::RefreshCoordinator;
pub use manager::{AuthManager, AuthSettings};
pub use types::{
    token_prefix, CredentialPair, Persistence, RefreshFailure, RefreshOutcome, RefreshSuccess,
    TokenEndpoint,
};
