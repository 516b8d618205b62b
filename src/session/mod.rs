//! Authenticated-session lifecycle for the FCT API.
//!
//! A [`SessionManager`] owns the session: it logs users in, restores a
//! session from persisted tokens at startup, logs out, and refreshes the
//! access token when a request comes back 401. Application code issues
//! requests through an [`AuthenticatedClient`], which attaches the current
//! token and retries once after a refresh.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fct_auth::{Credentials, SessionConfig};
//!
//! // 1. Configure from environment
//! let manager = Arc::new(SessionConfig::from_env()?.build());
//!
//! // 2. Pick up where the last run left off
//! if manager.restore_session().await.is_none() {
//!     manager.login(&Credentials::new("alice", "Secret123")).await?;
//! }
//!
//! // 3. Issue API calls; expired tokens are refreshed transparently
//! let client = manager.client();
//! let invoices: serde_json::Value = client.get_json("/invoice").await?;
//! ```

mod config;
mod error;
mod manager;
mod notify;
mod pipeline;
mod state;
mod store;
#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use error::LoginError;
pub use manager::SessionManager;
pub use notify::{Notice, Notifier, SilentNotifier, TracingNotifier};
pub use pipeline::AuthenticatedClient;
pub use state::{Session, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, PersistedTokens, StoreKey, TokenStore};
