#![doc = include_str!("../README.md")]

pub mod api;
pub mod error;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenient access
pub use api::{ApiConfig, AuthApi, DEFAULT_BASE_URL};
pub use error::{Error, ErrorBody, GENERIC_ERROR_MESSAGE};
pub use session::{
    AuthenticatedClient, FileTokenStore, LoginError, MemoryTokenStore, Notice, Notifier,
    PersistedTokens, Session, SessionConfig, SessionManager, SessionState, SilentNotifier,
    StoreKey, TokenStore, TracingNotifier,
};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
pub use types::{Credentials, Role, TokenPair, UserId, UserProfile};
