use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use super::manager::SessionManager;
use super::notify::TracingNotifier;
use super::store::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::api::{ApiConfig, AuthApi};
use crate::error::Error;
use crate::transport::ReqwestTransport;

/// Request pipeline settings shared by config and runtime.
#[derive(Debug, Clone)]
pub(crate) struct PipelineSettings {
    /// Server messages starting with any of these are not notified.
    pub(crate) silent_error_prefixes: Vec<String>,
}

impl PipelineSettings {
    pub(crate) fn defaults() -> Self {
        Self {
            // Upload forms report file errors inline.
            silent_error_prefixes: vec!["File".into()],
        }
    }

    pub(crate) fn is_silenced(&self, message: &str) -> bool {
        self.silent_error_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && message.starts_with(prefix.as_str()))
    }
}

/// Composition-root configuration for a [`SessionManager`].
///
/// Use [`from_env()`](SessionConfig::from_env) for convention-based setup,
/// or [`new()`](SessionConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub(super) api: ApiConfig,
    pub(super) token_file: Option<PathBuf>,
    pub(super) settings: PipelineSettings,
}

impl SessionConfig {
    /// Tokens are kept in memory unless a token file is configured.
    #[must_use]
    pub fn new(api: ApiConfig) -> Self {
        Self {
            api,
            token_file: None,
            settings: PipelineSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `FCT_API_URL`: API base URL (default `http://localhost:8080/api/v1`)
    /// - `FCT_LOGIN_PATH`, `FCT_REFRESH_PATH`, `FCT_USER_PATH`: endpoint overrides
    /// - `FCT_TOKEN_FILE`: persist tokens to this JSON file
    /// - `FCT_SILENT_ERROR_PREFIXES`: comma-separated message prefixes never notified
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `FCT_API_URL` is not a valid URL.
    pub fn from_env() -> Result<Self, Error> {
        let mut api = match std::env::var("FCT_API_URL") {
            Ok(url_str) => {
                let url: Url = url_str
                    .parse()
                    .map_err(|e| Error::Config(format!("FCT_API_URL: {e}")))?;
                ApiConfig::new(url)
            }
            Err(_) => ApiConfig::default(),
        };

        if let Ok(path) = std::env::var("FCT_LOGIN_PATH") {
            api = api.with_login_path(path);
        }
        if let Ok(path) = std::env::var("FCT_REFRESH_PATH") {
            api = api.with_refresh_path(path);
        }
        if let Ok(path) = std::env::var("FCT_USER_PATH") {
            api = api.with_user_path(path);
        }

        let mut config = Self::new(api);
        if let Ok(path) = std::env::var("FCT_TOKEN_FILE") {
            config = config.with_token_file(path);
        }
        if let Ok(prefixes) = std::env::var("FCT_SILENT_ERROR_PREFIXES") {
            config = config.with_silent_error_prefixes(
                prefixes
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_silent_error_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.settings.silent_error_prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    #[must_use]
    pub fn token_file(&self) -> Option<&std::path::Path> {
        self.token_file.as_deref()
    }

    /// Build a manager that talks to the API over `reqwest` and logs notices.
    #[must_use]
    pub fn build(self) -> SessionManager<ReqwestTransport> {
        let transport = Arc::new(ReqwestTransport::new(self.api.base_url()));
        let store: Arc<dyn TokenStore> = match self.token_file {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => Arc::new(MemoryTokenStore::new()),
        };

        SessionManager::new(AuthApi::new(self.api, transport), store)
            .with_notifier(Arc::new(TracingNotifier))
            .with_silent_error_prefixes(self.settings.silent_error_prefixes)
    }
}
