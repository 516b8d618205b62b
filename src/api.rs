use std::sync::Arc;

use url::Url;

use crate::error::Error;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::{Credentials, RefreshRequest, TokenPair, UserId, UserProfile};

/// Default API base URL used by the development backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Location of the FCT API and of its auth endpoints.
///
/// ```rust,ignore
/// use fct_auth::ApiConfig;
///
/// let config = ApiConfig::new("https://api.example.com/api/v1".parse()?)
///     .with_login_path("/auth/login");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiConfig {
    pub(crate) base_url: Url,
    pub(crate) login_path: String,
    pub(crate) refresh_path: String,
    pub(crate) user_path: String,
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            login_path: "/login".into(),
            refresh_path: "/refresh".into(),
            user_path: "/user".into(),
        }
    }

    /// Override the credential exchange endpoint (default `/login`).
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Override the token refresh endpoint (default `/refresh`).
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Override the user collection path (default `/user`, profiles at `/user/{id}`).
    #[must_use]
    pub fn with_user_path(mut self, path: impl Into<String>) -> Self {
        self.user_path = path.into();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Path of a single user's profile.
    #[must_use]
    pub fn user_profile_path(&self, id: UserId) -> String {
        format!("{}/{id}", self.user_path.trim_end_matches('/'))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.parse().expect("valid default URL"))
    }
}

/// Raw calls to the auth and profile endpoints.
///
/// No session state lives here; `SessionManager` decides what to do with
/// the results.
pub struct AuthApi<T> {
    config: ApiConfig,
    transport: Arc<T>,
}

impl<T> Clone for AuthApi<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> AuthApi<T> {
    #[must_use]
    pub fn new(config: ApiConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] when the endpoint rejects the credentials,
    /// or a transport/decode error otherwise.
    pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair, Error> {
        let request = ApiRequest::post(self.config.login_path.as_str()).json(credentials)?;
        let response = self.transport.send(&request, None).await?;
        response.error_for_status()?.json()
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] when the refresh token is rejected,
    /// or a transport/decode error otherwise.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let request = ApiRequest::post(self.config.refresh_path.as_str())
            .json(&RefreshRequest { refresh_token })?;
        let response = self.transport.send(&request, None).await?;
        response.error_for_status()?.json()
    }

    /// Fetch a profile with an explicit bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for non-2xx responses, or a transport/decode error.
    pub async fn get_user(&self, id: UserId, bearer: &str) -> Result<UserProfile, Error> {
        let response = self
            .transport
            .send(&self.user_request(id), Some(bearer))
            .await?;
        response.error_for_status()?.json()
    }

    pub(crate) fn user_request(&self, id: UserId) -> ApiRequest {
        ApiRequest::get(self.config.user_profile_path(id))
    }

    pub(crate) async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, Error> {
        self.transport.send(request, bearer).await
    }
}
