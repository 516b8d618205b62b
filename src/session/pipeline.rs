use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::manager::SessionManager;
use super::notify::Notice;
use crate::error::{Error, ErrorBody, GENERIC_ERROR_MESSAGE};
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::{UserId, UserProfile};

/// API handle that keeps requests authenticated.
///
/// Every request carries the session's current access token. A 401 triggers
/// one token refresh and one retry; the caller only sees the final outcome.
/// Other failures are reported to the manager's notifier and returned.
pub struct AuthenticatedClient<T> {
    manager: Arc<SessionManager<T>>,
}

// Manual Clone: avoid derive adding a `T: Clone` bound.
impl<T> Clone for AuthenticatedClient<T> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<T: Transport> AuthenticatedClient<T> {
    pub(super) fn new(manager: Arc<SessionManager<T>>) -> Self {
        Self { manager }
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<SessionManager<T>> {
        &self.manager
    }

    /// Send a request through the refresh-and-retry pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for non-2xx responses (a 401 only after the
    /// refresh attempt failed or the retry was rejected too), or the
    /// transport error when no response was received.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.manager.execute(request).await
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); also [`Error::Decode`] for unexpected bodies.
    pub async fn get_json<R: DeserializeOwned>(&self, path: impl Into<String>) -> Result<R, Error> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// Send a JSON body and decode a JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); also [`Error::Decode`] for unexpected bodies.
    pub async fn send_json<B, R>(
        &self,
        method: Method,
        path: impl Into<String>,
        body: &B,
    ) -> Result<R, Error>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = ApiRequest::new(method, path).json(body)?;
        self.send(request).await?.json()
    }

    /// Fetch a user profile with the current session's token.
    ///
    /// # Errors
    ///
    /// See [`get_json`](Self::get_json).
    pub async fn get_user(&self, id: UserId) -> Result<UserProfile, Error> {
        let request = self.manager.api.user_request(id);
        self.send(request).await?.json()
    }
}

/// A request that came back 401, with its retry state.
struct PendingRequest {
    request: ApiRequest,
    retried: bool,
    /// Session generation the request was first sent under.
    generation: u64,
}

/// What a 401 was answered to: the token sent and its session generation.
pub(super) struct Rejection<'a> {
    pub(super) token: Option<&'a str>,
    pub(super) generation: u64,
}

impl<T: Transport> SessionManager<T> {
    pub(super) async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.dispatch(request, true).await
    }

    /// Same pipeline, but failures raise no notice.
    pub(super) async fn execute_quietly(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.dispatch(request, false).await
    }

    async fn dispatch(&self, request: ApiRequest, notify: bool) -> Result<ApiResponse, Error> {
        let (mut token, generation) = self.credentials();
        let mut pending = PendingRequest {
            request,
            retried: false,
            generation,
        };

        loop {
            let response = self.api.send(&pending.request, token.as_deref()).await?;

            if response.is_success() {
                return Ok(response);
            }

            if response.status != StatusCode::UNAUTHORIZED {
                let error = response.into_error();
                if notify {
                    self.notify_failure(&error);
                }
                return Err(error);
            }

            if pending.retried {
                tracing::debug!(path = %pending.request.path, "Still unauthorized after refresh");
                return Err(response.into_error());
            }
            pending.retried = true;

            let rejection = Rejection {
                token: token.as_deref(),
                generation: pending.generation,
            };
            if !self.refresh_replacing(Some(rejection)).await {
                return Err(response.into_error());
            }

            // A retry must carry the token issued by the refresh, and only
            // while the session that sent the request is still current.
            let (next, current) = self.credentials();
            if current != pending.generation {
                tracing::debug!(path = %pending.request.path, "Session ended before retry");
                return Err(response.into_error());
            }
            token = next;
            tracing::debug!(path = %pending.request.path, "Retrying with refreshed token");
        }
    }

    fn notify_failure(&self, error: &Error) {
        let Error::Api { status, body } = error else {
            return;
        };
        let message = match body {
            ErrorBody::Message { message } => message.as_str(),
            // Field errors belong to the form that sent them.
            ErrorBody::Validation { .. } => return,
            ErrorBody::Unrecognized(_) => GENERIC_ERROR_MESSAGE,
        };
        if self.settings.is_silenced(message) {
            return;
        }
        self.notifier.notify(&Notice {
            status: *status,
            message: message.to_string(),
        });
    }
}
