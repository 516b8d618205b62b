use std::sync::Arc;

use parking_lot::RwLock;

use super::config::PipelineSettings;
use super::error::LoginError;
use super::notify::{Notifier, TracingNotifier};
use super::pipeline::{AuthenticatedClient, Rejection};
use super::state::{Session, SessionState, Shared};
use super::store::{Loaded, PersistedTokens, StoreKey, TokenStore};
use crate::api::AuthApi;
use crate::transport::Transport;
use crate::types::{Credentials, UserProfile};

/// Owns the authenticated-session lifecycle.
///
/// Create one per application at the composition root, wrap it in an
/// [`Arc`], and hand [`AuthenticatedClient`]s to the code that issues API
/// calls:
///
/// ```rust,ignore
/// let manager = Arc::new(SessionConfig::from_env()?.build());
/// let user = manager.restore_session().await;
/// let client = manager.client();
/// let courses: Vec<Course> = client.get_json("/course").await?;
/// ```
pub struct SessionManager<T> {
    pub(super) api: AuthApi<T>,
    pub(super) store: Arc<dyn TokenStore>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) settings: PipelineSettings,
    pub(super) shared: RwLock<Shared>,
    /// Serializes refreshes so concurrent 401s share one refresh call.
    pub(super) refresh_flight: tokio::sync::Mutex<()>,
}

impl<T: Transport> SessionManager<T> {
    #[must_use]
    pub fn new(api: AuthApi<T>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            store,
            notifier: Arc::new(TracingNotifier),
            settings: PipelineSettings::defaults(),
            shared: RwLock::new(Shared::new()),
            refresh_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Where failed-request notices go (default: the `tracing` log).
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Server messages starting with one of these prefixes are never notified
    /// (default: `["File"]`).
    #[must_use]
    pub fn with_silent_error_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.settings.silent_error_prefixes = prefixes;
        self
    }

    /// Handle for issuing authenticated API calls.
    #[must_use]
    pub fn client(self: &Arc<Self>) -> AuthenticatedClient<T> {
        AuthenticatedClient::new(Arc::clone(self))
    }

    #[must_use]
    pub fn api(&self) -> &AuthApi<T> {
        &self.api
    }

    // ── Login ──────────────────────────────────────────────────────────

    /// Exchange credentials for a session.
    ///
    /// The profile is fetched with the new access token attached explicitly,
    /// before the token becomes current for the rest of the client.
    ///
    /// # Errors
    ///
    /// [`LoginError::InvalidRequest`] for empty fields or HTTP 400,
    /// [`LoginError::CredentialError`] for HTTP 401,
    /// [`LoginError::UnknownError`] for everything else.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, LoginError> {
        if !credentials.is_complete() {
            return Err(LoginError::InvalidRequest);
        }

        let pair = self.api.login(credentials).await.map_err(|e| {
            tracing::warn!(username = %credentials.username, error = %e, "Credential exchange failed");
            LoginError::from(e)
        })?;

        let user = self
            .api
            .get_user(pair.user_id, &pair.access_token)
            .await
            .map_err(|e| {
                tracing::warn!(user_id = %pair.user_id, error = %e, "Profile fetch after login failed");
                LoginError::from(e)
            })?;

        let role = pair.role.unwrap_or(user.role);
        let tokens = PersistedTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user_id: pair.user_id,
        };

        if let Err(e) = tokens.save(&*self.store) {
            tracing::error!(error = %e, "Persisting session tokens failed");
            if let Err(e) = PersistedTokens::clear(&*self.store) {
                tracing::warn!(error = %e, "Clearing partial token record failed");
            }
            return Err(LoginError::UnknownError);
        }

        let mut session = Session::from_tokens(tokens);
        session.set_user(user);
        {
            let mut shared = self.shared.write();
            shared.session = Some(session.clone());
            shared.phase = SessionState::Authenticated;
            shared.generation += 1;
        }

        tracing::info!(user_id = %session.user_id(), role = ?role, "Login successful");
        Ok(session)
    }

    // ── Restore ────────────────────────────────────────────────────────

    /// Rehydrate the session from persisted tokens.
    ///
    /// Returns `None` without any network call when nothing is persisted.
    /// The profile request goes through the authenticated pipeline, so an
    /// expired access token gets one refresh attempt. Failures raise no
    /// notice and leave the client fully logged out.
    pub async fn restore_session(&self) -> Option<UserProfile> {
        let tokens = match PersistedTokens::load(&*self.store) {
            Ok(Loaded::Complete(tokens)) => tokens,
            Ok(Loaded::Empty) => return None,
            Ok(Loaded::Partial) => {
                tracing::warn!("Discarding incomplete persisted session");
                self.logout();
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reading persisted session failed");
                return None;
            }
        };

        let user_id = tokens.user_id;
        let generation = {
            let mut shared = self.shared.write();
            shared.session = Some(Session::from_tokens(tokens));
            shared.phase = SessionState::Restoring;
            shared.generation
        };

        let result = self
            .execute_quietly(self.api.user_request(user_id))
            .await
            .and_then(|response| response.json::<UserProfile>());

        match result {
            Ok(user) => {
                let mut shared = self.shared.write();
                if shared.generation != generation {
                    tracing::debug!(user_id = %user_id, "Session ended while restoring");
                    return None;
                }
                if let Some(session) = shared.session.as_mut() {
                    session.set_user(user.clone());
                }
                shared.phase = SessionState::Authenticated;
                drop(shared);

                tracing::info!(user_id = %user_id, "Session restored");
                Some(user)
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Session restore failed");
                if self.generation() == generation {
                    self.logout();
                }
                None
            }
        }
    }

    // ── Logout ─────────────────────────────────────────────────────────

    /// Forget the session in memory and on disk. Safe to call repeatedly.
    pub fn logout(&self) {
        let had_session = {
            let mut shared = self.shared.write();
            let had_session = shared.session.is_some();
            shared.clear();
            had_session
        };

        if let Err(e) = PersistedTokens::clear(&*self.store) {
            tracing::warn!(error = %e, "Clearing persisted session failed");
        }
        if had_session {
            tracing::info!("Logged out");
        }
    }

    // ── Refresh ────────────────────────────────────────────────────────

    /// Exchange the persisted refresh token for a new token pair.
    ///
    /// Returns `false` without a network call when no refresh token is
    /// persisted. A rejected refresh logs the client out.
    pub async fn refresh_token(&self) -> bool {
        self.refresh_replacing(None).await
    }

    /// Refresh on behalf of a request that came back 401.
    ///
    /// Callers queued behind an in-flight refresh reuse its result when the
    /// current token has already moved on. A request from an ended session
    /// never gets a token again, whoever holds the session now.
    pub(super) async fn refresh_replacing(&self, rejected: Option<Rejection<'_>>) -> bool {
        let _flight = self.refresh_flight.lock().await;

        if let Some(rejected) = &rejected {
            let shared = self.shared.read();
            if shared.generation != rejected.generation {
                tracing::debug!("Session changed since the request was rejected");
                return false;
            }
            let already_rotated = rejected.token.is_some_and(|old| {
                shared.access_token().is_some_and(|current| current != old)
            });
            if already_rotated {
                tracing::debug!("Access token already refreshed by a concurrent request");
                return true;
            }
        }

        let refresh_token = match self.store.get(StoreKey::RefreshToken) {
            Ok(Some(token)) => token,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "Reading refresh token failed");
                return false;
            }
        };

        let (generation, resume_phase) = {
            let mut shared = self.shared.write();
            if rejected
                .as_ref()
                .is_some_and(|r| r.generation != shared.generation)
            {
                return false;
            }
            let resume_phase = match shared.phase {
                SessionState::Restoring => SessionState::Restoring,
                _ => SessionState::Authenticated,
            };
            shared.phase = SessionState::RefreshingToken;
            (shared.generation, resume_phase)
        };

        let pair = match self.api.refresh(&refresh_token).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                if self.generation() == generation {
                    self.logout();
                }
                return false;
            }
        };

        let mut shared = self.shared.write();
        if shared.generation != generation {
            tracing::debug!("Discarding refresh result from an ended session");
            return false;
        }

        let user_id = shared
            .session
            .as_ref()
            .map_or(pair.user_id, Session::user_id);
        let tokens = PersistedTokens {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            user_id,
        };
        if let Err(e) = tokens.save(&*self.store) {
            drop(shared);
            tracing::warn!(error = %e, "Persisting refreshed tokens failed");
            self.logout();
            return false;
        }

        match shared.session.as_mut() {
            Some(session) => session.rotate(&pair),
            None => shared.session = Some(Session::from_tokens(tokens)),
        }
        shared.phase = resume_phase;
        drop(shared);

        tracing::debug!(user_id = %user_id, "Access token refreshed");
        true
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// True while a session is held in memory or an access token is persisted.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        if self.shared.read().session.is_some() {
            return true;
        }
        matches!(self.store.get(StoreKey::AccessToken), Ok(Some(_)))
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.read().phase
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.shared.read().session.clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.shared
            .read()
            .session
            .as_ref()
            .and_then(|s| s.user().cloned())
    }

    /// Replace the cached profile, e.g. after the user edited it.
    ///
    /// Returns `false` (and changes nothing) without a session, or when the
    /// profile belongs to a different user.
    pub fn update_user(&self, user: UserProfile) -> bool {
        let mut shared = self.shared.write();
        match shared.session.as_mut() {
            Some(session) if session.user_id() == user.id => {
                session.set_user(user);
                true
            }
            _ => false,
        }
    }

    pub(super) fn generation(&self) -> u64 {
        self.shared.read().generation
    }

    /// Current token and the generation it belongs to, read together.
    pub(super) fn credentials(&self) -> (Option<String>, u64) {
        let shared = self.shared.read();
        (shared.access_token().map(str::to_owned), shared.generation)
    }
}
