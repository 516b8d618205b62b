use crate::session::store::PersistedTokens;
use crate::types::{TokenPair, UserId, UserProfile};

/// Lifecycle phase of a [`SessionManager`](super::SessionManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session.
    Anonymous,
    /// Persisted tokens found at startup; profile fetch in progress.
    Restoring,
    /// Valid session. The profile may not be loaded yet.
    Authenticated,
    /// A 401 triggered a token refresh that has not finished.
    RefreshingToken,
}

/// The authenticated identity bound to this client.
///
/// Both tokens are always present; an unauthenticated client has no
/// `Session` at all.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    refresh_token: String,
    user_id: UserId,
    user: Option<UserProfile>,
}

impl Session {
    pub(crate) fn from_tokens(tokens: PersistedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: tokens.user_id,
            user: None,
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub(crate) fn set_user(&mut self, user: UserProfile) {
        self.user = Some(user);
    }

    /// Replace the token pair in place, keeping user id and profile.
    pub(crate) fn rotate(&mut self, pair: &TokenPair) {
        self.access_token.clone_from(&pair.access_token);
        self.refresh_token.clone_from(&pair.refresh_token);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Mutable state shared by the manager and its clients.
///
/// `generation` increases on every login and logout; work started under an
/// older generation must not write its results back.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) phase: SessionState,
    pub(crate) session: Option<Session>,
    pub(crate) generation: u64,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionState::Anonymous,
            session: None,
            generation: 0,
        }
    }

    pub(crate) fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(Session::access_token)
    }

    pub(crate) fn clear(&mut self) {
        self.session = None;
        self.phase = SessionState::Anonymous;
        self.generation += 1;
    }
}
