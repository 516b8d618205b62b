//! In-process stand-in for the FCT API, used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{Value as JsonValue, json};

use super::manager::SessionManager;
use super::notify::{Notice, Notifier};
use super::store::MemoryTokenStore;
use crate::api::{ApiConfig, AuthApi};
use crate::error::Error;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::{UserId, UserProfile};

pub(crate) fn manager_with(
    backend: &Arc<FakeBackend>,
    store: &Arc<MemoryTokenStore>,
) -> Arc<SessionManager<FakeBackend>> {
    Arc::new(SessionManager::new(
        AuthApi::new(ApiConfig::default(), Arc::clone(backend)),
        store.clone(),
    ))
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

struct Grant {
    access_token: String,
    refresh_token: String,
    user_id: UserId,
}

#[derive(Default)]
struct BackendState {
    accounts: HashMap<String, (String, UserId)>,
    profiles: HashMap<UserId, UserProfile>,
    valid_access: HashSet<String>,
    grants: HashMap<String, Grant>,
    forced: HashMap<String, (u16, String)>,
    calls: Vec<(String, Option<String>)>,
    refresh_delay: Option<Duration>,
    logins: u32,
    down: bool,
}

/// Fake API speaking the server's wire format.
///
/// Logins issue `AT{n}`/`RT{n}` (the first login gets `AT1`/`RT1`).
/// `/data` answers `{"ok":true}` and `/echo` returns the request body to
/// holders of a valid access token.
#[derive(Default)]
pub(crate) struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_account(&self, username: &str, password: &str, profile: UserProfile) {
        let mut state = self.state.lock();
        state
            .accounts
            .insert(username.to_string(), (password.to_string(), profile.id));
        state.profiles.insert(profile.id, profile);
    }

    /// Make `refresh_token` exchangeable for the given pair.
    pub(crate) fn grant_refresh(
        &self,
        refresh_token: &str,
        access_token: &str,
        next_refresh_token: &str,
        user_id: UserId,
    ) {
        self.state.lock().grants.insert(
            refresh_token.to_string(),
            Grant {
                access_token: access_token.to_string(),
                refresh_token: next_refresh_token.to_string(),
                user_id,
            },
        );
    }

    pub(crate) fn expire(&self, access_token: &str) {
        self.state.lock().valid_access.remove(access_token);
    }

    /// Answer every request to `path` with a fixed status and body.
    pub(crate) fn force_response(&self, path: &str, status: u16, body: &str) {
        self.state
            .lock()
            .forced
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub(crate) fn set_refresh_delay(&self, delay: Duration) {
        self.state.lock().refresh_delay = Some(delay);
    }

    pub(crate) fn set_down(&self, down: bool) {
        self.state.lock().down = down;
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    pub(crate) fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.state.lock().calls.len()
    }

    fn respond(&self, request: &ApiRequest, bearer: Option<&str>) -> ApiResponse {
        let mut state = self.state.lock();

        if let Some((status, body)) = state.forced.get(&request.path) {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return ApiResponse::new(status, body.clone());
        }

        let authorized = bearer.is_some_and(|token| state.valid_access.contains(token));
        let body = request.body.clone().unwrap_or(JsonValue::Null);

        match (request.method.as_str(), request.path.as_str()) {
            ("POST", "/login") => {
                let username = body["username"].as_str().unwrap_or_default();
                let password = body["password"].as_str().unwrap_or_default();
                if username.is_empty() || password.is_empty() {
                    return json_response(400, json!({"message": "username and password are required"}));
                }
                let Some(user_id) = state
                    .accounts
                    .get(username)
                    .filter(|(expected, _)| expected == password)
                    .map(|(_, id)| *id)
                else {
                    return json_response(401, json!({"message": "Bad credentials"}));
                };
                state.logins += 1;
                let access_token = format!("AT{}", state.logins);
                let refresh_token = format!("RT{}", state.logins);
                state.valid_access.insert(access_token.clone());
                json_response(
                    200,
                    json!({"jwt": access_token, "refreshToken": refresh_token, "userId": user_id, "role": "USER"}),
                )
            }
            ("POST", "/refresh") => {
                let presented = body["refreshToken"].as_str().unwrap_or_default();
                let Some(grant) = state.grants.remove(presented) else {
                    return json_response(401, json!({"message": "Invalid refresh token"}));
                };
                state.valid_access.insert(grant.access_token.clone());
                json_response(
                    200,
                    json!({"jwt": grant.access_token, "refreshToken": grant.refresh_token, "userId": grant.user_id}),
                )
            }
            ("GET", path) if path.starts_with("/user/") => {
                if !authorized {
                    return json_response(401, json!({"message": "Token expired"}));
                }
                let profile = path["/user/".len()..]
                    .parse::<UserId>()
                    .ok()
                    .and_then(|id| state.profiles.get(&id));
                match profile {
                    Some(profile) => json_response(200, json!(profile)),
                    None => json_response(404, json!({"message": "User not found"})),
                }
            }
            (_, "/data") | (_, "/echo") if !authorized => {
                json_response(401, json!({"message": "Token expired"}))
            }
            (_, "/data") => json_response(200, json!({"ok": true})),
            (_, "/echo") => json_response(200, body),
            _ => json_response(404, json!({"message": "Not found"})),
        }
    }
}

fn json_response(status: u16, body: JsonValue) -> ApiResponse {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    ApiResponse::new(status, body.to_string())
}

impl Transport for FakeBackend {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, Error> {
        let delay = {
            let mut state = self.state.lock();
            if state.down {
                return Err(Error::Transport("connection refused".into()));
            }
            state
                .calls
                .push((request.path.clone(), bearer.map(str::to_owned)));
            match request.path.as_str() {
                "/refresh" => state.refresh_delay,
                _ => None,
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.respond(request, bearer))
    }
}
