use std::future::Future;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::{Error, ErrorBody};

/// Description of an API call, independent of the HTTP client that sends it.
///
/// Paths are relative to the API base URL (e.g. `/user/42`).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `body` cannot be represented as JSON.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Fully buffered API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the body of a successful response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not the expected JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(Into::into)
    }

    /// Returns the response on success, or the classified server error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for any non-2xx status.
    pub fn error_for_status(self) -> Result<Self, Error> {
        if self.is_success() {
            return Ok(self);
        }
        Err(self.into_error())
    }

    /// Converts the response into an [`Error::Api`] regardless of status.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::Api {
            status: self.status.as_u16(),
            body: ErrorBody::parse(&self.body),
        }
    }
}

/// HTTP client used to reach the API.
///
/// `bearer` is attached as `Authorization: Bearer <token>` when present.
/// Implementations must return `Ok` for every response the server produced,
/// whatever its status; `Err` is reserved for requests that got no response.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> impl Future<Output = Result<ApiResponse, Error>> + Send;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new(base_url: &Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or proxies).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, Error> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url_for(&request.path))
            .headers(request.headers.clone());
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        tracing::trace!(method = %request.method, path = %request.path, status = %status, "API response");

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_join_keeps_base_path() {
        let base: Url = "http://localhost:8080/api/v1/".parse().unwrap();
        let transport = ReqwestTransport::new(&base);
        assert_eq!(transport.url_for("/user/42"), "http://localhost:8080/api/v1/user/42");
        assert_eq!(transport.url_for("login"), "http://localhost:8080/api/v1/login");
    }

    #[test]
    fn error_for_status_classifies_body() {
        let response = ApiResponse::new(StatusCode::BAD_REQUEST, r#"{"message":"Bad date"}"#);
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.user_message(), "Bad date");
    }

    #[test]
    fn success_passes_through() {
        let response = ApiResponse::new(StatusCode::OK, r#"{"id":1}"#);
        let value: JsonValue = response.error_for_status().unwrap().json().unwrap();
        assert_eq!(value["id"], 1);
    }
}
