//! Generic resource client.
//!
//! One wrapper for every backend call: joins the path onto the configured
//! base URL, attaches `Authorization: Bearer <token>` when the session store
//! holds a session, and turns any non-2xx response into a
//! [`ClientError::Status`]. Each call is fire-once: no retries, no timeout, no
//! de-duplication. Interpreting status codes is left to the caller (see
//! [`crate::gate::on_failure`]).

#[cfg(test)]
pub(crate) mod mock;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

use crate::session::SessionStore;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API error: {method} {path} returned {status}")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
        status_text: String,
        body: String,
        /// Session generation the request was sent under.
        generation: u64,
    },

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {path} could not be decoded: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

#[derive(Deserialize)]
struct ServerErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ClientError {
    /// HTTP status, for errors that carry one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Session generation the failed request was sent under.
    pub fn session_generation(&self) -> Option<u64> {
        match self {
            ClientError::Status { generation, .. } => Some(*generation),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN)
    }

    /// Message the server put in its `{"error": ...}` body, if any.
    pub fn server_message(&self) -> Option<String> {
        let ClientError::Status { body, .. } = self else {
            return None;
        };
        let parsed: ServerErrorBody = serde_json::from_str(body).ok()?;
        parsed.error.or(parsed.message).filter(|m| !m.is_empty())
    }
}

/// Uniform GET/POST/PUT/DELETE wrapper around one backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ridedesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send::<(), T>(Method::DELETE, path, None).await
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");

        let (generation, session) = self.session.observe();
        let token = session.map(|s| s.token);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|source| ClientError::Transport {
            path: path.to_string(),
            source,
        })?;
        let status = response.status();
        debug!(
            method = %method,
            path,
            status = status.as_u16(),
            authenticated = token.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "API request"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                method,
                path: path.to_string(),
                status,
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                body,
                generation,
            });
        }

        let bytes = response.bytes().await.map_err(|source| ClientError::Transport {
            path: path.to_string(),
            source,
        })?;
        let payload: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };
        serde_json::from_slice(payload).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::student;
    use axum::http::HeaderMap;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn echo_auth(headers: HeaderMap) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Json(json!({ "authorization": auth }))
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/x",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body, json!({"a": 1}));
                    Json(json!({"ok": true}))
                }),
            )
            .route(
                "/denied",
                post(|| async {
                    (
                        axum::http::StatusCode::FORBIDDEN,
                        Json(json!({"error": "nope"})),
                    )
                }),
            )
            .route("/whoami", get(|headers: HeaderMap| async move { echo_auth(headers) }))
            .route("/empty", delete(|| async { axum::http::StatusCode::OK }))
            .route("/garbage", get(|| async { "<html>" }))
    }

    #[tokio::test]
    async fn test_post_success_returns_parsed_body() {
        let base = mock::serve(router()).await;
        let client = ApiClient::new(base, SessionStore::in_memory()).unwrap();
        let value: Value = client.post("/x", &json!({"a": 1})).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_non_2xx_is_typed_error_with_status() {
        let base = mock::serve(router()).await;
        let client = ApiClient::new(base, SessionStore::in_memory()).unwrap();
        let err = client
            .post::<_, Value>("/denied", &json!({"a": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert!(err.is_forbidden());
        assert!(!err.is_unauthorized());
        assert_eq!(err.server_message().as_deref(), Some("nope"));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_bearer_header_only_with_session() {
        let base = mock::serve(router()).await;
        let store = SessionStore::in_memory();
        let client = ApiClient::new(format!("{}/", base), store.clone()).unwrap();

        let anon: Value = client.get("/whoami").await.unwrap();
        assert_eq!(anon["authorization"], Value::Null);

        store.save("secret-token", &student(true, true)).unwrap();
        let authed: Value = client.get("/whoami").await.unwrap();
        assert_eq!(authed["authorization"], "Bearer secret-token");
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let base = mock::serve(router()).await;
        let client = ApiClient::new(base, SessionStore::in_memory()).unwrap();
        let value: Value = client.delete("/empty").await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let base = mock::serve(router()).await;
        let client = ApiClient::new(base, SessionStore::in_memory()).unwrap();
        let err = client.get::<Value>("/garbage").await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client = ApiClient::new("http://127.0.0.1:1", SessionStore::in_memory()).unwrap();
        let err = client.get::<Value>("/anything").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }
}
