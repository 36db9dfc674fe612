//! Typed endpoint wrappers over the resource client.
//!
//! Each submodule covers one area of the backend. Operations that change who
//! is logged in go through the session store; nothing here touches storage
//! directly.

pub mod admin;
pub mod auth;
pub mod notifications;
pub mod rides;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::client::{ApiClient, ClientError};
use crate::models::common::list_from;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    Invalid(String),
}

impl ApiError {
    /// The underlying client error, when the failure came from the backend.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            ApiError::Client(e) => Some(e),
            _ => None,
        }
    }
}

/// GET a collection that the backend returns either bare or wrapped under
/// `key`.
pub(crate) async fn fetch_list<T: DeserializeOwned>(
    client: &ApiClient,
    path: &str,
    key: &str,
) -> Result<Vec<T>, ApiError> {
    let value: Value = client.get(path).await?;
    let decode = |source| ClientError::Decode {
        path: path.to_string(),
        source,
    };
    let list = list_from(value, key).map_err(decode)?;
    Ok(serde_json::from_value(list).map_err(decode)?)
}

/// Empty JSON object, sent as the body of action endpoints that take none.
pub(crate) fn empty_body() -> Value {
    Value::Object(serde_json::Map::new())
}
