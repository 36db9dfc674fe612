//! In-app notifications.

use super::{empty_body, fetch_list, ApiError};
use crate::client::ApiClient;
use crate::models::{MessageResponse, Notification};

pub async fn list(client: &ApiClient) -> Result<Vec<Notification>, ApiError> {
    fetch_list(client, "/api/notifications", "notifications").await
}

pub async fn mark_read(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    Ok(client
        .put(&format!("/api/notifications/{}/read", id), &empty_body())
        .await?)
}
