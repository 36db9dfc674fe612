//! Administrator endpoints: user approval, role management, fleet overview.

use serde_json::{json, Value};

use super::{empty_body, fetch_list, ApiError};
use crate::client::ApiClient;
use crate::models::{
    DriverReviews, DriverSummary, MessageResponse, Ride, Role, User, UserEnvelope,
};

pub async fn list_users(client: &ApiClient) -> Result<Vec<User>, ApiError> {
    fetch_list(client, "/api/admin/users", "users").await
}

pub async fn pending_users(client: &ApiClient) -> Result<Vec<User>, ApiError> {
    fetch_list(client, "/api/admin/pending-users", "users").await
}

pub async fn all_students(client: &ApiClient) -> Result<Vec<User>, ApiError> {
    fetch_list(client, "/api/admin/all-students", "students").await
}

pub async fn all_drivers(client: &ApiClient) -> Result<Vec<DriverSummary>, ApiError> {
    fetch_list(client, "/api/admin/all-drivers", "drivers").await
}

pub async fn all_rides(client: &ApiClient) -> Result<Vec<Ride>, ApiError> {
    fetch_list(client, "/api/admin/rides", "rides").await
}

pub async fn user(client: &ApiClient, id: i64) -> Result<User, ApiError> {
    let envelope: UserEnvelope = client.get(&format!("/api/admin/user/{}", id)).await?;
    Ok(envelope.user)
}

/// Full record for one student. The shape varies with the backend version,
/// so it is returned as raw JSON.
pub async fn student(client: &ApiClient, id: i64) -> Result<Value, ApiError> {
    Ok(client.get(&format!("/api/admin/student/{}", id)).await?)
}

pub async fn driver_ratings(client: &ApiClient, id: i64) -> Result<DriverReviews, ApiError> {
    Ok(client
        .get(&format!("/api/admin/driver/{}/ratings", id))
        .await?)
}

pub async fn approve_user(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post(&format!("/api/admin/approve-user/{}", id), &empty_body())
        .await?)
}

pub async fn activate_driver(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post(&format!("/api/admin/activate-driver/{}", id), &empty_body())
        .await?)
}

pub async fn activate_student(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post(&format!("/api/admin/activate-student/{}", id), &empty_body())
        .await?)
}

pub async fn delete_driver(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    Ok(client
        .delete(&format!("/api/admin/delete-driver/{}", id))
        .await?)
}

pub async fn delete_student(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    Ok(client
        .delete(&format!("/api/admin/delete-student/{}", id))
        .await?)
}

/// Remove any account, whatever its role. Deleting yourself is refused before
/// the request is sent.
pub async fn delete_user(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    if client.session().load().is_some_and(|s| s.user.id == id) {
        return Err(ApiError::Invalid("Cannot delete your own account".to_string()));
    }
    Ok(client.delete(&format!("/api/admin/users/{}", id)).await?)
}

/// Change a user's role. Demoting yourself is refused before the request is
/// sent.
pub async fn set_role(client: &ApiClient, id: i64, role: Role) -> Result<MessageResponse, ApiError> {
    if let Some(session) = client.session().load() {
        if session.user.id == id && role != Role::Admin {
            return Err(ApiError::Invalid(
                "Cannot change your own admin role".to_string(),
            ));
        }
    }
    Ok(client
        .put(
            &format!("/api/admin/users/{}/role", id),
            &json!({ "user_type": role }),
        )
        .await?)
}
