//! Ride endpoints for students and drivers.

use super::{admin, empty_body, fetch_list, ApiError};
use crate::client::ApiClient;
use crate::models::{MessageResponse, RatingRequest, Ride, RideStatus, RideStatusUpdate, Role};

pub async fn student_rides(client: &ApiClient) -> Result<Vec<Ride>, ApiError> {
    fetch_list(client, "/api/student/my-rides", "rides").await
}

pub async fn driver_rides(client: &ApiClient) -> Result<Vec<Ride>, ApiError> {
    fetch_list(client, "/api/driver/my-rides", "rides").await
}

pub async fn available_rides(client: &ApiClient) -> Result<Vec<Ride>, ApiError> {
    fetch_list(client, "/api/driver/available-rides", "rides").await
}

/// The rides a user of `role` sees under "My Rides" (the full log for admins).
pub async fn rides_for(client: &ApiClient, role: Role) -> Result<Vec<Ride>, ApiError> {
    match role {
        Role::Student => student_rides(client).await,
        Role::Driver => driver_rides(client).await,
        Role::Admin => admin::all_rides(client).await,
    }
}

pub async fn accept_ride(client: &ApiClient, id: i64) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post(&format!("/api/driver/accept-ride/{}", id), &empty_body())
        .await?)
}

pub async fn update_status(
    client: &ApiClient,
    id: i64,
    status: RideStatus,
) -> Result<MessageResponse, ApiError> {
    if let RideStatus::Other(s) = &status {
        return Err(ApiError::Invalid(format!("Unknown ride status: {}", s)));
    }
    Ok(client
        .put(&format!("/api/ride/{}/status", id), &RideStatusUpdate { status })
        .await?)
}

/// Rate a completed ride from 1 to 5 stars.
pub async fn rate_ride(
    client: &ApiClient,
    id: i64,
    rating: u8,
    comment: Option<String>,
) -> Result<MessageResponse, ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::Invalid(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(client
        .post(
            &format!("/api/ride/{}/rate", id),
            &RatingRequest { rating, comment },
        )
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock;
    use crate::session::SessionStore;
    use axum::extract::Path;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn ride(id: i64, status: &str) -> Value {
        json!({
            "id": id,
            "pickup_location": "Library",
            "dropoff_location": "Dorm",
            "status": status
        })
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/api/student/my-rides",
                get(|| async { Json(json!({ "rides": [ride(1, "pending")] })) }),
            )
            .route(
                "/api/driver/my-rides",
                get(|| async { Json(json!({ "rides": [ride(2, "accepted"), ride(3, "completed")] })) }),
            )
            .route(
                "/api/ride/:id/status",
                put(|Path(id): Path<i64>, Json(body): Json<Value>| async move {
                    Json(json!({ "message": format!("{} -> {}", id, body["status"].as_str().unwrap_or("")) }))
                }),
            )
            .route(
                "/api/ride/:id/rate",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "message": format!("{} stars", body["rating"]) }))
                }),
            )
    }

    async fn client() -> ApiClient {
        let base = mock::serve(router()).await;
        ApiClient::new(base, SessionStore::in_memory()).unwrap()
    }

    #[tokio::test]
    async fn test_rides_for_dispatches_on_role() {
        let client = client().await;
        let student = rides_for(&client, Role::Student).await.unwrap();
        assert_eq!(student.len(), 1);
        assert_eq!(student[0].status, RideStatus::Pending);

        let driver = rides_for(&client, Role::Driver).await.unwrap();
        assert_eq!(driver.len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_sends_wire_name() {
        let client = client().await;
        let msg = update_status(&client, 2, RideStatus::InProgress).await.unwrap();
        assert_eq!(msg.message.as_deref(), Some("2 -> in_progress"));
    }

    #[tokio::test]
    async fn test_rating_range_checked_locally() {
        let client = client().await;
        assert!(matches!(
            rate_ride(&client, 1, 0, None).await.unwrap_err(),
            ApiError::Invalid(_)
        ));
        assert!(matches!(
            rate_ride(&client, 1, 6, None).await.unwrap_err(),
            ApiError::Invalid(_)
        ));
        let msg = rate_ride(&client, 1, 5, Some("great".into())).await.unwrap();
        assert_eq!(msg.message.as_deref(), Some("5 stars"));
    }
}
