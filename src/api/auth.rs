//! Authentication and account endpoints.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::ApiError;
use crate::client::ApiClient;
use crate::models::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse, Session,
    TokenValidity, User, UserEnvelope,
};

/// Log in and persist the returned session.
pub async fn login(client: &ApiClient, email: &str, password: &str) -> Result<Session, ApiError> {
    let request = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    let response: LoginResponse = client.post("/api/auth/login", &request).await?;
    client.session().save(&response.token, &response.user)?;
    info!(user_id = response.user.id, "Logged in");
    Ok(Session {
        token: response.token,
        user: response.user,
    })
}

pub fn logout(client: &ApiClient) -> Result<(), ApiError> {
    client.session().clear()?;
    Ok(())
}

pub async fn register(
    client: &ApiClient,
    request: &RegisterRequest,
) -> Result<RegisterResponse, ApiError> {
    Ok(client.post("/api/auth/register", request).await?)
}

pub async fn verify_email(client: &ApiClient, token: &str) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post("/api/auth/verify-email", &json!({ "token": token }))
        .await?)
}

pub async fn resend_verification(
    client: &ApiClient,
    email: &str,
) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post("/api/auth/resend-verification", &json!({ "email": email }))
        .await?)
}

pub async fn forgot_password(client: &ApiClient, email: &str) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post("/api/auth/forgot-password", &json!({ "email": email }))
        .await?)
}

pub async fn validate_reset_token(client: &ApiClient, token: &str) -> Result<bool, ApiError> {
    let validity: TokenValidity = client
        .post("/api/auth/validate-reset-token", &json!({ "token": token }))
        .await?;
    Ok(validity.valid)
}

pub async fn reset_password(
    client: &ApiClient,
    token: &str,
    password: &str,
) -> Result<MessageResponse, ApiError> {
    Ok(client
        .post(
            "/api/auth/reset-password",
            &json!({ "token": token, "password": password }),
        )
        .await?)
}

pub async fn change_password(
    client: &ApiClient,
    old_password: &str,
    new_password: &str,
) -> Result<MessageResponse, ApiError> {
    if old_password == new_password {
        return Err(ApiError::Invalid(
            "New password must differ from the current one".to_string(),
        ));
    }
    Ok(client
        .post(
            "/api/auth/change-password",
            &json!({ "old_password": old_password, "new_password": new_password }),
        )
        .await?)
}

/// Send profile changes and merge the result into the stored user.
///
/// Returns the merged user, or `None` if the session was cleared or replaced
/// while the request was in flight.
pub async fn update_profile(
    client: &ApiClient,
    fields: &Map<String, Value>,
) -> Result<Option<User>, ApiError> {
    let generation = client.session().generation();
    let response: Value = client.put("/api/auth/update-profile", fields).await?;

    let merged_fields = match response.get("user") {
        Some(Value::Object(user)) => user.clone(),
        _ => fields.clone(),
    };
    let merged = client.session().update_at(generation, &merged_fields)?;
    if merged.is_none() {
        warn!("Profile updated remotely but the local session changed meanwhile");
    }
    Ok(merged)
}

/// Re-read the current user from the backend, e.g. to pick up an approval.
pub async fn refresh(client: &ApiClient) -> Result<Option<User>, ApiError> {
    let generation = client.session().generation();
    let envelope: UserEnvelope = client.get("/api/auth/me").await?;
    let replaced = client
        .session()
        .replace_user_at(generation, &envelope.user)?;
    Ok(replaced.then_some(envelope.user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock;
    use crate::session::SessionStore;
    use axum::http::StatusCode;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use std::time::Duration;

    fn user_json(approved: bool) -> Value {
        json!({
            "id": 5,
            "full_name": "Sam Student",
            "email": "sam@example.edu",
            "user_type": "student",
            "is_verified": true,
            "is_approved": approved
        })
    }

    fn router() -> Router {
        Router::new()
            .route(
                "/api/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "right" {
                        Ok(Json(json!({
                            "message": "Login successful",
                            "token": "jwt-123",
                            "user": user_json(false)
                        })))
                    } else {
                        Err((
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"error": "Invalid credentials"})),
                        ))
                    }
                }),
            )
            .route("/api/auth/me", get(|| async { Json(json!({ "user": user_json(true) })) }))
            .route(
                "/api/auth/update-profile",
                put(|Json(body): Json<Value>| async move {
                    let mut user = user_json(false);
                    for (k, v) in body.as_object().cloned().unwrap_or_default() {
                        user[k] = v;
                    }
                    Json(json!({ "user": user }))
                }),
            )
            .route(
                "/api/auth/validate-reset-token",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({ "valid": body["token"] == "good" }))
                }),
            )
    }

    async fn client() -> ApiClient {
        let base = mock::serve(router()).await;
        ApiClient::new(base, SessionStore::in_memory()).unwrap()
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let client = client().await;
        let session = login(&client, "sam@example.edu", "right").await.unwrap();
        assert_eq!(session.token, "jwt-123");
        assert_eq!(client.session().load().unwrap(), session);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_no_session() {
        let client = client().await;
        let err = login(&client, "sam@example.edu", "wrong").await.unwrap_err();
        let client_err = err.client_error().unwrap();
        assert!(client_err.is_unauthorized());
        assert_eq!(client_err.server_message().as_deref(), Some("Invalid credentials"));
        assert!(client.session().load().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_merges_into_session() {
        let client = client().await;
        login(&client, "sam@example.edu", "right").await.unwrap();
        let fields = json!({"phone": "555-0101"});
        let user = update_profile(&client, fields.as_object().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.phone.as_deref(), Some("555-0101"));
        assert_eq!(
            client.session().load().unwrap().user.phone.as_deref(),
            Some("555-0101")
        );
    }

    #[tokio::test]
    async fn test_update_profile_after_logout_is_dropped() {
        let router = Router::new().route(
            "/api/auth/update-profile",
            put(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Json(json!({ "user": { "phone": "late" } }))
            }),
        );
        let base = mock::serve(router).await;
        let store = SessionStore::in_memory();
        let client = ApiClient::new(base, store.clone()).unwrap();
        let user: User = serde_json::from_value(user_json(true)).unwrap();
        store.save("tok", &user).unwrap();

        let fields = json!({"phone": "late"});
        let pending = {
            let client = client.clone();
            tokio::spawn(async move { update_profile(&client, fields.as_object().unwrap()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        logout(&client).unwrap();

        let result = pending.await.unwrap().unwrap();
        assert!(result.is_none());
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn test_refresh_picks_up_approval() {
        let client = client().await;
        login(&client, "sam@example.edu", "right").await.unwrap();
        assert!(!client.session().load().unwrap().user.is_approved);
        let user = refresh(&client).await.unwrap().unwrap();
        assert!(user.is_approved);
        assert!(client.session().load().unwrap().user.is_approved);
    }

    #[tokio::test]
    async fn test_validate_reset_token() {
        let client = client().await;
        assert!(validate_reset_token(&client, "good").await.unwrap());
        assert!(!validate_reset_token(&client, "bad").await.unwrap());
    }

    #[tokio::test]
    async fn test_change_password_rejects_same_password() {
        let client = client().await;
        let err = change_password(&client, "same", "same").await.unwrap_err();
        assert!(matches!(err, ApiError::Invalid(_)));
    }
}
