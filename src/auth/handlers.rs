use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{AuthResponse, CredentialsRequest, MeResponse, RegisterResponse},
    extractors::AuthUser,
    jwt::JwtKeys,
    services::is_valid_username,
};
use crate::{error::AppError, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let username = payload.username.trim();

    if payload.password.is_empty() {
        return Err(AppError::BadRequest("Username and password are required".into()));
    }
    if !is_valid_username(username) {
        warn!(%username, "invalid username");
        return Err(AppError::BadRequest("Invalid username".into()));
    }

    if !state.auth.register(username, &payload.password).await? {
        return Err(AppError::UsernameTaken);
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            username: username.to_string(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let username = payload.username.trim();

    let Some(username) = state.auth.authenticate(username, &payload.password).await? else {
        return Err(AppError::InvalidCredentials);
    };

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(&username)?;

    // a login starts a fresh session, thresholds go back to their defaults
    state.sessions.start(&username).await;

    info!(%username, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        token_type: "Bearer",
        username,
    }))
}

#[instrument(skip_all)]
pub async fn get_me(AuthUser(username): AuthUser) -> Json<MeResponse> {
    Json(MeResponse { username })
}

#[cfg(test)]
mod me_tests {
    use super::*;

    #[test]
    fn test_me_response_serialization() {
        let response = MeResponse {
            username: "ana".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"username":"ana"}"#);
    }
}
