use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument};

use super::{CalorieSettings, SettingsUpdate};
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(put_settings))
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<CalorieSettings> {
    Json(state.sessions.get(&user).await)
}

#[instrument(skip(state))]
pub async fn put_settings(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<CalorieSettings>, AppError> {
    let settings = state.sessions.update(&user, &update).await?;
    info!(%user, ?settings, "settings updated");
    Ok(Json(settings))
}
