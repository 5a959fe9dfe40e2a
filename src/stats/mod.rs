//! Calorie statistics computed on read from a user's history.

pub mod aggregate;
mod dto;
pub mod handlers;
pub mod report;
pub mod trend;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
