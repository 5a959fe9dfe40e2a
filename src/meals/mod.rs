mod dto;
pub mod handlers;
pub mod parser;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub use repo::{FileHistoryStore, HistoryStore, PgHistoryStore};
pub use repo_types::{HistoryEntry, Ingredient, NewEntry};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
