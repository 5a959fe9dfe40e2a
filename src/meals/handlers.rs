use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use tracing::instrument;

use super::{
    dto::{AnalyzeBase64Request, AnalyzeResponse, HistoryItem, HistoryQuery, HistoryResponse},
    services::{analyze_and_record, filter_history, HistoryFilter},
};
use crate::{auth::AuthUser, clock::parse_date, error::AppError, state::AppState};

const UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(list_history))
        .route("/history/:index/image", get(history_image))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/meals/analyze", post(analyze_multipart))
        .route("/meals/analyze/base64", post(analyze_base64))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
}

/// Multipart upload, image in the `file` (or `image`) field.
#[instrument(skip(state, mp))]
pub async fn analyze_multipart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut mp: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if matches!(field.name(), Some("file") | Some("image")) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            upload = Some(data.to_vec());
            break;
        }
    }
    let upload = upload.ok_or_else(|| AppError::BadRequest("file is required".into()))?;

    let (entry, plate) = analyze_and_record(&state, &user, upload).await?;
    Ok(Json(AnalyzeResponse::new(entry, plate)))
}

#[instrument(skip(state, body))]
pub async fn analyze_base64(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<AnalyzeBase64Request>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let upload = STANDARD
        .decode(body.payload())
        .map_err(|_| AppError::BadRequest("invalid base64".into()))?;

    let (entry, plate) = analyze_and_record(&state, &user, upload).await?;
    Ok(Json(AnalyzeResponse::new(entry, plate)))
}

#[instrument(skip(state))]
pub async fn list_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let filter = HistoryFilter {
        query: query.q.filter(|q| !q.trim().is_empty()),
        from: date_param("from", query.from.as_deref())?,
        to: date_param("to", query.to.as_deref())?,
    };

    let entries = state.history.list(&user).await?;
    let items: Vec<HistoryItem> = filter_history(entries, &filter)
        .into_iter()
        .map(|(index, entry)| HistoryItem::new(index, entry, query.images))
        .collect();

    Ok(Json(HistoryResponse {
        count: items.len(),
        items,
    }))
}

#[instrument(skip(state))]
pub async fn history_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state
        .history
        .list(&user)
        .await?
        .into_iter()
        .nth(index)
        .ok_or_else(|| AppError::NotFound("History entry not found".into()))?;

    if entry.image_b64.is_empty() {
        return Err(AppError::NotFound("Entry has no image".into()));
    }
    let png = STANDARD
        .decode(entry.image_b64.as_bytes())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], Bytes::from(png)))
}

fn date_param(name: &str, raw: Option<&str>) -> Result<Option<time::Date>, AppError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(r) => parse_date(r)
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("{name} must be YYYY-MM-DD"))),
    }
}
