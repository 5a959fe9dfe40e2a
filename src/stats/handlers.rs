use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use time::Date;
use tracing::{debug, instrument};

use super::{
    aggregate::{self, CaloriePoint, Daily, MacroPoint, ShareSlice},
    dto::{DailyView, Dashboard, Section, TrendView, WeekQuery, WeekView, NO_HISTORY, NO_MONTH, NO_TREND},
    report, trend,
};
use crate::{
    auth::AuthUser, clock::format_date, error::AppError, settings::CalorieSettings,
    state::AppState,
};

const ROLLING_DAYS: u32 = 30;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(dashboard))
        .route("/stats/week", get(week))
        .route("/stats/week/previous", post(previous_week))
        .route("/stats/week/next", post(next_week))
        .route("/stats/trend", get(trend_section))
        .route("/stats/last30", get(last30))
        .route("/stats/month", get(month))
        .route("/stats/macros", get(macros))
        .route("/stats/daily", get(daily))
}

/// Everything a stats page needs about one user at one moment.
struct Snapshot {
    daily: Daily,
    today: Date,
    settings: CalorieSettings,
}

impl Snapshot {
    async fn load(state: &AppState, user: &str) -> Result<Self, AppError> {
        let entries = state.history.list(user).await?;
        let daily = aggregate::daily_totals(&entries);
        debug!(%user, entries = entries.len(), days = daily.len(), "history aggregated");
        Ok(Self {
            daily,
            today: state.clock.today(),
            settings: state.sessions.get(user).await,
        })
    }

    fn week(&self, offset: i32, state: &AppState) -> Result<WeekView, AppError> {
        let window = report::week_window(self.today, offset)
            .ok_or_else(|| AppError::BadRequest("week offset out of range".into()))?;
        let days = report::week_calendar(&self.daily, &window, self.today, &self.settings);
        let report = report::week_report(&days, &self.settings, &state.config.verdict);
        Ok(WeekView {
            offset,
            days,
            report,
        })
    }

    fn trend(&self) -> Section<TrendView> {
        let dates = self.daily.keys().map(|d| format_date(*d)).collect();
        let calories: Vec<f64> = self.daily.values().map(|t| t.calories).collect();
        let trend = trend::fit(&calories);
        let empty = trend.is_none();
        Section::new(
            TrendView {
                dates,
                calories,
                trend,
            },
            empty,
            NO_TREND,
        )
    }

    fn month(&self) -> Section<Vec<ShareSlice>> {
        let slices = aggregate::monthly_share(&self.daily, self.today);
        let empty = slices.is_empty();
        Section::new(slices, empty, NO_MONTH)
    }

    fn section<T>(&self, data: T) -> Section<T> {
        Section::new(data, self.daily.is_empty(), NO_HISTORY)
    }
}

#[instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    let snap = Snapshot::load(&state, &user).await?;
    Ok(Json(Dashboard {
        notice: snap.daily.is_empty().then_some(NO_HISTORY),
        summary: aggregate::summary(&snap.daily),
        week: snap.week(snap.settings.week_offset, &state)?,
        trend: snap.trend(),
        last30: aggregate::rolling_window(&snap.daily, snap.today, ROLLING_DAYS),
        month: snap.month(),
        macros: aggregate::macro_series(&snap.daily),
        daily: aggregate::daily_series(&snap.daily),
    }))
}

/// `?offset=` shows another week without moving the session's calendar.
#[instrument(skip(state))]
pub async fn week(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(q): Query<WeekQuery>,
) -> Result<Json<WeekView>, AppError> {
    let snap = Snapshot::load(&state, &user).await?;
    let offset = q.offset.unwrap_or(snap.settings.week_offset);
    Ok(Json(snap.week(offset, &state)?))
}

#[instrument(skip(state))]
pub async fn previous_week(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<WeekView>, AppError> {
    shift(&state, &user, -1).await
}

#[instrument(skip(state))]
pub async fn next_week(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<WeekView>, AppError> {
    shift(&state, &user, 1).await
}

async fn shift(state: &AppState, user: &str, weeks: i32) -> Result<Json<WeekView>, AppError> {
    let settings = state.sessions.shift_week(user, weeks).await?;
    let snap = Snapshot::load(state, user).await?;
    Ok(Json(snap.week(settings.week_offset, state)?))
}

#[instrument(skip(state))]
pub async fn trend_section(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Section<TrendView>>, AppError> {
    let snap = Snapshot::load(&state, &user).await?;
    Ok(Json(snap.trend()))
}

#[instrument(skip(state))]
pub async fn last30(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Section<Vec<CaloriePoint>>>, AppError> {
    let snap = Snapshot::load(&state, &user).await?;
    let points = aggregate::rolling_window(&snap.daily, snap.today, ROLLING_DAYS);
    Ok(Json(snap.section(points)))
}

#[instrument(skip(state))]
pub async fn month(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Section<Vec<ShareSlice>>>, AppError> {
    let snap = Snapshot::load(&state, &user).await?;
    Ok(Json(snap.month()))
}

#[instrument(skip(state))]
pub async fn macros(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Section<Vec<MacroPoint>>>, AppError> {
    let snap = Snapshot::load(&state, &user).await?;
    Ok(Json(snap.section(aggregate::macro_series(&snap.daily))))
}

#[instrument(skip(state))]
pub async fn daily(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Section<DailyView>>, AppError> {
    let snap = Snapshot::load(&state, &user).await?;
    let view = DailyView {
        summary: aggregate::summary(&snap.daily),
        days: aggregate::daily_series(&snap.daily),
    };
    Ok(Json(snap.section(view)))
}
