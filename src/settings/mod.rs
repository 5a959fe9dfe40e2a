//! Per-session calorie thresholds and calendar navigation.

pub mod handlers;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::{error::AppError, state::AppState};

pub fn router() -> axum::Router<AppState> {
    handlers::routes()
}

pub const DAILY_LIMIT_MAX: u32 = 5_000;
pub const WEEKLY_LIMIT_MAX: u32 = 50_000;
/// How many weeks the calendar may move away from the current one, either way.
pub const WEEK_OFFSET_MAX: i32 = 5_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalorieSettings {
    pub min_daily: u32,
    pub max_daily: u32,
    pub min_weekly: u32,
    pub max_weekly: u32,
    /// Weeks away from the current one shown by the calendar. Negative is past.
    pub week_offset: i32,
}

impl Default for CalorieSettings {
    fn default() -> Self {
        Self {
            min_daily: 1800,
            max_daily: 2500,
            min_weekly: 12000,
            max_weekly: 17500,
            week_offset: 0,
        }
    }
}

/// Partial update; absent fields are left alone. Fields are wide signed
/// integers so out-of-range values reach `apply` instead of failing to parse.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub min_daily: Option<i64>,
    pub max_daily: Option<i64>,
    pub min_weekly: Option<i64>,
    pub max_weekly: Option<i64>,
    pub week_offset: Option<i64>,
}

impl CalorieSettings {
    /// Applies `update` if every field is within range. Inverted min/max pairs
    /// are accepted as given.
    pub fn apply(&mut self, update: &SettingsUpdate) -> Result<(), AppError> {
        let daily = i64::from(DAILY_LIMIT_MAX);
        let weekly = i64::from(WEEKLY_LIMIT_MAX);
        let offset = i64::from(WEEK_OFFSET_MAX);

        let mut next = *self;
        if let Some(v) = checked("min_daily", update.min_daily, 0, daily)? {
            next.min_daily = v;
        }
        if let Some(v) = checked("max_daily", update.max_daily, 0, daily)? {
            next.max_daily = v;
        }
        if let Some(v) = checked("min_weekly", update.min_weekly, 0, weekly)? {
            next.min_weekly = v;
        }
        if let Some(v) = checked("max_weekly", update.max_weekly, 0, weekly)? {
            next.max_weekly = v;
        }
        if let Some(v) = checked("week_offset", update.week_offset, -offset, offset)? {
            next.week_offset = v;
        }

        if next.min_daily > next.max_daily {
            warn!(min = next.min_daily, max = next.max_daily, "daily minimum above maximum");
        }
        if next.min_weekly > next.max_weekly {
            warn!(min = next.min_weekly, max = next.max_weekly, "weekly minimum above maximum");
        }
        *self = next;
        Ok(())
    }
}

/// Range-checks an optional field and narrows it to the stored type.
fn checked<T: TryFrom<i64>>(
    field: &str,
    value: Option<i64>,
    min: i64,
    max: i64,
) -> Result<Option<T>, AppError> {
    let out_of_range = || AppError::BadRequest(format!("{field} must be between {min} and {max}"));
    match value {
        None => Ok(None),
        Some(v) if (min..=max).contains(&v) => T::try_from(v).map(Some).map_err(|_| out_of_range()),
        Some(_) => Err(out_of_range()),
    }
}

/// Settings of every logged-in user, living as long as the process.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, CalorieSettings>>,
}

impl SessionRegistry {
    /// Resets `user` to the defaults, as at the start of a session.
    pub async fn start(&self, user: &str) {
        self.sessions
            .write()
            .await
            .insert(user.to_string(), CalorieSettings::default());
    }

    pub async fn get(&self, user: &str) -> CalorieSettings {
        self.sessions
            .read()
            .await
            .get(user)
            .copied()
            .unwrap_or_default()
    }

    pub async fn update(
        &self,
        user: &str,
        update: &SettingsUpdate,
    ) -> Result<CalorieSettings, AppError> {
        let mut sessions = self.sessions.write().await;
        let settings = sessions.entry(user.to_string()).or_default();
        settings.apply(update)?;
        Ok(*settings)
    }

    /// Moves the calendar by `weeks` and returns the new settings. A move past
    /// `WEEK_OFFSET_MAX` is refused and leaves the calendar where it was.
    pub async fn shift_week(&self, user: &str, weeks: i32) -> Result<CalorieSettings, AppError> {
        let mut sessions = self.sessions.write().await;
        let settings = sessions.entry(user.to_string()).or_default();
        settings.week_offset = settings
            .week_offset
            .checked_add(weeks)
            .filter(|o| o.abs() <= WEEK_OFFSET_MAX)
            .ok_or_else(|| AppError::BadRequest("week offset out of range".into()))?;
        Ok(*settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_checks_ranges() {
        let mut s = CalorieSettings::default();
        let too_high = SettingsUpdate {
            max_daily: Some(5001),
            ..Default::default()
        };
        assert!(matches!(s.apply(&too_high), Err(AppError::BadRequest(_))));
        assert_eq!(s, CalorieSettings::default());

        let weekly = SettingsUpdate {
            max_weekly: Some(50_000),
            min_daily: Some(0),
            ..Default::default()
        };
        s.apply(&weekly).unwrap();
        assert_eq!(s.max_weekly, 50_000);
        assert_eq!(s.min_daily, 0);
        assert_eq!(s.max_daily, 2500);
    }

    #[test]
    fn negative_and_huge_values_are_bad_requests() {
        let mut s = CalorieSettings::default();
        for update in [
            SettingsUpdate {
                min_daily: Some(-1),
                ..Default::default()
            },
            SettingsUpdate {
                max_weekly: Some(-50),
                ..Default::default()
            },
            SettingsUpdate {
                week_offset: Some(2_000_000),
                ..Default::default()
            },
            SettingsUpdate {
                week_offset: Some(-2_000_000),
                ..Default::default()
            },
            SettingsUpdate {
                week_offset: Some(i64::MAX),
                ..Default::default()
            },
        ] {
            assert!(matches!(s.apply(&update), Err(AppError::BadRequest(_))), "{update:?}");
        }
        assert_eq!(s, CalorieSettings::default());

        s.apply(&SettingsUpdate {
            week_offset: Some(-i64::from(WEEK_OFFSET_MAX)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.week_offset, -WEEK_OFFSET_MAX);
    }

    #[test]
    fn inverted_limits_are_kept_as_given() {
        let mut s = CalorieSettings::default();
        s.apply(&SettingsUpdate {
            min_daily: Some(3000),
            max_daily: Some(1000),
            ..Default::default()
        })
        .unwrap();
        assert_eq!((s.min_daily, s.max_daily), (3000, 1000));
    }

    #[tokio::test]
    async fn sessions_reset_on_start() {
        let registry = SessionRegistry::default();
        registry.shift_week("ana", -2).await.unwrap();
        registry
            .update(
                "ana",
                &SettingsUpdate {
                    max_daily: Some(2000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let current = registry.get("ana").await;
        assert_eq!(current.week_offset, -2);
        assert_eq!(current.max_daily, 2000);

        registry.start("ana").await;
        assert_eq!(registry.get("ana").await, CalorieSettings::default());
    }

    #[tokio::test]
    async fn shifting_stops_at_the_offset_bound() {
        let registry = SessionRegistry::default();
        registry
            .update(
                "ana",
                &SettingsUpdate {
                    week_offset: Some(i64::from(WEEK_OFFSET_MAX)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            registry.shift_week("ana", 1).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(registry.get("ana").await.week_offset, WEEK_OFFSET_MAX);
        assert_eq!(
            registry.shift_week("ana", -1).await.unwrap().week_offset,
            WEEK_OFFSET_MAX - 1
        );
    }

    #[tokio::test]
    async fn unknown_users_see_defaults() {
        let registry = SessionRegistry::default();
        assert_eq!(registry.get("ghost").await, CalorieSettings::default());
        assert_eq!(registry.shift_week("ghost", 1).await.unwrap().week_offset, 1);
    }
}
