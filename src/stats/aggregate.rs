//! Per-day sums over a user's history and the views derived from them.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;
use time::{Date, Duration};
use tracing::debug;

use crate::{
    clock::{format_date, parse_date},
    meals::HistoryEntry,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DayTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl AddAssign<&HistoryEntry> for DayTotals {
    fn add_assign(&mut self, e: &HistoryEntry) {
        self.calories += e.total_calories;
        self.protein += e.total_protein;
        self.carbs += e.total_carbs;
        self.fat += e.total_fat;
    }
}

/// Sparse: only dates with at least one entry are present.
pub type Daily = BTreeMap<Date, DayTotals>;

pub fn daily_totals(entries: &[HistoryEntry]) -> Daily {
    let mut daily = Daily::new();
    for entry in entries {
        match parse_date(&entry.date) {
            Some(day) => *daily.entry(day).or_default() += entry,
            None => debug!(date = %entry.date, "skipping entry with unparseable date"),
        }
    }
    daily
}

/// Calories for `day`, zero when nothing was recorded.
pub fn calories_on(daily: &Daily, day: Date) -> f64 {
    daily.get(&day).map_or(0.0, |t| t.calories)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaloriePoint {
    pub date: String,
    pub calories: f64,
}

/// Dense series of the `days` days ending on `today`, oldest first.
pub fn rolling_window(daily: &Daily, today: Date, days: u32) -> Vec<CaloriePoint> {
    (0..i64::from(days))
        .rev()
        .map(|back| today - Duration::days(back))
        .map(|day| CaloriePoint {
            date: format_date(day),
            calories: calories_on(daily, day),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareSlice {
    pub date: String,
    pub calories: f64,
    /// Fraction of the period total, 0 when the total is 0.
    pub share: f64,
}

/// Days on or after `today - 30`, each with its part of the period total.
pub fn monthly_share(daily: &Daily, today: Date) -> Vec<ShareSlice> {
    let since = today - Duration::days(30);
    let recent: Vec<(Date, f64)> = daily
        .range(since..)
        .map(|(day, t)| (*day, t.calories))
        .collect();
    let total: f64 = recent.iter().map(|(_, c)| c).sum();

    recent
        .into_iter()
        .map(|(day, calories)| ShareSlice {
            date: format_date(day),
            calories,
            share: if total > 0.0 { calories / total } else { 0.0 },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakDay {
    pub date: String,
    pub calories: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_calories: f64,
    pub recorded_days: usize,
    /// Average over days that have entries.
    pub daily_average: f64,
    pub peak: Option<PeakDay>,
}

pub fn summary(daily: &Daily) -> Summary {
    let total_calories: f64 = daily.values().map(|t| t.calories).sum();
    let recorded_days = daily.len();
    let peak = daily
        .iter()
        .fold(None, |best: Option<(&Date, f64)>, (day, t)| match best {
            Some((_, c)) if c >= t.calories => best,
            _ => Some((day, t.calories)),
        })
        .map(|(day, calories)| PeakDay {
            date: format_date(*day),
            calories,
        });

    Summary {
        total_calories,
        recorded_days,
        daily_average: if recorded_days == 0 {
            0.0
        } else {
            total_calories / recorded_days as f64
        },
        peak,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroPoint {
    pub date: String,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

pub fn macro_series(daily: &Daily) -> Vec<MacroPoint> {
    daily
        .iter()
        .map(|(day, t)| MacroPoint {
            date: format_date(*day),
            protein: t.protein,
            carbs: t.carbs,
            fat: t.fat,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: String,
    pub weekday: String,
    pub calories: f64,
}

pub fn daily_series(daily: &Daily) -> Vec<DailyPoint> {
    daily
        .iter()
        .map(|(day, t)| DailyPoint {
            date: format_date(*day),
            weekday: day.weekday().to_string(),
            calories: t.calories,
        })
        .collect()
}
