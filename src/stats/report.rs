//! Monday-aligned weekly calendar and the weekly verdict.

use serde::Serialize;
use time::{Date, Duration, Weekday};

use super::aggregate::{calories_on, Daily, PeakDay};
use crate::{
    clock::{format_date, pretty_date},
    config::VerdictPolicy,
    settings::CalorieSettings,
};

/// The seven dates of the week `offset` weeks away from the one holding `today`,
/// or `None` when that week leaves the supported calendar.
pub fn week_window(today: Date, offset: i32) -> Option<[Date; 7]> {
    let monday = today
        .checked_sub(Duration::days(i64::from(today.weekday().number_days_from_monday())))?
        .checked_add(Duration::weeks(i64::from(offset)))?;
    monday.checked_add(Duration::days(6))?;
    Some(std::array::from_fn(|i| monday + Duration::days(i as i64)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Today,
    OverLimit,
    UnderLimit,
    NoData,
    Normal,
}

/// First matching of: today, over the daily max, under the daily min (but
/// non-zero), zero, otherwise normal.
pub fn classify_day(day: Date, calories: f64, today: Date, s: &CalorieSettings) -> DayStatus {
    if day == today {
        DayStatus::Today
    } else if calories > f64::from(s.max_daily) {
        DayStatus::OverLimit
    } else if calories > 0.0 && calories < f64::from(s.min_daily) {
        DayStatus::UnderLimit
    } else if calories == 0.0 {
        DayStatus::NoData
    } else {
        DayStatus::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDay {
    pub date: String,
    pub label: String,
    pub weekday: &'static str,
    pub calories: f64,
    pub status: DayStatus,
}

fn weekday_short(day: Weekday) -> &'static str {
    match day {
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
        Weekday::Sunday => "Sun",
    }
}

pub fn week_calendar(
    daily: &Daily,
    window: &[Date; 7],
    today: Date,
    settings: &CalorieSettings,
) -> Vec<CalendarDay> {
    window
        .iter()
        .map(|&day| {
            let calories = calories_on(daily, day);
            CalendarDay {
                date: format_date(day),
                label: pretty_date(day),
                weekday: weekday_short(day.weekday()),
                calories,
                status: classify_day(day, calories, today, settings),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NoData,
    ExceededMultipleDays,
    SomeDaysOver,
    MostlyUnder,
    Balanced,
}

impl Verdict {
    pub fn decide(total: f64, days_over: u32, days_under: u32, policy: &VerdictPolicy) -> Self {
        if total == 0.0 {
            Verdict::NoData
        } else if days_over >= policy.over_alert_days {
            Verdict::ExceededMultipleDays
        } else if days_over >= 1 {
            Verdict::SomeDaysOver
        } else if days_under >= policy.under_praise_days {
            Verdict::MostlyUnder
        } else {
            Verdict::Balanced
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Verdict::NoData => "gray",
            Verdict::ExceededMultipleDays => "red",
            Verdict::SomeDaysOver => "orange",
            Verdict::MostlyUnder => "green",
            Verdict::Balanced => "blue",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Verdict::NoData => "No data for this week.",
            Verdict::ExceededMultipleDays => "You went over the limit on several days. Careful!",
            Verdict::SomeDaysOver => "A few days were over the limit. Try to balance it out.",
            Verdict::MostlyUnder => "Excellent! Most days were under the limit.",
            Verdict::Balanced => "Balanced week.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeeklyTarget {
    Below,
    Within,
    Above,
}

impl WeeklyTarget {
    fn of(total: f64, s: &CalorieSettings) -> Option<Self> {
        if total == 0.0 {
            None
        } else if total < f64::from(s.min_weekly) {
            Some(WeeklyTarget::Below)
        } else if total > f64::from(s.max_weekly) {
            Some(WeeklyTarget::Above)
        } else {
            Some(WeeklyTarget::Within)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekReport {
    pub start: String,
    pub end: String,
    pub total: f64,
    pub daily_average: f64,
    pub days_over: u32,
    pub days_under: u32,
    pub days_zero: u32,
    pub peak: Option<PeakDay>,
    pub verdict: Verdict,
    pub color: &'static str,
    pub message: &'static str,
    pub weekly_target: Option<WeeklyTarget>,
}

/// Counts are taken from the calorie values, so today is counted like any
/// other day even though the calendar marks it separately.
pub fn week_report(
    days: &[CalendarDay],
    settings: &CalorieSettings,
    policy: &VerdictPolicy,
) -> WeekReport {
    let max = f64::from(settings.max_daily);
    let min = f64::from(settings.min_daily);
    let count = |pred: &dyn Fn(f64) -> bool| days.iter().filter(|d| pred(d.calories)).count() as u32;

    let total: f64 = days.iter().map(|d| d.calories).sum();
    let days_over = count(&|c| c > max);
    let days_under = count(&|c| c > 0.0 && c < min);
    let days_zero = count(&|c| c == 0.0);

    let peak = days
        .iter()
        .fold(None, |best: Option<&CalendarDay>, d| match best {
            Some(b) if b.calories >= d.calories => Some(b),
            _ => Some(d),
        })
        .filter(|d| d.calories > 0.0)
        .map(|d| PeakDay {
            date: d.date.clone(),
            calories: d.calories,
        });

    let verdict = Verdict::decide(total, days_over, days_under, policy);
    WeekReport {
        start: days.first().map(|d| d.date.clone()).unwrap_or_default(),
        end: days.last().map(|d| d.date.clone()).unwrap_or_default(),
        total,
        daily_average: total / 7.0,
        days_over,
        days_under,
        days_zero,
        peak,
        verdict,
        color: verdict.color(),
        message: verdict.message(),
        weekly_target: WeeklyTarget::of(total, settings),
    }
}
