use serde::{Deserialize, Serialize};

use super::{
    aggregate::{CaloriePoint, DailyPoint, MacroPoint, ShareSlice, Summary},
    report::{CalendarDay, WeekReport},
    trend::Trend,
};

pub const NO_HISTORY: &str = "No meals recorded yet.";
pub const NO_TREND: &str = "Not enough data for a trend.";
pub const NO_MONTH: &str = "No data for the last 30 days.";

/// A dashboard section; `notice` explains why it is empty.
#[derive(Debug, Serialize)]
pub struct Section<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
    pub data: T,
}

impl<T> Section<T> {
    pub fn new(data: T, empty: bool, notice: &'static str) -> Self {
        Self {
            notice: empty.then_some(notice),
            data,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    pub offset: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct WeekView {
    pub offset: i32,
    pub days: Vec<CalendarDay>,
    pub report: WeekReport,
}

#[derive(Debug, Serialize)]
pub struct TrendView {
    pub dates: Vec<String>,
    pub calories: Vec<f64>,
    pub trend: Option<Trend>,
}

#[derive(Debug, Serialize)]
pub struct DailyView {
    pub summary: Summary,
    pub days: Vec<DailyPoint>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
    pub summary: Summary,
    pub week: WeekView,
    pub trend: Section<TrendView>,
    pub last30: Vec<CaloriePoint>,
    pub month: Section<Vec<ShareSlice>>,
    pub macros: Vec<MacroPoint>,
    pub daily: Vec<DailyPoint>,
}
