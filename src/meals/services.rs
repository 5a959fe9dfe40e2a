use time::Date;
use tracing::{info, warn};

use super::{
    parser::{parse_model_output, MealAnalysis},
    repo_types::{HistoryEntry, NewEntry},
};
use crate::{
    clock::{self, parse_date},
    error::AppError,
    state::AppState,
    vision::{Detection, VisionError},
};

/// Analyzes an uploaded photo and appends the result to `user`'s history.
/// Nothing is recorded when the model output cannot be parsed.
pub async fn analyze_and_record(
    state: &AppState,
    user: &str,
    upload: Vec<u8>,
) -> Result<(HistoryEntry, Option<Detection>), AppError> {
    if upload.is_empty() {
        return Err(AppError::BadRequest("No image provided".into()));
    }

    let outcome = state.analyzer.analyze(upload).await.map_err(|e| match e {
        VisionError::Image(e) => AppError::BadRequest(format!("Invalid image file: {e}")),
        VisionError::Worker(e) => AppError::Internal(e.into()),
    })?;

    if outcome.degraded {
        return Err(AppError::InvalidModelOutput {
            reason: "vision request failed".into(),
            raw: outcome.raw,
        });
    }
    let analysis = parse_model_output(&outcome.raw).map_err(|e| {
        warn!(%user, error = %e, "model output rejected");
        AppError::InvalidModelOutput {
            raw: outcome.raw.clone(),
            reason: e.to_string(),
        }
    })?;

    let timestamp = clock::format_timestamp(state.clock.now());
    let entry = state
        .history
        .append(user, timestamp, new_entry(analysis, outcome.image_png_b64))
        .await?;

    info!(%user, dish = %entry.dish_name, kcal = entry.total_calories, "meal recorded");
    Ok((entry, outcome.plate))
}

fn new_entry(analysis: MealAnalysis, image_b64: String) -> NewEntry {
    NewEntry {
        dish_name: analysis.dish_name,
        total_calories: analysis.total_calories,
        total_protein: analysis.total_protein,
        total_carbs: analysis.total_carbs,
        total_fat: analysis.total_fat,
        image_b64,
        ingredients: analysis.ingredients,
    }
}

/// History page filter. Date bounds are inclusive.
#[derive(Debug, Default)]
pub struct HistoryFilter {
    pub query: Option<String>,
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl HistoryFilter {
    fn matches(&self, entry: &HistoryEntry) -> bool {
        if let Some(q) = &self.query {
            if !entry.dish_name.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        if self.from.is_none() && self.to.is_none() {
            return true;
        }
        let Some(day) = parse_date(&entry.date) else {
            return false;
        };
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

/// Newest first, each entry paired with its insertion index.
pub fn filter_history(
    entries: Vec<HistoryEntry>,
    filter: &HistoryFilter,
) -> Vec<(usize, HistoryEntry)> {
    entries
        .into_iter()
        .enumerate()
        .rev()
        .filter(|(_, e)| filter.matches(e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn entry(dish: &str, date: &str) -> HistoryEntry {
        HistoryEntry {
            dish_name: dish.into(),
            date: date.into(),
            timestamp: format!("{date} 12:00:00"),
            ..Default::default()
        }
    }

    fn history() -> Vec<HistoryEntry> {
        vec![
            entry("Chicken Salad", "2024-05-01"),
            entry("Pasta", "2024-05-02"),
            entry("chicken curry", "2024-05-03"),
            entry("Soup", "2024-05-04"),
        ]
    }

    #[test]
    fn newest_first_with_indices() {
        let out = filter_history(history(), &HistoryFilter::default());
        let indices: Vec<usize> = out.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![3, 2, 1, 0]);
        assert_eq!(out[0].1.dish_name, "Soup");
    }

    #[test]
    fn query_is_case_insensitive() {
        let filter = HistoryFilter {
            query: Some("CHICKEN".into()),
            ..Default::default()
        };
        let dishes: Vec<String> = filter_history(history(), &filter)
            .into_iter()
            .map(|(_, e)| e.dish_name)
            .collect();
        assert_eq!(dishes, vec!["chicken curry", "Chicken Salad"]);
    }

    #[test]
    fn date_range_is_inclusive() {
        let filter = HistoryFilter {
            from: Some(date!(2024 - 05 - 02)),
            to: Some(date!(2024 - 05 - 03)),
            ..Default::default()
        };
        let indices: Vec<usize> = filter_history(history(), &filter)
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(indices, vec![2, 1]);
    }

    #[test]
    fn malformed_dates_drop_out_of_ranged_queries() {
        let mut entries = history();
        entries.push(entry("mystery", "someday"));

        assert_eq!(filter_history(entries.clone(), &HistoryFilter::default()).len(), 5);
        let filter = HistoryFilter {
            from: Some(date!(2024 - 01 - 01)),
            ..Default::default()
        };
        assert_eq!(filter_history(entries, &filter).len(), 4);
    }
}
