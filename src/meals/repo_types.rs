use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ingredient {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// One recorded meal analysis. Immutable once written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryEntry {
    pub user: String,
    pub timestamp: String, // YYYY-MM-DD HH:MM:SS
    pub date: String,      // YYYY-MM-DD
    pub dish_name: String,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub image_b64: String, // PNG
    pub ingredients: Vec<Ingredient>,
}

/// What a caller supplies; the store adds user, timestamp and date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewEntry {
    pub dish_name: String,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub image_b64: String,
    pub ingredients: Vec<Ingredient>,
}

impl NewEntry {
    pub fn into_entry(self, user: &str, timestamp: String) -> HistoryEntry {
        let date = timestamp.get(..10).unwrap_or(&timestamp).to_string();
        HistoryEntry {
            user: user.to_string(),
            timestamp,
            date,
            dish_name: self.dish_name,
            total_calories: self.total_calories,
            total_protein: self.total_protein,
            total_carbs: self.total_carbs,
            total_fat: self.total_fat,
            image_b64: self.image_b64,
            ingredients: self.ingredients,
        }
    }
}

/// Whole `history.json` document, keyed by username.
pub type HistoryFile = BTreeMap<String, Vec<HistoryEntry>>;

#[derive(Debug, FromRow)]
pub struct HistoryRow {
    pub username: String,
    pub recorded_at: String,
    pub day: String,
    pub dish_name: String,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub image_b64: String,
    pub ingredients: Json<Vec<Ingredient>>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(r: HistoryRow) -> Self {
        Self {
            user: r.username,
            timestamp: r.recorded_at,
            date: r.day,
            dish_name: r.dish_name,
            total_calories: r.total_calories,
            total_protein: r.total_protein,
            total_carbs: r.total_carbs,
            total_fat: r.total_fat,
            image_b64: r.image_b64,
            ingredients: r.ingredients.0,
        }
    }
}
