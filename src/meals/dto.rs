use serde::{Deserialize, Serialize};

use super::repo_types::{HistoryEntry, Ingredient};
use crate::vision::Detection;

#[derive(Debug, Deserialize)]
pub struct AnalyzeBase64Request {
    /// Plain base64 or a `data:image/...;base64,` URL.
    pub image_b64: String,
}

impl AnalyzeBase64Request {
    pub fn payload(&self) -> &str {
        let raw = self.image_b64.trim();
        match raw.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => raw,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub timestamp: String,
    pub date: String,
    pub dish_name: String,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub ingredients: Vec<Ingredient>,
    pub plate: Option<Detection>,
}

impl AnalyzeResponse {
    pub fn new(entry: HistoryEntry, plate: Option<Detection>) -> Self {
        Self {
            timestamp: entry.timestamp,
            date: entry.date,
            dish_name: entry.dish_name,
            total_calories: entry.total_calories,
            total_protein: entry.total_protein,
            total_carbs: entry.total_carbs,
            total_fat: entry.total_fat,
            ingredients: entry.ingredients,
            plate,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub images: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    /// Position in insertion order, usable with `/history/{index}/image`.
    pub index: usize,
    pub timestamp: String,
    pub date: String,
    pub dish_name: String,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub ingredients: Vec<Ingredient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl HistoryItem {
    pub fn new(index: usize, entry: HistoryEntry, with_image: bool) -> Self {
        let image = (with_image && !entry.image_b64.is_empty())
            .then(|| format!("data:image/png;base64,{}", entry.image_b64));
        Self {
            index,
            timestamp: entry.timestamp,
            date: entry.date,
            dish_name: entry.dish_name,
            total_calories: entry.total_calories,
            total_protein: entry.total_protein,
            total_carbs: entry.total_carbs,
            total_fat: entry.total_fat,
            ingredients: entry.ingredients,
            image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub items: Vec<HistoryItem>,
}
