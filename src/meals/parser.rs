//! Turns free-form model output into a [`MealAnalysis`].
//!
//! Parsing is two-staged: strict JSON first, then a relaxed pass over the
//! outermost `{...}` span that accepts Python-style literals (single quotes,
//! `True`/`False`/`None`, trailing commas). Missing keys fall back to
//! defaults; anything that is not an object fails.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::repo_types::Ingredient;

pub const UNKNOWN_DISH: &str = "unknown dish";

/// Nutrition estimate extracted from the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealAnalysis {
    pub dish_name: String,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoObject,

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("strict parse failed ({strict}); relaxed parse failed ({relaxed})")]
    Unparseable {
        strict: Box<ParseError>,
        relaxed: Box<ParseError>,
    },
}

pub fn parse_model_output(raw: &str) -> Result<MealAnalysis, ParseError> {
    parse_strict(raw).or_else(|strict| {
        parse_relaxed(raw).map_err(|relaxed| ParseError::Unparseable {
            strict: Box::new(strict),
            relaxed: Box::new(relaxed),
        })
    })
}

pub fn parse_strict(raw: &str) -> Result<MealAnalysis, ParseError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    analysis_from_value(value)
}

pub fn parse_relaxed(raw: &str) -> Result<MealAnalysis, ParseError> {
    lazy_static! {
        static ref OBJECT_SPAN: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    }
    let span = OBJECT_SPAN.find(raw).ok_or(ParseError::NoObject)?;
    let value: Value = serde_json::from_str(&relax_literal(span.as_str()))?;
    analysis_from_value(value)
}

fn analysis_from_value(value: Value) -> Result<MealAnalysis, ParseError> {
    let obj = match value {
        Value::Object(obj) => obj,
        other => return Err(ParseError::NotAnObject(kind(&other))),
    };

    let ingredients = obj
        .get("ingredients")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(ingredient_from_map)
                .collect()
        })
        .unwrap_or_default();

    let dish_name = obj
        .get("dish_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_DISH)
        .to_string();

    Ok(MealAnalysis {
        dish_name,
        total_calories: number(&obj, "total_calories"),
        total_protein: number(&obj, "total_protein"),
        total_carbs: number(&obj, "total_carbs"),
        total_fat: number(&obj, "total_fat"),
        ingredients,
    })
}

fn ingredient_from_map(map: &Map<String, Value>) -> Ingredient {
    Ingredient {
        name: map
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        calories: number(map, "calories"),
        protein: number(map, "protein"),
        carbs: number(map, "carbs"),
        fat: number(map, "fat"),
    }
}

/// Numbers, or strings such as `"250"` / `"12.5 g"`. Everything else is 0.
fn number(map: &Map<String, Value>, key: &str) -> f64 {
    lazy_static! {
        static ref LEADING_NUMBER: Regex = Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").unwrap();
    }
    match map.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => LEADING_NUMBER
            .captures(s)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Rewrites a Python-style literal into JSON text.
fn relax_literal(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => word.as_str(),
                });
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Copies the string literal starting at `start` as a double-quoted JSON
/// string and returns the index just past its closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    out.push('"');
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' if i + 1 < chars.len() => {
                let escaped = chars[i + 1];
                if escaped == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(escaped);
                }
                i += 2;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return i + 1;
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
        i += 1;
    }
    // unterminated literal, let the JSON parser report it
    i
}
