use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Where users and history live.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// `users.json` and `history.json` under a data directory.
    Files { data_dir: PathBuf },
    Postgres { database_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionProvider {
    Ollama,
    OpenAi,
}

impl FromStr for VisionProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" | "local" => Ok(Self::Ollama),
            "openai" | "cloud" => Ok(Self::OpenAi),
            other => anyhow::bail!("unknown vision provider `{other}`"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub provider: VisionProvider,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
    pub num_predict: u32,
    pub max_edge: u32,
    pub detector_url: Option<String>,
    pub detector_labels: Vec<String>,
    pub detector_min_confidence: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            provider: VisionProvider::Ollama,
            endpoint: "http://localhost:11434/api/chat".into(),
            model: "llava".into(),
            api_key: None,
            timeout: Duration::from_secs(300),
            temperature: 0.1,
            num_predict: 512,
            max_edge: 512,
            detector_url: None,
            detector_labels: vec!["bowl".into(), "plate".into()],
            detector_min_confidence: 0.3,
        }
    }
}

/// Day-count thresholds of the weekly verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictPolicy {
    /// Days over the daily maximum that turn the verdict red.
    pub over_alert_days: u32,
    /// Days under the daily minimum that earn the green verdict.
    pub under_praise_days: u32,
}

impl VerdictPolicy {
    /// Thresholds of zero would fire on every week with data, so both are
    /// raised to at least one day.
    pub fn new(over_alert_days: u32, under_praise_days: u32) -> Self {
        Self {
            over_alert_days: at_least_one_day("VERDICT_OVER_ALERT_DAYS", over_alert_days),
            under_praise_days: at_least_one_day("VERDICT_UNDER_PRAISE_DAYS", under_praise_days),
        }
    }
}

fn at_least_one_day(key: &str, days: u32) -> u32 {
    if days == 0 {
        warn!(key, "day threshold of 0 raised to 1");
        1
    } else {
        days
    }
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            over_alert_days: 3,
            under_praise_days: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub vision: VisionConfig,
    pub verdict: VerdictPolicy,
    pub utc_offset: UtcOffset,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "files".into())
            .as_str()
        {
            "postgres" | "pg" => StoreConfig::Postgres {
                database_url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL is required for the postgres store")?,
            },
            _ => StoreConfig::Files {
                data_dir: std::env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data")),
            },
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "platewise".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "platewise-users".into()),
            ttl_minutes: parsed("JWT_TTL_MINUTES", 60 * 12),
        };

        Ok(Self {
            store,
            jwt,
            vision: vision_from_env()?,
            verdict: VerdictPolicy::new(
                parsed("VERDICT_OVER_ALERT_DAYS", 3),
                parsed("VERDICT_UNDER_PRAISE_DAYS", 4),
            ),
            utc_offset: utc_offset_from_env(),
        })
    }
}

fn vision_from_env() -> anyhow::Result<VisionConfig> {
    let defaults = VisionConfig::default();
    let provider: VisionProvider = std::env::var("VISION_PROVIDER")
        .unwrap_or_else(|_| "ollama".into())
        .parse()?;

    let (endpoint, model) = match provider {
        VisionProvider::Ollama => (defaults.endpoint.clone(), defaults.model.clone()),
        VisionProvider::OpenAi => (
            "https://api.openai.com/v1/responses".to_string(),
            "gpt-4o-mini".to_string(),
        ),
    };
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
    if provider == VisionProvider::OpenAi && api_key.is_none() {
        anyhow::bail!("OPENAI_API_KEY is required for the openai vision provider");
    }

    let detector_labels = std::env::var("DETECTOR_LABELS")
        .map(|v| {
            v.split(',')
                .map(|l| l.trim().to_ascii_lowercase())
                .filter(|l| !l.is_empty())
                .collect()
        })
        .unwrap_or(defaults.detector_labels);

    Ok(VisionConfig {
        provider,
        endpoint: std::env::var("VISION_ENDPOINT").unwrap_or(endpoint),
        model: std::env::var("VISION_MODEL").unwrap_or(model),
        api_key,
        timeout: Duration::from_secs(parsed("VISION_TIMEOUT_SECS", 300)),
        temperature: parsed("VISION_TEMPERATURE", defaults.temperature),
        num_predict: parsed("VISION_NUM_PREDICT", defaults.num_predict),
        max_edge: parsed("IMAGE_MAX_EDGE", defaults.max_edge),
        detector_url: std::env::var("DETECTOR_URL").ok().filter(|u| !u.is_empty()),
        detector_labels,
        detector_min_confidence: parsed(
            "DETECTOR_MIN_CONFIDENCE",
            defaults.detector_min_confidence,
        ),
    })
}

fn utc_offset_from_env() -> UtcOffset {
    if let Ok(raw) = std::env::var("APP_UTC_OFFSET") {
        let format = format_description!("[offset_hour sign:mandatory]:[offset_minute]");
        match UtcOffset::parse(raw.trim(), &format) {
            Ok(offset) => return offset,
            Err(e) => warn!(value = %raw, error = %e, "invalid APP_UTC_OFFSET, ignoring"),
        }
    }
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
