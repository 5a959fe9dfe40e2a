use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One object found by the detector, in pixel coordinates of the sent image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Which detections count as a plate.
#[derive(Debug, Clone)]
pub struct PlateFilter {
    pub labels: Vec<String>,
    pub min_confidence: f32,
}

impl Default for PlateFilter {
    fn default() -> Self {
        Self {
            labels: vec!["bowl".into(), "plate".into()],
            min_confidence: 0.0,
        }
    }
}

impl PlateFilter {
    fn allows(&self, d: &Detection) -> bool {
        d.confidence >= self.min_confidence
            && self.labels.iter().any(|l| l.eq_ignore_ascii_case(&d.label))
    }
}

/// Largest allowed box by area; the earliest one wins a tie.
pub fn select_plate<'a>(detections: &'a [Detection], filter: &PlateFilter) -> Option<&'a Detection> {
    detections
        .iter()
        .filter(|d| filter.allows(d))
        .fold(None, |best: Option<&Detection>, d| match best {
            Some(b) if b.area() >= d.area() => Some(b),
            _ => Some(d),
        })
}

#[async_trait]
pub trait PlateDetector: Send + Sync {
    async fn detect(&self, png_b64: &str) -> anyhow::Result<Vec<Detection>>;
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Object-detection sidecar reached over HTTP.
pub struct HttpDetector {
    http: reqwest::Client,
    url: String,
}

impl HttpDetector {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PlateDetector for HttpDetector {
    async fn detect(&self, png_b64: &str) -> anyhow::Result<Vec<Detection>> {
        let body: DetectResponse = self
            .http
            .post(&self.url)
            .json(&json!({ "image": png_b64 }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.detections)
    }
}
