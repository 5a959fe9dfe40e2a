//! Food photo analysis: downscale, optional plate crop, remote multimodal model.

pub mod client;
pub mod detector;
pub mod image_prep;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::VisionConfig;
pub use client::VisionModel;
pub use detector::{Detection, PlateDetector, PlateFilter};

/// Fixed instruction sent along with every image.
pub const INSTRUCTION: &str = "Analyze the food in the image and return ONLY a valid JSON object.\n\
Use STRICT JSON rules:\n\
- Only double quotes.\n\
- No comments.\n\
- No text outside JSON.\n\
Return exactly this structure:\n\
{\n\
  \"ingredients\": [\n\
    {\n\
      \"name\": \"ingredient_name\",\n\
      \"calories\": estimated_kcal,\n\
      \"protein\": grams_of_protein,\n\
      \"carbs\": grams_of_carbs,\n\
      \"fat\": grams_of_fat\n\
    }\n\
  ],\n\
  \"dish_name\": \"general category\",\n\
  \"total_calories\": total_kcal,\n\
  \"total_protein\": total_protein_grams,\n\
  \"total_carbs\": total_carbs_grams,\n\
  \"total_fat\": total_fat_grams\n\
}\n\
Be realistic with estimates. Output ONLY the JSON.";

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("unreadable image: {0}")]
    Image(#[from] image::ImageError),

    #[error("image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Model text, or a description of why the call failed.
    pub raw: String,
    /// The downscaled, uncropped image as base64 PNG.
    pub image_png_b64: String,
    /// The plate region the model was shown, if one was found.
    pub plate: Option<Detection>,
    /// True when `raw` describes a transport failure rather than model output.
    pub degraded: bool,
}

pub struct VisionAnalyzer {
    model: Arc<dyn VisionModel>,
    detector: Option<Arc<dyn PlateDetector>>,
    filter: PlateFilter,
    max_edge: u32,
}

impl VisionAnalyzer {
    pub fn new(model: Arc<dyn VisionModel>, max_edge: u32) -> Self {
        Self {
            model,
            detector: None,
            filter: PlateFilter::default(),
            max_edge,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn PlateDetector>, filter: PlateFilter) -> Self {
        self.detector = Some(detector);
        self.filter = filter;
        self
    }

    pub fn from_config(cfg: &VisionConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        let model: Arc<dyn VisionModel> = client::model_from_config(cfg, http.clone())?.into();
        let mut analyzer = Self::new(model, cfg.max_edge);
        if let Some(url) = &cfg.detector_url {
            analyzer = analyzer.with_detector(
                Arc::new(detector::HttpDetector::new(http, url.clone())),
                PlateFilter {
                    labels: cfg.detector_labels.clone(),
                    min_confidence: cfg.detector_min_confidence,
                },
            );
        }
        info!(
            model = analyzer.model.name(),
            detector = analyzer.detector.is_some(),
            max_edge = analyzer.max_edge,
            "vision analyzer ready"
        );
        Ok(analyzer)
    }

    /// Runs the whole pipeline. Only an unreadable upload is an error; remote
    /// failures come back as a degraded `raw` string.
    #[instrument(skip_all, fields(bytes = upload.len()))]
    pub async fn analyze(&self, upload: Vec<u8>) -> Result<AnalysisOutcome, VisionError> {
        let max_edge = self.max_edge;
        let (full, image_png_b64) =
            tokio::task::spawn_blocking(move || -> Result<_, VisionError> {
                let full = image_prep::downscale(image_prep::decode(&upload)?, max_edge);
                let b64 = image_prep::to_base64_png(&full)?;
                Ok((full, b64))
            })
            .await??;

        let (sent_b64, plate) = match self.locate_plate(&image_png_b64).await {
            Some(plate) => {
                let region = plate.clone();
                let cropped = tokio::task::spawn_blocking(move || {
                    image_prep::crop(&full, &region)
                        .map(|img| image_prep::to_base64_png(&img))
                        .transpose()
                })
                .await??;
                match cropped {
                    Some(b64) => (b64, Some(plate)),
                    None => {
                        debug!(label = %plate.label, "plate outside the image, using full image");
                        (image_png_b64.clone(), None)
                    }
                }
            }
            None => (image_png_b64.clone(), None),
        };

        let (raw, degraded) = match self.model.complete(INSTRUCTION, &sent_b64).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(error = %e, model = self.model.name(), "vision request failed");
                (describe_failure(&e), true)
            }
        };
        debug!(degraded, chars = raw.len(), "vision response received");

        Ok(AnalysisOutcome {
            raw,
            image_png_b64,
            plate,
            degraded,
        })
    }

    async fn locate_plate(&self, full_b64: &str) -> Option<Detection> {
        let detector = self.detector.as_ref()?;
        let detections = match detector.detect(full_b64).await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "plate detection failed, using full image");
                return None;
            }
        };
        let plate = detector::select_plate(&detections, &self.filter)?.clone();
        debug!(label = %plate.label, area = plate.area(), "plate selected");
        Some(plate)
    }
}

/// Failure text that cannot be mistaken for a JSON object.
fn describe_failure(err: &anyhow::Error) -> String {
    format!("vision request failed: {err:#}")
        .replace('{', "(")
        .replace('}', ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::parser::parse_model_output;
    use async_trait::async_trait;
    use image::GenericImageView;
    use std::sync::Mutex;

    /// Records the image it was shown and answers with a canned reply.
    struct CannedModel {
        reply: Result<String, String>,
        seen: Mutex<Option<String>>,
    }

    impl CannedModel {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.into()),
                seen: Mutex::new(None),
            }
        }

        fn failing(msg: &str) -> Self {
            Self {
                reply: Err(msg.into()),
                seen: Mutex::new(None),
            }
        }

        fn seen_dimensions(&self) -> (u32, u32) {
            use base64::Engine;
            let b64 = self.seen.lock().unwrap().clone().expect("model was called");
            let bytes = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
            image_prep::decode(&bytes).unwrap().dimensions()
        }
    }

    #[async_trait]
    impl VisionModel for CannedModel {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, instruction: &str, png_b64: &str) -> anyhow::Result<String> {
            assert_eq!(instruction, INSTRUCTION);
            *self.seen.lock().unwrap() = Some(png_b64.to_string());
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    struct FixedDetector(anyhow::Result<Vec<Detection>>);

    #[async_trait]
    impl PlateDetector for FixedDetector {
        async fn detect(&self, _png_b64: &str) -> anyhow::Result<Vec<Detection>> {
            match &self.0 {
                Ok(d) => Ok(d.clone()),
                Err(e) => Err(anyhow::anyhow!(e.to_string())),
            }
        }
    }

    fn plate(label: &str, x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection {
            label: label.into(),
            confidence: 0.9,
            x,
            y,
            width: w,
            height: h,
        }
    }

    #[tokio::test]
    async fn without_detector_full_downscaled_image_is_sent() {
        let model = Arc::new(CannedModel::ok("{}"));
        let analyzer = VisionAnalyzer::new(model.clone(), 512);

        let out = analyzer.analyze(image_prep::blank_png(1024, 768)).await.unwrap();
        assert_eq!(out.raw, "{}");
        assert!(!out.degraded);
        assert!(out.plate.is_none());
        assert_eq!(model.seen_dimensions(), (512, 384));
    }

    #[tokio::test]
    async fn largest_plate_is_cropped() {
        let model = Arc::new(CannedModel::ok("{}"));
        let detector = FixedDetector(Ok(vec![
            plate("bowl", 0.0, 0.0, 40.0, 25.0),
            plate("plate", 100.0, 50.0, 80.0, 50.0),
            plate("person", 0.0, 0.0, 400.0, 300.0),
        ]));
        let analyzer = VisionAnalyzer::new(model.clone(), 512)
            .with_detector(Arc::new(detector), PlateFilter::default());

        let out = analyzer.analyze(image_prep::blank_png(400, 300)).await.unwrap();
        assert_eq!(out.plate.unwrap().label, "plate");
        assert_eq!(model.seen_dimensions(), (80, 50));

        // history keeps the uncropped picture
        use base64::Engine;
        let stored = base64::engine::general_purpose::STANDARD
            .decode(&out.image_png_b64)
            .unwrap();
        assert_eq!(image_prep::decode(&stored).unwrap().dimensions(), (400, 300));
    }

    #[tokio::test]
    async fn plate_outside_the_image_falls_back_to_full_image() {
        let model = Arc::new(CannedModel::ok("{}"));
        let detector = FixedDetector(Ok(vec![plate("plate", 500.0, 500.0, 80.0, 50.0)]));
        let analyzer = VisionAnalyzer::new(model.clone(), 512)
            .with_detector(Arc::new(detector), PlateFilter::default());

        let out = analyzer.analyze(image_prep::blank_png(64, 32)).await.unwrap();
        assert!(out.plate.is_none());
        assert_eq!(model.seen_dimensions(), (64, 32));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn pipeline_runs_on_a_single_threaded_runtime() {
        let model = Arc::new(CannedModel::ok("{}"));
        let detector = FixedDetector(Ok(vec![plate("bowl", 10.0, 10.0, 30.0, 20.0)]));
        let analyzer = VisionAnalyzer::new(model.clone(), 512)
            .with_detector(Arc::new(detector), PlateFilter::default());

        let out = analyzer.analyze(image_prep::blank_png(128, 96)).await.unwrap();
        assert_eq!(out.plate.unwrap().label, "bowl");
        assert_eq!(model.seen_dimensions(), (30, 20));
    }

    #[tokio::test]
    async fn detector_failure_falls_back_to_full_image() {
        let model = Arc::new(CannedModel::ok("{}"));
        let analyzer = VisionAnalyzer::new(model.clone(), 512).with_detector(
            Arc::new(FixedDetector(Err(anyhow::anyhow!("connection refused")))),
            PlateFilter::default(),
        );
        let out = analyzer.analyze(image_prep::blank_png(64, 32)).await.unwrap();
        assert!(out.plate.is_none());
        assert_eq!(model.seen_dimensions(), (64, 32));
    }

    #[tokio::test]
    async fn remote_failure_degrades_to_unparseable_text() {
        let model = Arc::new(CannedModel::failing(r#"503 {"error": "overloaded"}"#));
        let analyzer = VisionAnalyzer::new(model, 512);

        let out = analyzer.analyze(image_prep::blank_png(32, 32)).await.unwrap();
        assert!(out.degraded);
        assert!(out.raw.starts_with("vision request failed"));
        assert!(out.raw.contains("overloaded"));
        assert!(parse_model_output(&out.raw).is_err());
    }

    #[tokio::test]
    async fn unreadable_upload_is_an_error() {
        let analyzer = VisionAnalyzer::new(Arc::new(CannedModel::ok("{}")), 512);
        let err = analyzer.analyze(b"not an image".to_vec()).await.unwrap_err();
        assert!(matches!(err, VisionError::Image(_)));
    }
}
