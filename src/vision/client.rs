use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{VisionConfig, VisionProvider};

/// A multimodal chat model that answers a prompt about one image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Generated text for `instruction` applied to a base64 PNG.
    async fn complete(&self, instruction: &str, png_b64: &str) -> anyhow::Result<String>;
}

pub fn model_from_config(
    cfg: &VisionConfig,
    http: reqwest::Client,
) -> anyhow::Result<Box<dyn VisionModel>> {
    Ok(match cfg.provider {
        VisionProvider::Ollama => Box::new(OllamaClient {
            http,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            num_predict: cfg.num_predict,
        }),
        VisionProvider::OpenAi => Box::new(OpenAiClient {
            http,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("openai provider needs an API key"))?,
            temperature: cfg.temperature,
            max_output_tokens: cfg.num_predict,
        }),
    })
}

// --- local Ollama /api/chat ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatReply>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

pub struct OllamaClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    num_predict: u32,
}

impl OllamaClient {
    fn request<'a>(&'a self, instruction: &'a str, png_b64: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            stream: false,
            messages: vec![ChatMessage {
                role: "user",
                content: instruction,
                images: vec![png_b64],
            }],
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
        }
    }
}

#[async_trait]
impl VisionModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, instruction: &str, png_b64: &str) -> anyhow::Result<String> {
        let resp: ChatResponse = self
            .http
            .post(&self.endpoint)
            .json(&self.request(instruction, png_b64))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = resp.error {
            anyhow::bail!("model error: {err}");
        }
        resp.message
            .map(|m| m.content)
            .ok_or_else(|| anyhow::anyhow!("response has no message"))
    }
}

// --- OpenAI Responses API ---

pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl OpenAiClient {
    fn request(&self, instruction: &str, png_b64: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_output_tokens": self.max_output_tokens,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": instruction },
                    { "type": "input_image", "image_url": format!("data:image/png;base64,{png_b64}") },
                ],
            }],
        })
    }
}

/// Concatenated `output_text` parts of a Responses API payload.
fn responses_output_text(body: &Value) -> Option<String> {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let text: String = body
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl VisionModel for OpenAiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, instruction: &str, png_b64: &str) -> anyhow::Result<String> {
        let body: Value = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(instruction, png_b64))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        responses_output_text(&body).ok_or_else(|| anyhow::anyhow!("response has no output text"))
    }
}
