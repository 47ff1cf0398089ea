use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::artifacts::ScratchDir;
use crate::layout::{LayoutStyle, Orientation, MAX_IMAGES_PER_PAGE};
use crate::models::{Analysis, GENERIC_PROMPTS};
use crate::random::RandomSource;

pub const DEFAULT_API_BASE: &str = "https://api.together.xyz/v1";
const COMPLETION_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free";
const IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-schnell";
const SEED_RANGE: usize = 1_000_000;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Together API key not configured")]
    Configuration,
    #[error("{0}")]
    Validation(&'static str),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("{0}")]
    Processing(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub b64_json: String,
    pub saved_to_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: Analysis,
    pub saved_to_file: PathBuf,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GatewayError>;
}

#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze_text(&self, text: &str) -> Result<AnalysisOutcome, GatewayError>;
}

fn preview(data: &str) -> String {
    if data.len() > 50 {
        format!("{}...[{} chars total]", data.get(..50).unwrap_or(data), data.len())
    } else {
        data.to_string()
    }
}

// Long base64 strings make upstream responses unreadable in logs.
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                *s = format!("{}...[truncated {} chars]", &s[..50], s.len() - 50);
            }
        }
        Value::Object(map) => map.values_mut().for_each(truncate_base64_in_json),
        Value::Array(arr) => arr.iter_mut().for_each(truncate_base64_in_json),
        _ => {}
    }
}

fn analysis_prompt(text: &str) -> String {
    format!(
        "<s>[INST] You are an expert document analyzer. Analyze the following text and provide a JSON response with:
1. enhancedText: Enhanced version with proper markdown formatting and structure
2. imagePrompts: Array of 3-4 relevant image prompts that capture key themes (these will be used with FLUX.1 image model)
3. recommendedStyle: Layout style (modern, classic, magazine)
4. recommendedImagesPerPage: Number of images per page (1-3)
5. recommendedOrientation: Page orientation (portrait, landscape)

Text to analyze:
{text}

Provide your response in valid JSON format. [/INST]</s>"
    )
}

/// Completion answer as the model wrote it; every field may be missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    enhanced_text: Option<String>,
    image_prompts: Option<Vec<String>>,
    recommended_style: Option<String>,
    recommended_images_per_page: Option<Value>,
    recommended_orientation: Option<String>,
}

impl RawAnalysis {
    fn normalize(self, original: &str) -> Analysis {
        let images_per_page = self
            .recommended_images_per_page
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
            .map(|n| (n as usize).min(MAX_IMAGES_PER_PAGE))
            .filter(|n| *n > 0)
            .unwrap_or(1);
        Analysis {
            enhanced_text: self.enhanced_text.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| original.to_string()),
            image_prompts: self
                .image_prompts
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| GENERIC_PROMPTS.iter().map(|p| p.to_string()).collect()),
            recommended_style: self.recommended_style.as_deref().map(LayoutStyle::from_name).unwrap_or_default(),
            recommended_images_per_page: images_per_page,
            recommended_orientation: self.recommended_orientation.as_deref().map(Orientation::from_name).unwrap_or_default(),
        }
    }
}

fn parse_analysis(completion: &Value, original: &str) -> Result<Analysis, GatewayError> {
    let content = completion
        .pointer("/choices/0/text")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| GatewayError::Processing("Empty response from Together API".into()))?;
    let raw: RawAnalysis = serde_json::from_str(content.trim())
        .map_err(|e| GatewayError::Processing(format!("Malformed analysis JSON: {e}")))?;
    Ok(raw.normalize(original))
}

fn upstream_message(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(Value::as_str)))
        .or_else(|| body.get("message").and_then(Value::as_str))
        .unwrap_or("Failed to generate image")
        .to_string()
}

fn extract_image(body: &Value) -> Result<String, GatewayError> {
    let output = body
        .get("output")
        .and_then(Value::as_array)
        .filter(|o| !o.is_empty())
        .ok_or_else(|| GatewayError::Processing("Invalid response format from Together API".into()))?;
    output[0]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Processing("Invalid image data received".into()))
}

pub struct TogetherClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    scratch: ScratchDir,
    seeds: Mutex<StdRng>,
}

impl TogetherClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, scratch: ScratchDir) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scratch,
            seeds: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fixes the image seed sequence.
    #[cfg(test)]
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seeds: Mutex::new(StdRng::seed_from_u64(seed)), ..self }
    }

    pub fn is_configured(&self) -> bool { self.api_key.is_some() }

    fn key(&self) -> Result<&str, GatewayError> {
        self.api_key.as_deref().ok_or(GatewayError::Configuration)
    }

    async fn complete(&self, key: &str, prompt: String) -> Result<Value, GatewayError> {
        let url = format!("{}/completions", self.base_url);
        info!("🔗 Requesting text analysis from: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&json!({
                "model": COMPLETION_MODEL,
                "prompt": prompt,
                "max_tokens": 2000,
                "temperature": 0.7,
                "top_p": 0.7,
                "top_k": 50,
                "repetition_penalty": 1,
                "response_format": { "type": "json_object" }
            }))
            .send()
            .await?;

        let status = response.status();
        info!("📥 Response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Text analysis failed with status {}: {}", status, body);
            return Err(GatewayError::Processing("Failed to analyze text with Together API".into()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::Processing(format!("parse error: {e}")))
    }

    pub async fn analyze_text(&self, text: &str) -> Result<AnalysisOutcome, GatewayError> {
        let key = self.key()?;
        if text.is_empty() {
            return Err(GatewayError::Validation("Invalid text provided"));
        }

        let completion = self.complete(key, analysis_prompt(text)).await?;
        let analysis = parse_analysis(&completion, text)?;
        info!(
            "✅ Analysis ready: {} chars, {} prompts, style {}",
            analysis.enhanced_text.len(),
            analysis.image_prompts.len(),
            analysis.recommended_style.as_str()
        );

        let saved_to_file = self.scratch.save_analysis(text, &analysis).await;
        Ok(AnalysisOutcome { analysis, saved_to_file })
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GatewayError> {
        let key = self.key()?;
        if prompt.is_empty() {
            return Err(GatewayError::Validation("Invalid prompt provided"));
        }

        let seed = self.seeds.lock().below(SEED_RANGE);
        let url = format!("{}/images/generation", self.base_url);
        info!("🎯 Generating image (seed {}) for prompt: {}", seed, prompt.chars().take(100).collect::<String>());

        let request_body = json!({
            "model": IMAGE_MODEL,
            "prompt": prompt,
            "n": 1,
            "steps": 20,
            "width": 1024,
            "height": 1024,
            "seed": seed,
            "scheduler": "euler_a",
            "guidance_scale": 7.5
        });

        let response = self.client.post(&url).bearer_auth(key).json(&request_body).send().await?;
        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await?;
        let mut body: Value = serde_json::from_str(&response_text).map_err(|e| {
            error!("❌ Unparseable image response: {}", e);
            GatewayError::Processing("Invalid response from Together API".into())
        })?;

        if !status.is_success() {
            let message = upstream_message(&body);
            error!("❌ Image API error {}: {}", status, message);
            return Err(GatewayError::Upstream { status: status.as_u16(), message });
        }

        let b64_json = match extract_image(&body) {
            Ok(data) => data,
            Err(e) => {
                truncate_base64_in_json(&mut body);
                error!("❌ {}: {}", e, body);
                return Err(e);
            }
        };
        info!("🖼️ Generated image: {}", preview(&b64_json));

        let saved_to_file = self.scratch.save_image(prompt, &b64_json).await;
        Ok(GeneratedImage { b64_json, saved_to_file })
    }
}

#[async_trait]
impl ImageGenerator for TogetherClient {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, GatewayError> {
        TogetherClient::generate_image(self, prompt).await
    }
}

#[async_trait]
impl TextAnalyzer for TogetherClient {
    async fn analyze_text(&self, text: &str) -> Result<AnalysisOutcome, GatewayError> {
        TogetherClient::analyze_text(self, text).await
    }
}
