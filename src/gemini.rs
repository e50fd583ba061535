use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::backend::{
    AnalyzeRequest, BackendError, CaptionRequest, GenerativeBackend, ImageConfig, ModelVariant,
    SynthesizeRequest,
};
use crate::config::AppConfig;
use crate::models::{EncodedImage, DEFAULT_IMAGE_MIME};
use crate::prompts::{analysis_schema, caption_schema, ANALYSIS_INSTRUCTION};

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &Value) -> String {
    let mut copy = value.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    text_model: String,
    image_model: String,
    image_pro_model: String,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Other(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_api_base.trim_end_matches('/').to_string(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            image_pro_model: config.image_pro_model.clone(),
        })
    }

    fn redact(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.api_key, "***")
        }
    }

    fn model_for(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Standard => &self.image_model,
            ModelVariant::High => &self.image_pro_model,
        }
    }

    async fn perform_api_call(&self, model: &str, request_body: &Value) -> Result<GeminiResponse, BackendError> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::Credential("GEMINI_API_KEY is not set".into()));
        }

        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, self.api_key);
        info!("🔗 Making request to: {}", self.redact(&url));
        info!("📤 Request body: {}", loggable(request_body));

        let response = self
            .client
            .post(&url)
            .json(request_body)
            .send()
            .await
            .map_err(|e| BackendError::Http(self.redact(&e.to_string())))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response
            .text()
            .await
            .map_err(|e| BackendError::Http(self.redact(&e.to_string())))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(BackendError::Status { status: status.as_u16(), body: response_text });
        }

        let parsed: Value = serde_json::from_str(&response_text)
            .map_err(|e| BackendError::Other(format!("parse error: {e}")))?;
        info!("📥 Raw Gemini API response: {}", loggable(&parsed));

        serde_json::from_value(parsed).map_err(|e| BackendError::Other(format!("parse error: {e}")))
    }

    async fn generate_json(&self, model: &str, contents: Value, schema: Value) -> Result<String, BackendError> {
        let request_body = json!({
            "contents": [contents],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });
        let parsed = self.perform_api_call(model, &request_body).await?;
        extract_text(&parsed).ok_or_else(|| BackendError::Other("No text content found in response".to_string()))
    }
}

fn inline_image_part(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.data_base64
        }
    })
}

fn image_config_json(config: &ImageConfig) -> Value {
    let mut value = json!({ "aspectRatio": config.aspect_ratio });
    if let Some(size) = config.image_size {
        value["imageSize"] = json!(size.as_str());
    }
    value
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn analyze(&self, req: &AnalyzeRequest) -> Result<String, BackendError> {
        info!("🔍 Analyzing reference image ({})", req.image.mime_type);
        let contents = json!({
            "parts": [inline_image_part(&req.image), { "text": ANALYSIS_INSTRUCTION }]
        });
        self.generate_json(&self.text_model, contents, analysis_schema()).await
    }

    async fn synthesize(&self, req: &SynthesizeRequest) -> Result<EncodedImage, BackendError> {
        let model = self.model_for(req.model);
        info!("🎨 Generating image with {} ({:?})", model, req.image_config);
        let request_body = json!({
            "contents": [{
                "parts": [inline_image_part(&req.image), { "text": req.prompt_text }]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": image_config_json(&req.image_config)
            }
        });
        let parsed = self.perform_api_call(model, &request_body).await?;
        match extract_first_image(&parsed) {
            Some(image) => Ok(image),
            None => {
                if let Some(text) = extract_text(&parsed) {
                    warn!("⚠️ Model answered with text instead of an image: {}", text);
                }
                Err(BackendError::NoImage)
            }
        }
    }

    async fn caption(&self, req: &CaptionRequest) -> Result<String, BackendError> {
        info!("✍️ Generating caption in '{}'", req.target_language);
        let contents = json!({ "parts": [{ "text": req.prompt_text }] });
        self.generate_json(&self.text_model, contents, caption_schema()).await
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    #[allow(dead_code)]
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(default)]
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
}

fn extract_first_image(resp: &GeminiResponse) -> Option<EncodedImage> {
    resp.candidates
        .iter()
        .flat_map(|c| c.content.parts.iter())
        .find_map(|p| match p {
            Part::Inline { inline_data } if !inline_data.data.is_empty() => {
                let mime_type = inline_data
                    .mime_type
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
                info!("🎯 Found image data with mime type: {}", mime_type);
                Some(EncodedImage { mime_type, data_base64: inline_data.data.clone() })
            }
            _ => None,
        })
}

fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let text: String = resp
        .candidates
        .first()?
        .content
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ImageSize;
    use pretty_assertions::assert_eq;

    #[test]
    fn long_base64_is_truncated_for_logs() {
        let body = json!({ "parts": [{ "inlineData": { "mimeType": "image/png", "data": "A".repeat(500) } }] });
        let logged = loggable(&body);
        assert!(logged.contains("[truncated 450 chars]"));
        assert!(logged.len() < 200);
    }

    #[test]
    fn image_part_is_extracted_with_default_mime() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "data": "iVBORw0KGgo=" } }
            ] } }]
        }))
        .unwrap();
        let image = extract_first_image(&resp).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data_base64, "iVBORw0KGgo=");
        assert_eq!(extract_text(&resp).as_deref(), Some("here you go"));
    }

    #[test]
    fn response_without_image_yields_none() {
        let resp: GeminiResponse =
            serde_json::from_value(json!({ "candidates": [{ "content": { "parts": [{ "text": "blocked" }] } }] }))
                .unwrap();
        assert!(extract_first_image(&resp).is_none());
        let empty: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(extract_text(&empty).is_none());
    }

    #[test]
    fn image_config_only_sends_size_when_set() {
        let standard = ImageConfig { aspect_ratio: "1:1", image_size: None };
        assert_eq!(image_config_json(&standard), json!({ "aspectRatio": "1:1" }));
        let high = ImageConfig { aspect_ratio: "1:1", image_size: Some(ImageSize::TwoK) };
        assert_eq!(image_config_json(&high), json!({ "aspectRatio": "1:1", "imageSize": "2K" }));
    }

    #[tokio::test]
    async fn missing_key_is_a_credential_error() {
        let config = AppConfig { gemini_api_key: String::new(), ..AppConfig::default() };
        let client = GeminiClient::new(&config).unwrap();
        let err = client
            .caption(&CaptionRequest { prompt_text: "hi".into(), target_language: "ms" })
            .await
            .unwrap_err();
        assert!(err.is_credential_error());
    }
}
