//! Turns option state into requests for the generative backend and decodes
//! its answers.
//!
//! Analysis and captions are advisory: any failure is logged and replaced by a
//! fixed fallback. Synthesis is the product, so its failures are returned.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::backend::{
    AnalyzeRequest, BackendError, CaptionRequest, GenerativeBackend, ImageConfig, ModelVariant,
    SynthesizeRequest,
};
use crate::credentials::{ensure_credential, CredentialProvider};
use crate::models::{
    EncodedImage, Language, PostType, Quality, SocialPost, Suggestions, MANDATORY_HASHTAGS,
    SUGGESTIONS_PER_CATEGORY,
};
use crate::options::OptionSelection;
use crate::prompts;

/// Language captions are written in, whatever the display language is.
pub const CAPTION_LANGUAGE: &str = "ms";

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("response is not valid JSON for the schema: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("field {field} has {found} entries, expected {expected}")]
    WrongCount { field: &'static str, found: usize, expected: usize },
    #[error("field {0} is empty")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
#[error("image synthesis failed: {source}")]
pub struct SynthesisError {
    #[from]
    source: BackendError,
}

impl SynthesisError {
    pub fn is_credential_error(&self) -> bool {
        self.source.is_credential_error()
    }
}

#[derive(Clone)]
pub struct Adapter {
    backend: Arc<dyn GenerativeBackend>,
}

impl Adapter {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { backend }
    }

    /// Suggestions for the uploaded image, or the fallback bundle.
    pub async fn analyze(&self, image: &EncodedImage) -> Suggestions {
        let request = AnalyzeRequest { image: image.clone() };
        let outcome = match self.backend.analyze(&request).await {
            Ok(raw) => decode_suggestions(&raw).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(suggestions) => {
                info!("✅ Analysis produced suggestions: {}", suggestions.original_description);
                suggestions
            }
            Err(reason) => {
                warn!("⚠️ Analysis failed, using fallback suggestions: {}", reason);
                Suggestions::fallback()
            }
        }
    }

    pub async fn synthesize(
        &self,
        image: &EncodedImage,
        options: &OptionSelection,
        custom_prompt: &str,
        quality: Quality,
        credentials: &dyn CredentialProvider,
    ) -> Result<EncodedImage, SynthesisError> {
        if quality == Quality::High {
            ensure_credential(credentials).await;
        }

        let request = SynthesizeRequest {
            image: image.clone(),
            prompt_text: prompts::synthesis_prompt(options, custom_prompt),
            model: ModelVariant::from(quality),
            image_config: ImageConfig::for_quality(quality),
        };
        info!(
            "🎯 Synthesizing ({:?}, manual={}) with prompt (truncated): {}",
            quality,
            options.manual_mode,
            &request.prompt_text.chars().take(120).collect::<String>()
        );

        match self.backend.synthesize(&request).await {
            Ok(generated) => {
                info!("✅ Image generated ({}, {} base64 chars)", generated.mime_type, generated.data_base64.len());
                Ok(generated)
            }
            Err(e) => {
                error!("❌ Failed to generate image: {}", e);
                Err(SynthesisError::from(e))
            }
        }
    }

    /// A caption for the generated image in the requested strategy, or the
    /// fallback post. `display_language` does not change the caption language.
    pub async fn generate_caption(
        &self,
        options: &OptionSelection,
        custom_prompt: &str,
        display_language: Language,
        post_type: PostType,
    ) -> SocialPost {
        let context = prompts::caption_context(options, custom_prompt);
        let request = CaptionRequest {
            prompt_text: prompts::caption_prompt(&context, post_type),
            target_language: CAPTION_LANGUAGE,
        };
        info!("✍️ Caption requested: {:?} (display language {:?})", post_type, display_language);

        let outcome = match self.backend.caption(&request).await {
            Ok(raw) => decode_social_post(&raw).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        outcome.unwrap_or_else(|reason| {
            warn!("⚠️ Caption generation failed, using fallback post: {}", reason);
            SocialPost::fallback()
        })
    }
}

/// Model output sometimes arrives wrapped in a markdown fence despite the
/// JSON mime type.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, ContractError> {
    Ok(serde_json::from_str(strip_code_fence(raw))?)
}

pub fn decode_suggestions(raw: &str) -> Result<Suggestions, ContractError> {
    let mut suggestions: Suggestions = decode(raw)?;
    suggestions.original_description = suggestions.original_description.trim().to_string();
    if suggestions.original_description.is_empty() {
        return Err(ContractError::Empty("originalDescription"));
    }
    for list in [
        &mut suggestions.expressions,
        &mut suggestions.clothing,
        &mut suggestions.scenes,
        &mut suggestions.styles,
    ] {
        for label in list.iter_mut() {
            *label = label.trim().to_string();
        }
    }
    for (field, labels) in suggestions.categories() {
        if labels.len() != SUGGESTIONS_PER_CATEGORY {
            return Err(ContractError::WrongCount {
                field,
                found: labels.len(),
                expected: SUGGESTIONS_PER_CATEGORY,
            });
        }
        if labels.iter().any(|l| l.is_empty()) {
            return Err(ContractError::Empty(field));
        }
    }
    Ok(suggestions)
}

pub fn decode_social_post(raw: &str) -> Result<SocialPost, ContractError> {
    let mut post: SocialPost = decode(raw)?;
    post.headline = post.headline.trim().to_string();
    post.content = post.content.trim().to_string();
    if post.headline.is_empty() {
        return Err(ContractError::Empty("headline"));
    }
    if post.content.is_empty() {
        return Err(ContractError::Empty("content"));
    }

    let mut hashtags: Vec<String> = post
        .hashtags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(|tag| if tag.starts_with('#') { tag.to_string() } else { format!("#{tag}") })
        .collect();
    for required in MANDATORY_HASHTAGS {
        if !hashtags.iter().any(|tag| tag.eq_ignore_ascii_case(required)) {
            hashtags.push(required.to_string());
        }
    }
    post.hashtags = hashtags;
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{network_down, sample_image, StubBackend};
    use crate::backend::ImageSize;
    use crate::credentials::testing::FlakyCredentials;
    use crate::credentials::NoCredentialCheck;
    use pretty_assertions::assert_eq;

    fn adapter_with(stub: Arc<StubBackend>) -> Adapter {
        Adapter::new(stub)
    }

    fn guided() -> OptionSelection {
        OptionSelection::seeded(&Suggestions::fallback())
    }

    #[tokio::test]
    async fn valid_analysis_is_decoded() {
        let adapter = adapter_with(Arc::new(StubBackend::default()));
        let suggestions = adapter.analyze(&sample_image()).await;
        assert_eq!(suggestions.original_description, "A woman smiling in a garden.");
        assert_eq!(suggestions.styles[2], "Oil Painting");
    }

    #[tokio::test]
    async fn transport_failure_falls_back() {
        let stub = StubBackend { analysis: network_down, ..StubBackend::default() };
        let suggestions = adapter_with(Arc::new(stub)).analyze(&sample_image()).await;
        assert_eq!(suggestions, Suggestions::fallback());
    }

    #[tokio::test]
    async fn schema_violation_falls_back() {
        fn four_styles() -> Result<String, BackendError> {
            Ok(r#"{"originalDescription":"x","expressions":["a","b","c","d","e"],
                "clothing":["a","b","c","d","e"],"scenes":["a","b","c","d","e"],
                "styles":["a","b","c","d"]}"#
                .to_string())
        }
        let stub = StubBackend { analysis: four_styles, ..StubBackend::default() };
        let suggestions = adapter_with(Arc::new(stub)).analyze(&sample_image()).await;
        assert_eq!(suggestions, Suggestions::fallback());
    }

    #[test]
    fn decode_reports_contract_violations() {
        assert!(matches!(decode_suggestions("not json"), Err(ContractError::Decode(_))));
        let blank = r#"{"originalDescription":"x","expressions":["a","b","c","d"," "],
            "clothing":["a","b","c","d","e"],"scenes":["a","b","c","d","e"],
            "styles":["a","b","c","d","e"]}"#;
        assert!(matches!(decode_suggestions(blank), Err(ContractError::Empty("expressions"))));
        let fenced = format!("```json\n{}\n```", crate::backend::testing::valid_analysis().unwrap());
        assert!(decode_suggestions(&fenced).is_ok());
    }

    #[tokio::test]
    async fn high_quality_requests_pro_model_at_2k() {
        let stub = Arc::new(StubBackend::default());
        let adapter = adapter_with(stub.clone());
        adapter
            .synthesize(&sample_image(), &guided(), "", Quality::High, &NoCredentialCheck)
            .await
            .unwrap();
        adapter
            .synthesize(&sample_image(), &guided(), "", Quality::Standard, &NoCredentialCheck)
            .await
            .unwrap();

        let requests = stub.synth_requests.lock();
        assert_eq!(requests[0].model, ModelVariant::High);
        assert_eq!(requests[0].image_config.image_size, Some(ImageSize::TwoK));
        assert_eq!(requests[1].model, ModelVariant::Standard);
        assert_eq!(requests[1].image_config.image_size, None);
        assert!(requests.iter().all(|r| r.image_config.aspect_ratio == "1:1"));
    }

    #[tokio::test]
    async fn credential_precheck_failure_does_not_block() {
        let stub = Arc::new(StubBackend::default());
        let credentials = FlakyCredentials::new(false);
        let result = adapter_with(stub.clone())
            .synthesize(&sample_image(), &guided(), "", Quality::High, &credentials)
            .await;
        assert!(result.is_ok());
        assert_eq!(credentials.prompt_count(), 1);
        assert_eq!(stub.synth_requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn standard_quality_skips_precheck() {
        let credentials = FlakyCredentials::new(false);
        adapter_with(Arc::new(StubBackend::default()))
            .synthesize(&sample_image(), &guided(), "", Quality::Standard, &credentials)
            .await
            .unwrap();
        assert_eq!(credentials.prompt_count(), 0);
    }

    #[tokio::test]
    async fn synthesis_errors_are_classified_not_defaulted() {
        fn bad_key() -> Result<EncodedImage, BackendError> {
            Err(BackendError::Status { status: 400, body: "API key not valid.".into() })
        }
        let stub = StubBackend { synthesis: bad_key, ..StubBackend::default() };
        let err = adapter_with(Arc::new(stub))
            .synthesize(&sample_image(), &guided(), "", Quality::Standard, &NoCredentialCheck)
            .await
            .unwrap_err();
        assert!(err.is_credential_error());

        let stub = StubBackend { synthesis: network_down, ..StubBackend::default() };
        let err = adapter_with(Arc::new(stub))
            .synthesize(&sample_image(), &guided(), "", Quality::Standard, &NoCredentialCheck)
            .await
            .unwrap_err();
        assert!(!err.is_credential_error());
    }

    #[tokio::test]
    async fn caption_is_deterministic_with_deterministic_backend() {
        let stub = Arc::new(StubBackend::default());
        let adapter = adapter_with(stub.clone());
        let first = adapter.generate_caption(&guided(), "", Language::En, PostType::Meme).await;
        let second = adapter.generate_caption(&guided(), "", Language::En, PostType::Meme).await;
        assert_eq!(first, second);
        assert_eq!(first.headline, "TAK SANGKA!");

        let requests = stub.caption_requests.lock();
        assert_eq!(requests[0].prompt_text, requests[1].prompt_text);
    }

    #[tokio::test]
    async fn caption_language_ignores_display_language() {
        let stub = Arc::new(StubBackend::default());
        let adapter = adapter_with(stub.clone());
        adapter.generate_caption(&guided(), "", Language::En, PostType::Story).await;
        adapter.generate_caption(&guided(), "", Language::Ms, PostType::Story).await;
        let requests = stub.caption_requests.lock();
        assert!(requests.iter().all(|r| r.target_language == "ms"));
        assert_eq!(requests[0].prompt_text, requests[1].prompt_text);
    }

    #[tokio::test]
    async fn caption_failure_falls_back() {
        let stub = StubBackend { caption: network_down, ..StubBackend::default() };
        let post = adapter_with(Arc::new(stub))
            .generate_caption(&guided(), "", Language::Ms, PostType::Tutorial)
            .await;
        assert_eq!(post, SocialPost::fallback());
    }

    #[test]
    fn missing_mandatory_hashtags_are_appended() {
        let post = decode_social_post(
            r##"{"headline":" Tips AI ","content":"Langkah 1...","hashtags":["fbpro","#AI"]}"##,
        )
        .unwrap();
        assert_eq!(post.headline, "Tips AI");
        assert_eq!(post.hashtags, vec!["#fbpro", "#AI", "#wanysaEdutech", "#tipsfbpro"]);
    }
}
