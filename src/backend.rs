use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EncodedImage, Quality};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("missing or invalid API key: {0}")]
    Credential(String),
    #[error("no image data in response")]
    NoImage,
    #[error("Other: {0}")]
    Other(String),
}

impl BackendError {
    /// Whether the failure comes from a missing, invalid or unauthorized
    /// credential rather than from the request itself.
    pub fn is_credential_error(&self) -> bool {
        match self {
            BackendError::Credential(_) => true,
            BackendError::Status { status, body } => {
                *status == 401 || *status == 403 || mentions_api_key(body)
            }
            BackendError::Http(msg) | BackendError::Other(msg) => mentions_api_key(msg),
            BackendError::NoImage => false,
        }
    }
}

fn mentions_api_key(text: &str) -> bool {
    text.contains("API key") || text.contains("API_KEY_INVALID")
}

/// Image model used for synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    Standard,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    TwoK,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::TwoK => "2K",
        }
    }
}

pub const SQUARE_ASPECT_RATIO: &str = "1:1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub aspect_ratio: &'static str,
    /// `None` leaves the size to the model default.
    pub image_size: Option<ImageSize>,
}

impl ImageConfig {
    pub fn for_quality(quality: Quality) -> Self {
        let image_size = match quality {
            Quality::High => Some(ImageSize::TwoK),
            Quality::Standard => None,
        };
        Self { aspect_ratio: SQUARE_ASPECT_RATIO, image_size }
    }
}

impl From<Quality> for ModelVariant {
    fn from(quality: Quality) -> Self {
        match quality {
            Quality::Standard => ModelVariant::Standard,
            Quality::High => ModelVariant::High,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub image: EncodedImage,
}

#[derive(Debug, Clone)]
pub struct SynthesizeRequest {
    pub image: EncodedImage,
    pub prompt_text: String,
    pub model: ModelVariant,
    pub image_config: ImageConfig,
}

#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub prompt_text: String,
    /// Language the caption must be written in, e.g. "ms".
    pub target_language: &'static str,
}

/// The remote generative service. Analysis and caption calls return the raw
/// JSON text produced under their response schema; validation happens in the
/// adapter.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn analyze(&self, req: &AnalyzeRequest) -> Result<String, BackendError>;
    async fn synthesize(&self, req: &SynthesizeRequest) -> Result<EncodedImage, BackendError>;
    async fn caption(&self, req: &CaptionRequest) -> Result<String, BackendError>;
}
