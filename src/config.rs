use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    /// Model for image analysis and captions.
    pub text_model: String,
    pub image_model: String,
    pub image_pro_model: String,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    /// Sessions idle for longer than this are dropped.
    pub session_ttl_secs: u64,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            image_pro_model: "gemini-3-pro-image-preview".to_string(),
            request_timeout_secs: 120,
            max_upload_bytes: 5 * 1024 * 1024,
            session_ttl_secs: 60 * 60,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or(default)
        };
        Ok(Self {
            gemini_api_key: lookup("GEMINI_API_KEY").unwrap_or_default().trim().to_string(),
            gemini_api_base: text("GEMINI_API_BASE", defaults.gemini_api_base),
            text_model: text("GEMINI_TEXT_MODEL", defaults.text_model),
            image_model: text("GEMINI_IMAGE_MODEL", defaults.image_model),
            image_pro_model: text("GEMINI_IMAGE_PRO_MODEL", defaults.image_pro_model),
            request_timeout_secs: parsed(&lookup, "GEMINI_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            session_ttl_secs: parsed(&lookup, "SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            port: parsed(&lookup, "PORT", defaults.port)?,
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
