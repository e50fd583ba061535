use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mime type assumed when the backend returns image data without one.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Hashtags every caption must end with.
pub const MANDATORY_HASHTAGS: [&str; 3] = ["#wanysaEdutech", "#fbpro", "#tipsfbpro"];

/// Number of labels offered per suggestion category.
pub const SUGGESTIONS_PER_CATEGORY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Upload,
    Analyzing,
    OptionSelection,
    Generating,
    Result,
}

/// Display language of the UI. Captions are always written in Malay no matter
/// which one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ms,
}

impl Language {
    pub fn toggled(self) -> Self {
        match self {
            Language::En => Language::Ms,
            Language::Ms => Language::En,
        }
    }

    /// Label shown for the "no accessory" choice.
    pub fn no_accessory_label(self) -> &'static str {
        match self {
            Language::En => "None",
            Language::Ms => "Tiada",
        }
    }

    /// Headscarf styles offered besides the analysis suggestions. The first
    /// entry is the "no accessory" choice.
    pub fn accessory_presets(self) -> [&'static str; 6] {
        [self.no_accessory_label(), "Bawal", "Shawl", "Sarung", "Turban", "Instant"]
    }

    pub fn color_presets(self) -> [&'static str; 7] {
        match self {
            Language::En => ["Black", "White", "Red", "Blue", "Gold", "Pastel", "Neon"],
            Language::Ms => ["Hitam", "Putih", "Merah", "Biru", "Emas", "Pastel", "Neon"],
        }
    }

    pub fn invalid_upload_message(self) -> &'static str {
        match self {
            Language::En => "Please drop a valid image file.",
            Language::Ms => "Sila masukkan fail imej yang sah.",
        }
    }

    pub fn analysis_failed_message(self) -> &'static str {
        match self {
            Language::En => "Failed to analyze image. Please try another photo.",
            Language::Ms => "Gagal menganalisis imej. Sila cuba gambar lain.",
        }
    }

    pub fn generation_failed_message(self) -> &'static str {
        match self {
            Language::En => {
                "Failed to generate image. The model might be busy or the request was blocked."
            }
            Language::Ms => {
                "Gagal menjana imej. Model mungkin sibuk atau permintaan telah disekat."
            }
        }
    }

    pub fn credential_failed_message(self) -> &'static str {
        match self {
            Language::En => {
                "Invalid API Key. High Quality mode requires a valid API key linked to a billing project."
            }
            Language::Ms => {
                "Kunci API tidak sah. Mod Kualiti Tinggi memerlukan kunci API yang sah dan dipautkan kepada projek berbayar."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    High,
}

/// Caption strategies offered once an image has been generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Reaction,
    Tutorial,
    Story,
    Corporate,
    Meme,
}

impl PostType {
    pub const ALL: [PostType; 5] = [
        PostType::Reaction,
        PostType::Tutorial,
        PostType::Story,
        PostType::Corporate,
        PostType::Meme,
    ];

    pub fn title(self) -> &'static str {
        match self {
            PostType::Reaction => "Big Text + Reaction Photo",
            PostType::Tutorial => "Mini Tutorial Card",
            PostType::Story => "Situational Story Photo",
            PostType::Corporate => "Clean Corporate Statement",
            PostType::Meme => "Silent Meme Style",
        }
    }

    pub fn use_case(self) -> &'static str {
        match self {
            PostType::Reaction => "Awareness, call-out, tip ringkas.",
            PostType::Tutorial => "Saveable content, naik reach stabil.",
            PostType::Story => "Tingkatkan komen & engagement.",
            PostType::Corporate => "Branding, trust, sharing tinggi.",
            PostType::Meme => "Engagement laju, humor ringan.",
        }
    }
}

/// An image as carried between the browser, the session and the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data_base64: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("empty image payload")]
    Empty,
    #[error("unrecognized image data")]
    Unrecognized,
}

impl EncodedImage {
    /// Encodes raw upload bytes. The mime type is sniffed from the bytes when
    /// the format is known; otherwise a declared `image/*` type is trusted so
    /// formats like HEIC or SVG still reach the backend.
    pub fn from_bytes(bytes: &[u8], declared_mime: &str) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        let declared = declared_mime.trim().to_ascii_lowercase();
        let sniffed = image::guess_format(bytes)
            .ok()
            .map(|format| format.to_mime_type())
            .filter(|mime| mime.starts_with("image/"));
        let mime_type = match sniffed {
            Some(mime) => mime.to_string(),
            None if declared.starts_with("image/") => declared,
            None => return Err(ImageError::Unrecognized),
        };
        Ok(Self {
            mime_type,
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data_base64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    pub original_description: String,
    pub expressions: Vec<String>,
    pub clothing: Vec<String>,
    pub scenes: Vec<String>,
    pub styles: Vec<String>,
}

impl Suggestions {
    /// Bundle used whenever analysis cannot produce a valid answer.
    pub fn fallback() -> Self {
        fn labels(items: [&str; SUGGESTIONS_PER_CATEGORY]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            original_description: "A portrait of a person.".to_string(),
            expressions: labels(["Happy", "Serious", "Surprised", "Cool", "Neutral"]),
            clothing: labels(["Casual", "Formal", "Fantasy", "Sci-Fi", "Sporty"]),
            scenes: labels(["Park", "Office", "Space", "City", "Studio"]),
            styles: labels(["Realistic", "Cartoon", "Sketch", "Painting", "Digital Art"]),
        }
    }

    pub fn categories(&self) -> [(&'static str, &[String]); 4] {
        [
            ("expressions", self.expressions.as_slice()),
            ("clothing", self.clothing.as_slice()),
            ("scenes", self.scenes.as_slice()),
            ("styles", self.styles.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub headline: String,
    pub content: String,
    pub hashtags: Vec<String>,
}

impl SocialPost {
    pub fn fallback() -> Self {
        Self {
            headline: "Jom Monetize FB! 🚀".to_string(),
            content: "Gambar ini menunjukkan betapa mudahnya kita boleh hasilkan konten berkualiti dengan AI. Jom belajar cara buat duit dengan FB Pro sekarang!".to_string(),
            hashtags: MANDATORY_HASHTAGS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Text ready to paste into a post.
    pub fn full_text(&self) -> String {
        format!("{}\n\n{}\n\n{}", self.headline, self.content, self.hashtags.join(" "))
    }
}
