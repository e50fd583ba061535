//! Natural-language prompts and response schemas for the three remote calls.

use serde_json::{json, Value};

use crate::models::{PostType, MANDATORY_HASHTAGS};
use crate::options::OptionSelection;

pub const ANALYSIS_INSTRUCTION: &str = "Analyze this image. I want to generate variations of this subject. Provide a brief description of the original image, and then provide creative suggestions for facial expressions, clothing, background scenes, and art styles that would work well with this subject image.";

const VIRAL_BLOCK: &str = " MAKE THIS IMAGE EXTRAORDINARY AND VIRAL. Use cinematic lighting, 8k resolution, highly detailed, trending on ArtStation, masterpiece quality, rare and unique composition, dramatic atmosphere, stunning visuals.";

/// Schema the analysis response has to follow.
pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "originalDescription": {
                "type": "STRING",
                "description": "A concise 1-2 sentence description of the original image context, subject, and setting."
            },
            "expressions": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "5 distinct facial expressions suitable for the subject (e.g., 'Heroic Smile', 'Mysterious', 'Laughing')."
            },
            "clothing": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "5 creative clothing options matching the subject's gender/form (e.g., 'Cyberpunk Armor', 'Vintage Suit', 'Casual Hoodie')."
            },
            "scenes": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "5 interesting background settings or situations (e.g., 'Neon City Street', 'Sunny Beach', 'Ancient Library')."
            },
            "styles": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "5 art styles for the output image (e.g., 'Cinematic Realistic', 'Anime Style', 'Oil Painting', '3D Render', 'Pencil Sketch')."
            }
        },
        "required": ["originalDescription", "expressions", "clothing", "scenes", "styles"]
    })
}

pub fn caption_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "headline": { "type": "STRING" },
            "content": { "type": "STRING", "description": "The main body of the post." },
            "hashtags": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["headline", "content", "hashtags"]
    })
}

/// Image instruction for the current mode.
pub fn synthesis_prompt(options: &OptionSelection, custom_prompt: &str) -> String {
    if options.manual_mode {
        manual_prompt(custom_prompt)
    } else {
        guided_prompt(options, custom_prompt)
    }
}

pub fn manual_prompt(custom_prompt: &str) -> String {
    format!(
        "Generate a high-quality image based on the provided reference image. \
         Instruction: {custom_prompt}. \
         Maintain the key facial features and identity of the subject in the reference image, \
         but strictly follow the user's instruction for style, clothing, and background."
    )
}

pub fn guided_prompt(options: &OptionSelection, custom_prompt: &str) -> String {
    let mut prompt = String::from("Generate a high-quality image of the person in the reference image. ");

    if let Some(accessory) = options.accessory.value() {
        prompt.push_str(&format!("The subject is wearing a '{accessory}' style hijab/headscarf. "));
    }

    let color = options
        .clothing_color
        .value()
        .map(|c| format!("{c} colored "))
        .unwrap_or_default();
    let clothing = options.clothing.value().unwrap_or("their own outfit");
    prompt.push_str(&format!("The subject is wearing {color}{clothing}. "));

    prompt.push_str(&format!(
        "Facial Expression: {}. Background/Scene: {}. Art Style: {}.",
        options.expression.value().unwrap_or_default(),
        options.scene.value().unwrap_or("the original setting"),
        options.style.value().unwrap_or_default(),
    ));

    if options.viral {
        prompt.push_str(VIRAL_BLOCK);
    }

    let extra = custom_prompt.trim();
    if !extra.is_empty() {
        prompt.push_str(&format!(" Additional details: {extra}."));
    }

    prompt.push_str(" Maintain resemblance to the person's key facial features but change the context and style as requested.");
    prompt
}

/// Describes the generated image for the caption writer.
pub fn caption_context(options: &OptionSelection, custom_prompt: &str) -> String {
    if options.manual_mode {
        return custom_prompt.trim().to_string();
    }
    let mut context = format!(
        "A person wearing {} ({}) with a {} expression in a {} setting. Style: {}.",
        options.clothing.value().unwrap_or("casual clothes"),
        options.clothing_color.value().unwrap_or("default color"),
        options.expression.value().unwrap_or("neutral"),
        options.scene.value().unwrap_or("simple"),
        options.style.value().unwrap_or("realistic"),
    );
    if let Some(accessory) = options.accessory.value() {
        context.push_str(&format!(" Wearing {accessory} style hijab."));
    }
    context
}

fn strategy_instruction(post_type: PostType) -> &'static str {
    match post_type {
        PostType::Reaction => "STRATEGY: Big Text + Reaction Photo.
Structure:
- Headline: VERY Short, Explosive Hook (e.g., \"TAK SANGKA!\", \"RAHSIA TERBONGKAR!\").
- Content: Short and snappy. Direct to the point. Focus on awareness or a quick call-out.
- Tone: Shocked, Excited, or Urgent.",
        PostType::Tutorial => "STRATEGY: Mini Tutorial Card.
Structure:
- Headline: \"Cara Buat [X]\" or \"Tips [X]\".
- Content: Break down into 3 simple steps or 1 solid actionable insight. Educational value is priority.
- Tone: Helpful, Teacher-like, Structured.",
        PostType::Story => "STRATEGY: Situational Story Photo.
Structure:
- Headline: Relatable POV (e.g., \"Pernah tak rasa macam ni?\", \"POV: Bila client minta...\").
- Content: A short story relating the image to a common struggle/win in FB Pro journey.
- Tone: Empathy, Storytelling, Relatable.",
        PostType::Corporate => "STRATEGY: Clean Corporate Statement.
Structure:
- Headline: Professional Statement/Quote.
- Content: High-level wisdom, monetization strategy, or trust-building advice. Minimalist text.
- Tone: Professional, Authority, Serious but inspiring.",
        PostType::Meme => "STRATEGY: Silent Meme Style.
Structure:
- Headline: The Punchline (1 sentence).
- Content: Short context that makes the expression in the photo funny.
- Tone: Humorous, Sarcastic, Light-hearted. High engagement focus.",
    }
}

/// Full caption request text. The caption is always requested in Bahasa Melayu.
pub fn caption_prompt(context: &str, post_type: PostType) -> String {
    format!(
        "Act as a 'FB Pro Content Monetization Expert' and 'Social Media Coach'.

I have generated an AI image with this context: \"{context}\".

Task: Write a Facebook post caption in **BAHASA MELAYU** strictly.
Niche: FB Pro Content Monetization, AI Solutions, Tips & Tricks.

{strategy}

Mandatory Hashtags to include at the end: {hashtags}

Return the response in JSON format.",
        strategy = strategy_instruction(post_type),
        hashtags = MANDATORY_HASHTAGS.join(" "),
    )
}
