//! The per-user workflow as a value-level state machine.
//!
//! Every transition consumes a [`Session`] and returns the next one, so the
//! store only ever swaps whole values. Transitions requested from the wrong
//! phase fail with [`SessionError::InvalidTransition`] and leave the caller's
//! copy untouched.

use serde::Serialize;
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::models::{EncodedImage, Language, Phase, PostType, Quality, SocialPost, Suggestions};
use crate::options::{OptionSelection, OptionUpdate};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot {action} while in {phase:?}")]
    InvalidTransition { phase: Phase, action: &'static str },
    #[error("options are not complete enough to generate")]
    NotReady,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Session {
    pub phase: Phase,
    pub language: Language,
    pub reference_image: Option<EncodedImage>,
    pub suggestions: Option<Suggestions>,
    pub options: Option<OptionSelection>,
    pub custom_prompt: String,
    pub quality: Quality,
    pub generated_image: Option<EncodedImage>,
    pub caption_type: Option<PostType>,
    pub social_post: Option<SocialPost>,
    pub error: Option<String>,
}

impl Session {
    pub fn new(language: Language) -> Self {
        Self { language, ..Self::default() }
    }

    fn expect_phase(&self, phase: Phase, action: &'static str) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition { phase: self.phase, action })
        }
    }

    fn checked(self) -> Self {
        debug_assert!(self.invariants_hold(), "session invariants violated: {:?}", self.phase);
        self
    }

    pub fn invariants_hold(&self) -> bool {
        let needs_suggestions = matches!(
            self.phase,
            Phase::OptionSelection | Phase::Generating | Phase::Result
        );
        let has_suggestions = self.suggestions.is_some() && self.options.is_some();
        (!needs_suggestions || has_suggestions)
            && (self.phase != Phase::Result || self.generated_image.is_some())
    }

    /// An upload that cannot be used (wrong mime type, empty, too large).
    pub fn reject_upload(self, message: impl Into<String>) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Upload, "reject an upload")?;
        Ok(Self { error: Some(message.into()), ..self }.checked())
    }

    /// A usable upload arrived; its bytes are encoded while analyzing.
    pub fn begin_analysis(self) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Upload, "upload an image")?;
        Ok(Self { phase: Phase::Analyzing, error: None, ..self }.checked())
    }

    pub fn attach_reference(self, image: EncodedImage) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Analyzing, "attach a reference image")?;
        Ok(Self { reference_image: Some(image), ..self }.checked())
    }

    pub fn analysis_succeeded(self, suggestions: Suggestions) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Analyzing, "finish analysis")?;
        let options = OptionSelection::seeded(&suggestions);
        Ok(Self {
            phase: Phase::OptionSelection,
            suggestions: Some(suggestions),
            options: Some(options),
            ..self
        }
        .checked())
    }

    pub fn analysis_failed(self, message: impl Into<String>) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Analyzing, "fail analysis")?;
        Ok(Self {
            phase: Phase::Upload,
            reference_image: None,
            suggestions: None,
            options: None,
            error: Some(message.into()),
            ..self
        }
        .checked())
    }

    pub fn apply_update(self, update: OptionUpdate) -> Result<Self, SessionError> {
        self.expect_phase(Phase::OptionSelection, "change options")?;
        let mut next = self;
        let options = next.options.get_or_insert_with(OptionSelection::default);
        match update {
            OptionUpdate::Preset { field, value } => options.select_preset(field, value),
            OptionUpdate::Custom { field, value } => options.set_custom(field, value),
            OptionUpdate::SetViral { enabled } => options.viral = enabled,
            OptionUpdate::SetManualMode { enabled } => options.manual_mode = enabled,
            OptionUpdate::ToggleMode => options.toggle_mode(),
            OptionUpdate::SetCustomPrompt { text } => next.custom_prompt = text,
            OptionUpdate::SetQuality { quality } => next.quality = quality,
        }
        Ok(next.checked())
    }

    pub fn ready_to_generate(&self) -> bool {
        self.phase == Phase::OptionSelection
            && self.reference_image.is_some()
            && self
                .options
                .as_ref()
                .is_some_and(|o| o.ready_for_synthesis(&self.custom_prompt))
    }

    /// Reference image and options to synthesize from, once both exist.
    pub fn generation_inputs(&self) -> Option<(&EncodedImage, &OptionSelection)> {
        Some((self.reference_image.as_ref()?, self.options.as_ref()?))
    }

    pub fn begin_generation(self) -> Result<Self, SessionError> {
        self.expect_phase(Phase::OptionSelection, "generate")?;
        if !self.ready_to_generate() {
            return Err(SessionError::NotReady);
        }
        Ok(Self {
            phase: Phase::Generating,
            error: None,
            social_post: None,
            caption_type: None,
            ..self
        }
        .checked())
    }

    pub fn generation_succeeded(self, image: EncodedImage) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Generating, "finish generation")?;
        Ok(Self {
            phase: Phase::Result,
            generated_image: Some(image),
            social_post: None,
            caption_type: None,
            ..self
        }
        .checked())
    }

    pub fn generation_failed(self, message: impl Into<String>) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Generating, "fail generation")?;
        Ok(Self {
            phase: Phase::OptionSelection,
            error: Some(message.into()),
            ..self
        }
        .checked())
    }

    /// Back to the options to tweak and regenerate. Any caption is dropped
    /// since it describes the previous options.
    pub fn adjust_settings(self) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Result, "adjust settings")?;
        Ok(Self {
            phase: Phase::OptionSelection,
            social_post: None,
            caption_type: None,
            ..self
        }
        .checked())
    }

    pub fn select_caption(self, post_type: PostType) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Result, "request a caption")?;
        Ok(Self {
            caption_type: Some(post_type),
            social_post: None,
            error: None,
            ..self
        }
        .checked())
    }

    /// Stores a finished caption for `post_type`.
    pub fn caption_ready(self, post_type: PostType, post: SocialPost) -> Result<Self, SessionError> {
        self.expect_phase(Phase::Result, "store a caption")?;
        Ok(Self {
            caption_type: Some(post_type),
            social_post: Some(post),
            ..self
        }
        .checked())
    }

    pub fn set_language(self, language: Language) -> Self {
        Self { language, ..self }
    }

    /// Back to a fresh session; only the display language is kept.
    pub fn reset(self) -> Self {
        Self::new(self.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::sample_image;
    use crate::options::OptionField;
    use pretty_assertions::assert_eq;

    fn analyzing() -> Session {
        Session::default().begin_analysis().unwrap().attach_reference(sample_image()).unwrap()
    }

    fn at_options() -> Session {
        analyzing()
            .analysis_succeeded(Suggestions::fallback())
            .unwrap()
    }

    fn at_result() -> Session {
        at_options()
            .begin_generation()
            .unwrap()
            .generation_succeeded(sample_image())
            .unwrap()
    }

    #[test]
    fn happy_path_reaches_result() {
        let session = at_result();
        assert_eq!(session.phase, Phase::Result);
        assert!(session.invariants_hold());
        assert_eq!(session.suggestions.as_ref().unwrap().styles.len(), 5);
        assert_eq!(session.generated_image, Some(sample_image()));
    }

    #[test]
    fn rejected_upload_stays_in_upload() {
        let session = Session::default().reject_upload("Please drop a valid image file.").unwrap();
        assert_eq!(session.phase, Phase::Upload);
        assert_eq!(session.error.as_deref(), Some("Please drop a valid image file."));
    }

    #[test]
    fn analysis_failure_discards_upload() {
        let session = analyzing()
            .analysis_failed("Failed to analyze image.")
            .unwrap();
        assert_eq!(session.phase, Phase::Upload);
        assert!(session.reference_image.is_none());
        assert!(session.suggestions.is_none());
        assert!(session.error.is_some());
    }

    #[test]
    fn new_upload_clears_previous_error() {
        let session = Session::default()
            .reject_upload("bad")
            .unwrap()
            .begin_analysis()
            .unwrap();
        assert_eq!(session.error, None);
    }

    #[test]
    fn generation_requires_readiness() {
        let session = at_options()
            .apply_update(OptionUpdate::Custom { field: OptionField::Style, value: String::new() })
            .unwrap();
        assert!(!session.ready_to_generate());
        assert_eq!(session.clone().begin_generation(), Err(SessionError::NotReady));

        let manual = at_options().apply_update(OptionUpdate::ToggleMode).unwrap();
        assert_eq!(manual.clone().begin_generation(), Err(SessionError::NotReady));
        let manual = manual
            .apply_update(OptionUpdate::SetCustomPrompt { text: "astronaut portrait".into() })
            .unwrap();
        assert_eq!(manual.begin_generation().unwrap().phase, Phase::Generating);
    }

    #[test]
    fn generation_failure_returns_to_options_with_error() {
        let session = at_options()
            .begin_generation()
            .unwrap()
            .generation_failed("Invalid API Key.")
            .unwrap();
        assert_eq!(session.phase, Phase::OptionSelection);
        assert_eq!(session.error.as_deref(), Some("Invalid API Key."));
        assert!(session.clone().begin_generation().unwrap().error.is_none());
    }

    #[test]
    fn entering_result_clears_caption_state() {
        let with_caption = at_result()
            .select_caption(PostType::Meme)
            .unwrap()
            .caption_ready(PostType::Meme, SocialPost::fallback())
            .unwrap();
        assert!(with_caption.social_post.is_some());

        let regenerated = with_caption
            .adjust_settings()
            .unwrap()
            .begin_generation()
            .unwrap()
            .generation_succeeded(sample_image())
            .unwrap();
        assert_eq!(regenerated.caption_type, None);
        assert_eq!(regenerated.social_post, None);
    }

    #[test]
    fn adjust_settings_drops_caption_keeps_image() {
        let session = at_result()
            .select_caption(PostType::Corporate)
            .unwrap()
            .caption_ready(PostType::Corporate, SocialPost::fallback())
            .unwrap()
            .adjust_settings()
            .unwrap();
        assert_eq!(session.phase, Phase::OptionSelection);
        assert_eq!(session.social_post, None);
        assert!(session.generated_image.is_some());
    }

    #[test]
    fn reselecting_caption_discards_previous_post() {
        let session = at_result()
            .caption_ready(PostType::Reaction, SocialPost::fallback())
            .unwrap()
            .select_caption(PostType::Tutorial)
            .unwrap();
        assert_eq!(session.caption_type, Some(PostType::Tutorial));
        assert_eq!(session.social_post, None);
        assert_eq!(session.phase, Phase::Result);
    }

    #[test]
    fn reset_from_any_phase_yields_fresh_session() {
        let generating = at_options().begin_generation().unwrap();
        for session in [Session::default(), analyzing(), at_options(), generating, at_result()] {
            assert_eq!(session.reset(), Session::default());
        }
        let malay = at_result().set_language(Language::Ms).reset();
        assert_eq!(malay, Session::new(Language::Ms));
    }

    #[test]
    fn wrong_phase_actions_are_rejected() {
        assert_eq!(
            Session::default().begin_generation(),
            Err(SessionError::InvalidTransition { phase: Phase::Upload, action: "generate" })
        );
        assert!(at_options().select_caption(PostType::Meme).is_err());
        assert!(at_result().apply_update(OptionUpdate::ToggleMode).is_err());
        assert!(at_options().begin_analysis().is_err());
        assert!(Session::default().attach_reference(sample_image()).is_err());
        assert!(Session::default().generation_succeeded(sample_image()).is_err());
    }

    #[test]
    fn option_edits_flow_into_session() {
        let session = at_options()
            .apply_update(OptionUpdate::Preset { field: OptionField::Accessory, value: "Tiada".into() })
            .unwrap()
            .apply_update(OptionUpdate::SetViral { enabled: true })
            .unwrap()
            .apply_update(OptionUpdate::SetQuality { quality: Quality::High })
            .unwrap();
        let options = session.options.as_ref().unwrap();
        assert!(options.viral);
        assert_eq!(options.accessory.value(), None);
        assert_eq!(session.quality, Quality::High);
    }
}
