//! Creative options picked by the user between analysis and synthesis.

use serde::{Deserialize, Serialize};

use crate::models::{Language, Quality, Suggestions};

/// A single-valued option: nothing chosen yet, one of the offered labels, or
/// free text typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Unset,
    Preset(String),
    Custom(String),
}

impl Selection {
    /// Resolved value; blank custom text counts as nothing chosen.
    pub fn value(&self) -> Option<&str> {
        match self {
            Selection::Unset => None,
            Selection::Preset(label) => Some(label.as_str()),
            Selection::Custom(text) if text.trim().is_empty() => None,
            Selection::Custom(text) => Some(text.as_str()),
        }
    }
}

/// Headscarf style. "No accessory" is its own variant so the prompt builder
/// never compares against a display label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Accessory {
    #[default]
    NoAccessory,
    Preset(String),
    Custom(String),
}

impl Accessory {
    /// Maps a preset label from any locale. The localized "none" labels turn
    /// into [`Accessory::NoAccessory`].
    pub fn from_label(label: &str) -> Self {
        let is_none = [Language::En, Language::Ms]
            .iter()
            .any(|lang| lang.no_accessory_label().eq_ignore_ascii_case(label.trim()));
        if is_none {
            Accessory::NoAccessory
        } else {
            Accessory::Preset(label.to_string())
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Accessory::NoAccessory => None,
            Accessory::Preset(label) => Some(label.as_str()),
            Accessory::Custom(text) if text.trim().is_empty() => None,
            Accessory::Custom(text) => Some(text.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionField {
    Expression,
    Clothing,
    Scene,
    Style,
    Accessory,
    ClothingColor,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptionSelection {
    pub expression: Selection,
    pub clothing: Selection,
    pub scene: Selection,
    pub style: Selection,
    pub accessory: Accessory,
    pub clothing_color: Selection,
    pub viral: bool,
    pub manual_mode: bool,
}

/// One user edit, as posted by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OptionUpdate {
    Preset { field: OptionField, value: String },
    Custom { field: OptionField, value: String },
    SetViral { enabled: bool },
    SetManualMode { enabled: bool },
    ToggleMode,
    SetCustomPrompt { text: String },
    SetQuality { quality: Quality },
}

impl OptionSelection {
    /// Initial selection after analysis: the first suggestion of every category.
    pub fn seeded(suggestions: &Suggestions) -> Self {
        fn first(labels: &[String]) -> Selection {
            labels
                .first()
                .map(|label| Selection::Preset(label.clone()))
                .unwrap_or_default()
        }
        Self {
            expression: first(&suggestions.expressions),
            clothing: first(&suggestions.clothing),
            scene: first(&suggestions.scenes),
            style: first(&suggestions.styles),
            ..Self::default()
        }
    }

    pub fn select_preset(&mut self, field: OptionField, label: impl Into<String>) {
        let label = label.into();
        match self.selection_mut(field) {
            Some(slot) => *slot = Selection::Preset(label),
            None => self.accessory = Accessory::from_label(&label),
        }
    }

    pub fn set_custom(&mut self, field: OptionField, text: impl Into<String>) {
        let text = text.into();
        match self.selection_mut(field) {
            Some(slot) => *slot = Selection::Custom(text),
            None => self.accessory = Accessory::Custom(text),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.manual_mode = !self.manual_mode;
    }

    /// Whether synthesis may start with this selection and custom prompt.
    pub fn ready_for_synthesis(&self, custom_prompt: &str) -> bool {
        if self.manual_mode {
            !custom_prompt.trim().is_empty()
        } else {
            self.style.value().is_some() && self.expression.value().is_some()
        }
    }

    /// Plain selection slot for `field`; `None` for the accessory.
    fn selection_mut(&mut self, field: OptionField) -> Option<&mut Selection> {
        match field {
            OptionField::Expression => Some(&mut self.expression),
            OptionField::Clothing => Some(&mut self.clothing),
            OptionField::Scene => Some(&mut self.scene),
            OptionField::Style => Some(&mut self.style),
            OptionField::ClothingColor => Some(&mut self.clothing_color),
            OptionField::Accessory => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn seeding_picks_first_label_of_each_category() {
        let opts = OptionSelection::seeded(&Suggestions::fallback());
        assert_eq!(opts.expression.value(), Some("Happy"));
        assert_eq!(opts.clothing.value(), Some("Casual"));
        assert_eq!(opts.scene.value(), Some("Park"));
        assert_eq!(opts.style.value(), Some("Realistic"));
        assert_eq!(opts.accessory, Accessory::NoAccessory);
        assert_eq!(opts.clothing_color, Selection::Unset);
        assert!(!opts.viral && !opts.manual_mode);
    }

    #[test]
    fn custom_stays_active_until_preset_chosen() {
        let mut opts = OptionSelection::seeded(&Suggestions::fallback());
        opts.set_custom(OptionField::Scene, "Rainy rooftop");
        assert_eq!(opts.scene, Selection::Custom("Rainy rooftop".into()));
        assert_eq!(opts.scene.value(), Some("Rainy rooftop"));

        opts.select_preset(OptionField::Scene, "City");
        assert_eq!(opts.scene, Selection::Preset("City".into()));
    }

    #[test]
    fn blank_custom_text_resolves_to_nothing() {
        let mut opts = OptionSelection::seeded(&Suggestions::fallback());
        opts.set_custom(OptionField::Style, "   ");
        assert_eq!(opts.style.value(), None);
        assert!(!opts.ready_for_synthesis(""));
    }

    #[test]
    fn localized_none_labels_map_to_no_accessory() {
        let mut opts = OptionSelection::default();
        opts.select_preset(OptionField::Accessory, "Bawal");
        assert_eq!(opts.accessory.value(), Some("Bawal"));
        opts.select_preset(OptionField::Accessory, "Tiada");
        assert_eq!(opts.accessory, Accessory::NoAccessory);
        opts.select_preset(OptionField::Accessory, "None");
        assert_eq!(opts.accessory, Accessory::NoAccessory);
    }

    #[test]
    fn mode_toggle_keeps_guided_values() {
        let mut opts = OptionSelection::seeded(&Suggestions::fallback());
        opts.select_preset(OptionField::Style, "Cartoon");
        opts.toggle_mode();
        assert!(opts.manual_mode);
        assert!(!opts.ready_for_synthesis(""));
        assert!(opts.ready_for_synthesis("a knight in neon rain"));
        opts.toggle_mode();
        assert_eq!(opts.style.value(), Some("Cartoon"));
        assert!(opts.ready_for_synthesis(""));
    }

    #[test]
    fn guided_readiness_needs_style_and_expression() {
        let mut opts = OptionSelection::default();
        assert!(!opts.ready_for_synthesis("extra"));
        opts.select_preset(OptionField::Style, "Anime");
        assert!(!opts.ready_for_synthesis(""));
        opts.set_custom(OptionField::Expression, "Smirking");
        assert!(opts.ready_for_synthesis(""));
    }

    #[test]
    fn option_update_parses_tagged_json() {
        let update: OptionUpdate =
            serde_json::from_str(r#"{"action":"preset","field":"clothing_color","value":"Gold"}"#)
                .unwrap();
        assert_eq!(
            update,
            OptionUpdate::Preset { field: OptionField::ClothingColor, value: "Gold".into() }
        );
        let update: OptionUpdate = serde_json::from_str(r#"{"action":"toggle_mode"}"#).unwrap();
        assert_eq!(update, OptionUpdate::ToggleMode);
    }
}
