//! Module configuration.
//!
//! One [`Syb5eConfig`] is built at startup and handed to the runtime.
//! User settings are stored by the host; [`Syb5eConfig::from_json`] reads
//! them back.

use crate::currency::{symbaroum_conversion, CurrencyConversion};
use serde::{Deserialize, Serialize};

const PAPER_BACKGROUND: &str = "url(../images/background/bg-paper.webp) repeat";

/// Display settings for one sheet type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SheetTheme {
    /// Background image, or `"none"` to use `switch_bg_colour`.
    pub bg_choice: String,
    pub switch_bg_colour: String,
    pub text_colour: String,
    pub font_family: String,
    pub border: String,
    pub item_link: String,
    pub tag: String,
}

impl SheetTheme {
    /// Parchment look.
    pub fn paper() -> Self {
        Self {
            bg_choice: PAPER_BACKGROUND.to_string(),
            switch_bg_colour: PAPER_BACKGROUND.to_string(),
            text_colour: "#000000".to_string(),
            font_family: "Fondamento".to_string(),
            border: "8px solid transparent".to_string(),
            item_link: "#000000".to_string(),
            tag: "#000000".to_string(),
        }
    }

    /// The base ruleset's own sheet colours.
    pub fn ruleset_default() -> Self {
        Self {
            bg_choice: "#dad8cc".to_string(),
            switch_bg_colour: "#dad8cc".to_string(),
            font_family: "\"Modesto Condensed\", \"Palatino Linotype\", serif".to_string(),
            border: "none".to_string(),
            ..Self::paper()
        }
    }

    /// Colour shown in the colour picker; only meaningful without an image.
    pub fn background_colour(&self) -> &str {
        if self.bg_choice == "none" {
            &self.switch_bg_colour
        } else {
            "#000000"
        }
    }
}

impl Default for SheetTheme {
    fn default() -> Self {
        Self::paper()
    }
}

/// User-facing settings as the host stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleSettings {
    pub use_symbaroum_currency: bool,
    pub character_theme: SheetTheme,
    pub npc_theme: SheetTheme,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            use_symbaroum_currency: true,
            character_theme: SheetTheme::default(),
            npc_theme: SheetTheme::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Syb5eConfig {
    /// Applied in order.
    pub currency_conversion: Vec<CurrencyConversion>,
    pub settings: ModuleSettings,
}

impl Syb5eConfig {
    pub fn new() -> Self {
        Self {
            currency_conversion: symbaroum_conversion(),
            settings: ModuleSettings::default(),
        }
    }

    /// Build from stored settings. Missing keys take their defaults.
    pub fn from_json(settings: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            settings: serde_json::from_str(settings)?,
            ..Self::new()
        })
    }

    pub fn with_settings(mut self, settings: ModuleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_currency_conversion(mut self, table: Vec<CurrencyConversion>) -> Self {
        self.currency_conversion = table;
        self
    }
}

impl Default for Syb5eConfig {
    fn default() -> Self {
        Self::new()
    }
}
