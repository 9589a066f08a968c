//! Preset System - Rendering Parameters per Document Kind
//!
//! A preset is the only thing that distinguishes a contract document from a
//! receipt. The renderer takes no other layout input.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Header title used when no other title is configured
pub const DEFAULT_DOCUMENT_TITLE: &str = "NovaMint Document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Contract,
    Receipt,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Contract => "contract",
            DocumentKind::Receipt => "receipt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyStyle {
    /// Fixed-pitch body, for source text
    Monospace,
    /// Proportional body, for prose
    Proportional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Portrait width and height in millimetres
    pub fn portrait_mm(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub kind: DocumentKind,
    /// Rendered bold and centered at the top of every page
    pub title: String,
    pub body_style: BodyStyle,
    pub font_size_pt: f64,
    pub line_height_mm: f64,
    pub page_size: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_margin")]
    pub margin_mm: f64,
    /// Distance from the bottom edge that triggers a page break
    #[serde(default = "default_break_margin")]
    pub break_margin_mm: f64,
}

fn default_margin() -> f64 { 10.0 }
fn default_break_margin() -> f64 { 20.0 }

impl Preset {
    /// Source-code preset: Courier 10pt on 5mm lines
    pub fn contract(title: &str) -> Self {
        Self {
            kind: DocumentKind::Contract,
            title: title.to_string(),
            body_style: BodyStyle::Monospace,
            font_size_pt: 10.0,
            line_height_mm: 5.0,
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin_mm: default_margin(),
            break_margin_mm: default_break_margin(),
        }
    }

    /// Receipt preset: Helvetica 12pt on 10mm lines
    pub fn receipt(title: &str) -> Self {
        Self {
            kind: DocumentKind::Receipt,
            title: title.to_string(),
            body_style: BodyStyle::Proportional,
            font_size_pt: 12.0,
            line_height_mm: 10.0,
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin_mm: default_margin(),
            break_margin_mm: default_break_margin(),
        }
    }

    /// Page width and height in millimetres after orientation
    pub fn page_mm(&self) -> (f64, f64) {
        let (w, h) = self.page_size.portrait_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// Preset registry - one preset per document kind
pub struct PresetRegistry {
    presets: HashMap<DocumentKind, Preset>,
}

impl PresetRegistry {
    /// Both built-in presets sharing one header title
    pub fn with_title(title: &str) -> Self {
        let mut registry = Self { presets: HashMap::new() };
        registry.register(Preset::contract(title));
        registry.register(Preset::receipt(title));
        registry
    }

    pub fn get(&self, kind: DocumentKind) -> Option<&Preset> {
        self.presets.get(&kind)
    }

    pub fn list(&self) -> Vec<&Preset> {
        self.presets.values().collect()
    }

    /// Replaces any preset already registered for the same kind
    pub fn register(&mut self, preset: Preset) {
        self.presets.insert(preset.kind, preset);
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::with_title(DEFAULT_DOCUMENT_TITLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_both_kinds() {
        let registry = PresetRegistry::default();
        let contract = registry.get(DocumentKind::Contract).unwrap();
        let receipt = registry.get(DocumentKind::Receipt).unwrap();
        assert_eq!(contract.body_style, BodyStyle::Monospace);
        assert_eq!(receipt.body_style, BodyStyle::Proportional);
        assert!(receipt.font_size_pt > contract.font_size_pt);
        assert_eq!(contract.title, DEFAULT_DOCUMENT_TITLE);
    }

    #[test]
    fn test_landscape_swaps_dimensions() {
        let mut preset = Preset::receipt("t");
        preset.orientation = Orientation::Landscape;
        assert_eq!(preset.page_mm(), (297.0, 210.0));
    }

    #[test]
    fn test_preset_deserializes_with_defaults() {
        let json = r#"{
            "kind": "receipt",
            "title": "Receipt",
            "bodyStyle": "proportional",
            "fontSizePt": 14,
            "lineHeightMm": 8,
            "pageSize": "letter"
        }"#;
        let preset: Preset = serde_json::from_str(json).unwrap();
        assert_eq!(preset.orientation, Orientation::Portrait);
        assert_eq!(preset.margin_mm, 10.0);
        assert_eq!(preset.page_size, PageSize::Letter);
    }
}
