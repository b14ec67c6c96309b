//! Theme parameters: colours, fonts, sizes, spacing and page geometry.
//!
//! The pipeline never interprets these values itself; they are handed to the
//! layout sink unchanged. Every field has a default so a request may send `{}`
//! or omit the theme entirely.

use serde::{Deserialize, Serialize};

/// Colour palette, as `#RRGGBB` hex strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub text: String,
    pub code_bg: String,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            primary: "#E3342F".into(),
            secondary: "#1CCBD0".into(),
            accent: "#F59E0B".into(),
            background: "#FFFFFF".into(),
            text: "#111827".into(),
            code_bg: "#F5F5F5".into(),
        }
    }
}

/// Font names. The PDF sink understands the base-14 PostScript names
/// (`Helvetica`, `Times-Bold`, `Courier-Oblique`, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontPalette {
    pub heading: String,
    pub body: String,
    pub code: String,
}

impl Default for FontPalette {
    fn default() -> Self {
        Self {
            heading: "Helvetica-Bold".into(),
            body: "Helvetica".into(),
            code: "Courier".into(),
        }
    }
}

/// Complete theme for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSpec {
    pub colors: ColorPalette,
    pub fonts: FontPalette,
    /// Accepted for compatibility; not drawn.
    pub logo_path: Option<String>,

    // Typography
    pub title_font_size: u32,
    pub subtitle_font_size: u32,
    pub h1_font_size: u32,
    pub h2_font_size: u32,
    pub h3_font_size: u32,
    pub body_font_size: u32,
    pub code_font_size: u32,

    // Spacing
    pub line_spacing: f32,
    /// Space after paragraphs, in points.
    pub paragraph_spacing: f32,

    // Page geometry, in points
    pub page_width: f32,
    pub page_height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl Default for ThemeSpec {
    fn default() -> Self {
        Self {
            colors: ColorPalette::default(),
            fonts: FontPalette::default(),
            logo_path: None,
            title_font_size: 24,
            subtitle_font_size: 16,
            h1_font_size: 18,
            h2_font_size: 14,
            h3_font_size: 12,
            body_font_size: 10,
            code_font_size: 9,
            line_spacing: 1.2,
            paragraph_spacing: 6.0,
            page_width: 612.0,
            page_height: 792.0,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
        }
    }
}

impl ThemeSpec {
    /// Width available for content between the left and right margins.
    pub fn content_width(&self) -> f32 {
        (self.page_width - self.margin_left - self.margin_right).max(1.0)
    }
}

/// An RGB colour with components in `0.0..=1.0`, as PDF operators expect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);

    /// Parse `#RRGGBB` or `RRGGBB`. Returns `None` for anything else.
    pub fn from_hex(hex: &str) -> Option<Rgb> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Rgb(
            channel(0)? as f32 / 255.0,
            channel(2)? as f32 / 255.0,
            channel(4)? as f32 / 255.0,
        ))
    }
}
