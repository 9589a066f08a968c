//! Document Renderer
//!
//! Lays out a text body under a preset: wrapped lines, automatic page
//! breaks, the preset title in every header and `Page N` in every footer.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::hashing::sha256_hex;
use crate::pdf::{is_encodable, Font, PdfWriter};
use crate::presets::{BodyStyle, Preset};

const HEADER_FONT_PT: f64 = 12.0;
const HEADER_CELL_MM: f64 = 10.0;
const HEADER_GAP_MM: f64 = 10.0;
const FOOTER_FONT_PT: f64 = 8.0;
const FOOTER_CELL_MM: f64 = 10.0;
const FOOTER_OFFSET_MM: f64 = 15.0;
const TAB_WIDTH: usize = 4;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Character {ch:?} at line {line}, column {column} cannot be encoded")]
    UnencodableCharacter { ch: char, line: usize, column: usize },

    #[error("Invalid page geometry: {0}")]
    InvalidGeometry(String),
}

/// A rendered, immutable document
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub pages: usize,
    pub sha256: String,
}

struct Geometry {
    page_w: f64,
    page_h: f64,
    left: f64,
    text_w: f64,
    body_top: f64,
    break_at: f64,
    cell_margin: f64,
}

impl Geometry {
    fn for_preset(preset: &Preset) -> Result<Self, RenderError> {
        if preset.font_size_pt <= 0.0 || preset.line_height_mm <= 0.0 {
            return Err(RenderError::InvalidGeometry(
                "font size and line height must be positive".into(),
            ));
        }

        let (page_w, page_h) = preset.page_mm();
        let margin = preset.margin_mm;
        let cell_margin = margin / 10.0;
        let text_w = page_w - 2.0 * margin - 2.0 * cell_margin;
        let body_top = margin + HEADER_CELL_MM + HEADER_GAP_MM;
        let break_at = page_h - preset.break_margin_mm;

        let widest = body_font(preset).char_width_mm('W', preset.font_size_pt);
        if text_w < widest {
            return Err(RenderError::InvalidGeometry(format!(
                "printable width {:.1}mm is narrower than one glyph",
                text_w
            )));
        }
        if body_top + preset.line_height_mm > break_at {
            return Err(RenderError::InvalidGeometry(format!(
                "no room for a body line between {:.1}mm and {:.1}mm",
                body_top, break_at
            )));
        }

        Ok(Self {
            page_w,
            page_h,
            left: margin,
            text_w,
            body_top,
            break_at,
            cell_margin,
        })
    }
}

fn body_font(preset: &Preset) -> Font {
    match preset.body_style {
        BodyStyle::Monospace => Font::Courier,
        BodyStyle::Proportional => Font::Helvetica,
    }
}

/// Baseline of text vertically centered in a cell starting at `top`
fn baseline(top: f64, cell_h: f64, size_pt: f64) -> f64 {
    top + cell_h / 2.0 + 0.3 * size_pt * 25.4 / 72.0
}

/// CRLF and lone CR become LF, tabs expand to spaces.
fn normalize(body: &str) -> String {
    body.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', &" ".repeat(TAB_WIDTH))
}

fn check_encodable(text: &str) -> Result<(), RenderError> {
    for (line_idx, line) in text.split('\n').enumerate() {
        if let Some((col, ch)) = line.chars().enumerate().find(|(_, c)| !is_encodable(*c)) {
            return Err(RenderError::UnencodableCharacter {
                ch,
                line: line_idx + 1,
                column: col + 1,
            });
        }
    }
    Ok(())
}

/// Greedy wrap of one paragraph, breaking at the last space that fits or
/// mid-word when a single word is wider than the line.
fn wrap_paragraph(text: &str, font: Font, size_pt: f64, max_mm: f64) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut lines = vec![];
    let mut start = 0;
    let mut i = 0;
    let mut width = 0.0;
    let mut last_space: Option<usize> = None;

    while i < chars.len() {
        let c = chars[i];
        if c == ' ' {
            last_space = Some(i);
        }
        width += font.char_width_mm(c, size_pt);
        if width > max_mm {
            match last_space {
                Some(sp) if sp > start => {
                    lines.push(chars[start..sp].iter().collect());
                    start = sp + 1;
                }
                _ => {
                    if i == start {
                        i += 1;
                    }
                    lines.push(chars[start..i].iter().collect());
                    start = i;
                }
            }
            i = start;
            width = 0.0;
            last_space = None;
            continue;
        }
        i += 1;
    }

    if start < chars.len() || lines.is_empty() {
        lines.push(chars[start..].iter().collect());
    }
    lines
}

fn start_page(pdf: &mut PdfWriter, preset: &Preset, geo: &Geometry) {
    pdf.add_page();
    let number = pdf.page_count();

    let title_w = Font::HelveticaBold.text_width_mm(&preset.title, HEADER_FONT_PT);
    let title_x = geo.left + (geo.page_w - 2.0 * geo.left - title_w) / 2.0;
    pdf.text(
        Font::HelveticaBold,
        HEADER_FONT_PT,
        title_x,
        baseline(geo.left, HEADER_CELL_MM, HEADER_FONT_PT),
        &preset.title,
    );

    let footer = format!("Page {}", number);
    let footer_w = Font::HelveticaOblique.text_width_mm(&footer, FOOTER_FONT_PT);
    let footer_x = geo.left + (geo.page_w - 2.0 * geo.left - footer_w) / 2.0;
    pdf.text(
        Font::HelveticaOblique,
        FOOTER_FONT_PT,
        footer_x,
        baseline(geo.page_h - FOOTER_OFFSET_MM, FOOTER_CELL_MM, FOOTER_FONT_PT),
        &footer,
    );
}

/// Render `body` under `preset`.
///
/// Fails before producing any bytes when the title or body holds a character
/// outside the WinAnsi range, or when the preset leaves no room for text.
pub fn render_document(preset: &Preset, body: &str) -> Result<RenderedDocument, RenderError> {
    let geo = Geometry::for_preset(preset)?;
    let body = normalize(body);
    check_encodable(&preset.title)?;
    check_encodable(&body)?;

    let font = body_font(preset);
    let size = preset.font_size_pt;
    let lh = preset.line_height_mm;

    let mut pdf = PdfWriter::new(geo.page_w, geo.page_h);
    start_page(&mut pdf, preset, &geo);
    let mut y = geo.body_top;

    for paragraph in body.split('\n') {
        for line in wrap_paragraph(paragraph, font, size, geo.text_w) {
            if y + lh > geo.break_at {
                start_page(&mut pdf, preset, &geo);
                y = geo.body_top;
            }
            if !line.is_empty() {
                pdf.text(font, size, geo.left + geo.cell_margin, baseline(y, lh, size), &line);
            }
            y += lh;
        }
    }

    let pages = pdf.page_count();
    let bytes = pdf.finish();
    let sha256 = sha256_hex(&bytes);
    debug!(kind = preset.kind.as_str(), pages, bytes = bytes.len(), "rendered document");

    Ok(RenderedDocument { bytes, pages, sha256 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::Orientation;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn occurrences(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn test_wrap_breaks_at_spaces() {
        // Courier 10pt glyph = 6pt; 10 glyphs fit in 60pt
        let max = Font::Courier.text_width_mm("aaaaaaaaaa", 10.0) + 0.01;
        let lines = wrap_paragraph("aaaa bbbb cccc", Font::Courier, 10.0, max);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn test_wrap_splits_long_word() {
        let max = Font::Courier.text_width_mm("aaaa", 10.0) + 0.01;
        let lines = wrap_paragraph("abcdefghij", Font::Courier, 10.0, max);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wrap_keeps_indentation_and_empty_lines() {
        let lines = wrap_paragraph("    return x;", Font::Courier, 10.0, 190.0);
        assert_eq!(lines, vec!["    return x;"]);
        assert_eq!(wrap_paragraph("", Font::Courier, 10.0, 190.0), vec![""]);
    }

    #[test]
    fn test_single_page_has_header_and_footer() {
        let doc = render_document(&Preset::contract("NovaMint Document"), "pragma solidity ^0.8.0;").unwrap();
        assert_eq!(doc.pages, 1);
        assert!(contains(&doc.bytes, b"(NovaMint Document) Tj"));
        assert!(contains(&doc.bytes, b"(Page 1) Tj"));
        assert!(contains(&doc.bytes, b"(pragma solidity ^0.8.0;) Tj"));
    }

    #[test]
    fn test_long_body_breaks_pages() {
        let body: String = (0..120).map(|i| format!("line {}\n", i)).collect();
        let doc = render_document(&Preset::contract("T"), &body).unwrap();
        // (297 - 20 - 30) / 5 = 49 lines per page; 121 lines incl. trailing empty
        assert_eq!(doc.pages, 3);
        assert!(contains(&doc.bytes, b"(Page 3) Tj"));
        assert!(!contains(&doc.bytes, b"(Page 4) Tj"));
    }

    #[test]
    fn test_title_repeated_on_every_page() {
        let body: String = (0..120).map(|i| format!("line {}\n", i)).collect();
        let doc = render_document(&Preset::contract("Ledger Copy"), &body).unwrap();
        assert_eq!(occurrences(&doc.bytes, b"(Ledger Copy) Tj"), doc.pages);
        for page in 1..=doc.pages {
            let footer = format!("(Page {}) Tj", page);
            assert_eq!(occurrences(&doc.bytes, footer.as_bytes()), 1);
        }
    }

    #[test]
    fn test_receipt_preset_uses_helvetica_body() {
        let doc = render_document(&Preset::receipt("T"), "Item: Cat").unwrap();
        assert!(contains(&doc.bytes, b"/F1 12.00 Tf"));
    }

    #[test]
    fn test_unencodable_character_reported() {
        let err = render_document(&Preset::receipt("T"), "Item: ok\nBuyer: 🚀").unwrap_err();
        match err {
            RenderError::UnencodableCharacter { ch, line, column } => {
                assert_eq!(ch, '🚀');
                assert_eq!(line, 2);
                assert_eq!(column, 8);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut preset = Preset::receipt("T");
        preset.line_height_mm = 400.0;
        assert!(matches!(
            render_document(&preset, "x"),
            Err(RenderError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let mut preset = Preset::receipt("T");
        preset.orientation = Orientation::Landscape;
        let a = render_document(&preset, "same body").unwrap();
        let b = render_document(&preset, "same body").unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.sha256, b.sha256);
    }

    #[test]
    fn test_tabs_and_crlf_normalized() {
        let doc = render_document(&Preset::contract("T"), "a\r\n\tb").unwrap();
        assert!(contains(&doc.bytes, b"(    b) Tj"));
    }
}
