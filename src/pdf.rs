//! Minimal PDF 1.4 writer
//!
//! Text-only pages using the standard Type1 fonts with WinAnsi encoding.
//! Output carries no creation date, so identical input renders identical bytes.

use std::fmt::Write as _;

const PT_PER_MM: f64 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    Courier,
}

const ALL_FONTS: [Font; 4] = [
    Font::Helvetica,
    Font::HelveticaBold,
    Font::HelveticaOblique,
    Font::Courier,
];

// Advance widths (1/1000 em) for U+0020..=U+007E.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

// Latin-1 supplement glyphs are not tabled; they take an average letter width.
const FALLBACK_WIDTH: u16 = 556;

impl Font {
    pub fn base_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
            Font::HelveticaOblique => "Helvetica-Oblique",
            Font::Courier => "Courier",
        }
    }

    fn resource_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
            Font::HelveticaOblique => "F3",
            Font::Courier => "F4",
        }
    }

    /// Advance width of `c` in 1/1000 em
    pub fn char_width(&self, c: char) -> u16 {
        if *self == Font::Courier {
            return 600;
        }
        let table = match self {
            Font::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
            _ => &HELVETICA_WIDTHS,
        };
        match c {
            ' '..='~' => table[c as usize - 0x20],
            _ => FALLBACK_WIDTH,
        }
    }

    /// Width of `text` in millimetres at `size_pt`
    pub fn text_width_mm(&self, text: &str, size_pt: f64) -> f64 {
        text.chars().map(|c| self.char_width_mm(c, size_pt)).sum()
    }

    pub fn char_width_mm(&self, c: char, size_pt: f64) -> f64 {
        self.char_width(c) as f64 / 1000.0 * size_pt / PT_PER_MM
    }
}

/// Whether `c` has a WinAnsi code point this writer can emit
pub fn is_encodable(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{A0}'..='\u{FF}')
}

fn encode_string(text: &str, out: &mut Vec<u8>) {
    out.push(b'(');
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c if is_encodable(c) => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out.push(b')');
}

/// Accumulates pages of positioned text and serializes them to PDF bytes.
///
/// Coordinates are millimetres measured from the top-left corner, matching
/// how layout code thinks about a page.
pub struct PdfWriter {
    width_mm: f64,
    height_mm: f64,
    pages: Vec<Vec<u8>>,
}

impl PdfWriter {
    pub fn new(width_mm: f64, height_mm: f64) -> Self {
        Self {
            width_mm,
            height_mm,
            pages: vec![],
        }
    }

    pub fn add_page(&mut self) {
        self.pages.push(Vec::new());
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Place `text` with its baseline at (`x_mm`, `baseline_mm`) on the current page.
    ///
    /// Callers check encodability first; unencodable characters become `?`.
    pub fn text(&mut self, font: Font, size_pt: f64, x_mm: f64, baseline_mm: f64, text: &str) {
        let height_mm = self.height_mm;
        let Some(page) = self.pages.last_mut() else {
            return;
        };
        let x = x_mm * PT_PER_MM;
        let y = (height_mm - baseline_mm) * PT_PER_MM;
        page.extend_from_slice(
            format!(
                "BT /{} {:.2} Tf {:.2} {:.2} Td ",
                font.resource_name(),
                size_pt,
                x,
                y
            )
            .as_bytes(),
        );
        encode_string(text, page);
        page.extend_from_slice(b" Tj ET\n");
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let font_base = 3;
        let page_base = font_base + ALL_FONTS.len();
        let object_count = page_base - 1 + self.pages.len() * 2;

        let mut kids = String::new();
        for i in 0..self.pages.len() {
            let _ = write!(kids, "{} 0 R ", page_base + i * 2);
        }
        let mut font_refs = String::new();
        for (i, font) in ALL_FONTS.iter().enumerate() {
            let _ = write!(font_refs, "/{} {} 0 R ", font.resource_name(), font_base + i);
        }

        push_object(&mut out, &mut offsets, b"<< /Type /Catalog /Pages 2 0 R >>");
        let pages_dict = format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 {:.2} {:.2}] >>",
            kids.trim_end(),
            self.pages.len(),
            self.width_mm * PT_PER_MM,
            self.height_mm * PT_PER_MM
        );
        push_object(&mut out, &mut offsets, pages_dict.as_bytes());

        for font in ALL_FONTS {
            let dict = format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                font.base_name()
            );
            push_object(&mut out, &mut offsets, dict.as_bytes());
        }

        for (i, content) in self.pages.iter().enumerate() {
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /Resources << /Font << {}>> >> /Contents {} 0 R >>",
                font_refs,
                page_base + i * 2 + 1
            );
            push_object(&mut out, &mut offsets, page_dict.as_bytes());

            let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            stream.extend_from_slice(content);
            stream.extend_from_slice(b"\nendstream");
            push_object(&mut out, &mut offsets, &stream);
        }

        debug_assert_eq!(offsets.len(), object_count);
        let xref_offset = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", object_count + 1);
        for offset in &offsets {
            let _ = writeln!(xref, "{:010} 00000 n ", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            object_count + 1,
            xref_offset
        );
        out.extend_from_slice(xref.as_bytes());
        out
    }
}

fn push_object(out: &mut Vec<u8>, offsets: &mut Vec<usize>, body: &[u8]) {
    offsets.push(out.len());
    out.extend_from_slice(format!("{} 0 obj\n", offsets.len()).as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
}
