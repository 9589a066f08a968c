//! Filename Sanitizer
//!
//! Maps arbitrary user-supplied names to names that are safe to join onto a
//! document directory. Pure functions, no filesystem access.

/// Source extension accepted for contract uploads
pub const CONTRACT_SOURCE_EXT: &str = ".sol";

/// Extension of every rendered document
pub const DOCUMENT_EXT: &str = ".pdf";

fn is_kept(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_'
}

/// Derive a filesystem-safe name from `name`.
///
/// A trailing `source_ext` is swapped for `target_ext`; any other name gets
/// `target_ext` appended. Everything except ASCII letters, ASCII digits, `.`
/// and `_` is then dropped, so path separators can never survive.
///
/// The result may be just the extension when the body filters away entirely.
/// Trailing `.` or `_` left over by filtering are kept.
pub fn sanitize_filename(name: &str, source_ext: &str, target_ext: &str) -> String {
    let renamed = match name.strip_suffix(source_ext) {
        Some(stem) if !source_ext.is_empty() => format!("{}{}", stem, target_ext),
        _ => format!("{}{}", name, target_ext),
    };

    let filtered: String = renamed.chars().filter(|c| is_kept(*c)).collect();
    filtered.trim_end().to_string()
}

/// Contract source name to document name (`.sol` -> `.pdf`)
pub fn contract_document_name(filename: &str) -> String {
    sanitize_filename(filename, CONTRACT_SOURCE_EXT, DOCUMENT_EXT)
}

/// Filename stem for a receipt of `item`.
///
/// Spaces become `_` first so multi-word item names stay readable, then the
/// same character filter as [`sanitize_filename`] applies.
pub fn receipt_stem(item: &str) -> String {
    item.replace(' ', "_").chars().filter(|c| is_kept(*c)).collect()
}
