use std::sync::LazyLock;

use regex::Regex;

/// Default suffix appended to the source name for the split document
pub const DEFAULT_SUFFIX: &str = "-split";
pub const OUTPUT_EXTENSION: &str = "pdf";

// Invalid characters for Windows: < > : " / \ | ? * plus control characters (0-31)
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("valid regex"));
static RESERVED_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(CON|PRN|AUX|NUL|COM[1-9]|LPT[1-9])$").expect("valid regex")
});
static PDF_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.pdf$").expect("valid regex"));

/// Sanitize a filename for cross-platform compatibility
/// Removes/replaces characters that are invalid on Windows, macOS, or Linux
pub fn sanitize_filename(name: &str) -> String {
    let sanitized = INVALID_CHARS.replace_all(name, "_");

    // Trim leading/trailing spaces and dots (problematic on Windows)
    let sanitized = sanitized.trim_matches(|c| c == ' ' || c == '.');

    if RESERVED_NAMES.is_match(sanitized) {
        return format!("_{sanitized}");
    }

    // Leave room for the suffix and extension
    let sanitized: String = sanitized.chars().take(200).collect();

    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized
    }
}

/// Source file name without a trailing `.pdf`, case-insensitive
pub fn base_name(file_name: &str) -> String {
    PDF_EXTENSION.replace(file_name, "").into_owned()
}

/// `{base}{suffix}.pdf` for a source file name such as `report.PDF`
pub fn output_file_name(source_file_name: &str, suffix: &str) -> String {
    let base = sanitize_filename(&base_name(source_file_name));
    format!("{base}{suffix}.{OUTPUT_EXTENSION}")
}
