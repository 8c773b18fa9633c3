use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex for validating usernames at registration
    /// Lowercase letters, digits and underscores only
    /// - Valid: "john_doe", "user123", "_admin"
    /// - Invalid: "John", "user-name", "user name"
    pub static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9_]+$").unwrap();

    /// Regex for cookie domains: dotted labels with an alphabetic TLD, or localhost
    pub static ref DOMAIN_REGEX: Regex =
        Regex::new(r"(?i)^([a-z0-9]+(-[a-z0-9]+)*\.)+[a-z]{2,}$|^localhost$").unwrap();

    /// Hex-encoded SHA-256 digest, case-insensitive
    pub static ref SHA256_HEX_REGEX: Regex = Regex::new(r"^[a-fA-F0-9]{64}$").unwrap();

    /// Characters that must never appear in an uploaded filename
    static ref DANGEROUS_FILENAME_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();

    /// C0/C1 controls plus zero-width and bidi formatting characters
    static ref CONTROL_CHARS: Regex = Regex::new(
        r"[\x00-\x1F\x7F-\x9F\u{200B}-\u{200F}\u{202A}-\u{202E}\u{2060}-\u{206F}]"
    )
    .unwrap();
}

const RESERVED_FILENAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Check that an uploaded filename is safe to log and derive an extension from
pub fn is_valid_filename(filename: &str) -> bool {
    if filename.is_empty() || filename.len() > 255 {
        return false;
    }

    if DANGEROUS_FILENAME_CHARS.is_match(filename) {
        return false;
    }

    let stem = filename.split('.').next().unwrap_or("").to_uppercase();
    !RESERVED_FILENAMES.contains(&stem.as_str())
}

/// Lowercased extension of a filename, if any
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Strip control and unicode spacing characters, then trim
pub fn sanitize_text(input: &str) -> String {
    CONTROL_CHARS.replace_all(input, "").trim().to_string()
}

/// Drop characters with meaning inside a PostgREST `or=(...)` expression, then trim
pub fn strip_filter_syntax(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%' | '\\' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Validator hook for tag lists: every tag 1..=50 chars after trimming
pub fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty() || t.chars().count() > 50) {
        let mut err = validator::ValidationError::new("tags");
        err.message = Some("each tag must be between 1 and 50 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_regex() {
        assert!(USERNAME_REGEX.is_match("john_doe"));
        assert!(USERNAME_REGEX.is_match("user123"));
        assert!(!USERNAME_REGEX.is_match("John"));
        assert!(!USERNAME_REGEX.is_match("user-name"));
        assert!(!USERNAME_REGEX.is_match(""));
    }

    #[test]
    fn test_sha256_regex() {
        let digest = "a".repeat(64);
        assert!(SHA256_HEX_REGEX.is_match(&digest));
        assert!(SHA256_HEX_REGEX.is_match(&"ABCDEF0123456789".repeat(4)));
        assert!(!SHA256_HEX_REGEX.is_match(&"a".repeat(63)));
        assert!(!SHA256_HEX_REGEX.is_match(&"g".repeat(64)));
    }

    #[test]
    fn test_is_valid_filename() {
        assert!(is_valid_filename("report.pdf"));
        assert!(is_valid_filename("Quarterly Report (final).docx"));
        assert!(!is_valid_filename("../etc/passwd"));
        assert!(!is_valid_filename("a<b>.txt"));
        assert!(!is_valid_filename("CON.txt"));
        assert!(!is_valid_filename(""));
        assert!(!is_valid_filename(&"a".repeat(256)));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("report.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".hidden"), None);
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  hello\u{0007} world \n"), "hello world");
    }

    #[test]
    fn test_sanitize_text_keeps_typographic_punctuation() {
        assert_eq!(
            sanitize_text("\u{201C}Q1 \u{2013} Final\u{201D}\u{2026}"),
            "\u{201C}Q1 \u{2013} Final\u{201D}\u{2026}"
        );
        assert_eq!(
            sanitize_text("in\u{200B}voice\u{202E}fdp.exe\u{2060}"),
            "invoicefdp.exe"
        );
    }

    #[test]
    fn test_strip_filter_syntax() {
        assert_eq!(strip_filter_syntax("  tax (2024), final* "), "tax 2024 final");
        assert_eq!(strip_filter_syntax("()"), "");
    }

    #[test]
    fn test_validate_tags() {
        assert!(validate_tags(&["legal".to_string(), "2024".to_string()]).is_ok());
        assert!(validate_tags(&["  ".to_string()]).is_err());
        assert!(validate_tags(&["x".repeat(51)]).is_err());
    }
}
