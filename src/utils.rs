// src/utils.rs

use crate::{constants, error::*};
use anyhow::Context;
use regex::Regex;
use std::{
    ffi::OsStr,
    path::{Component, Path, PathBuf},
    sync::LazyLock,
};
use url::Url;

static ILLEGAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DIR_SEPARATORS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/:&,]").unwrap());
static UNDERSCORES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());
static KS_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/ks/[^/?#]+").unwrap());
static LOGIN_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(^|[^a-z])({})", constants::LOGIN_URL_MARKERS.join("|"))).unwrap()
});

pub fn sanitize_filename(name: &str) -> String {
    let original_name = name.trim();
    if original_name.is_empty() { return "unknown".to_string(); }

    let stem = Path::new(original_name)
        .file_stem()
        .unwrap_or_else(|| OsStr::new(original_name))
        .to_string_lossy()
        .to_uppercase();
    let windows_reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    let mut name = if windows_reserved.contains(&stem.as_ref()) {
        format!("_{}", original_name)
    } else {
        original_name.to_string()
    };

    name = ILLEGAL_CHARS_RE.replace_all(&name, " ").into_owned();
    name = WHITESPACE_RE.replace_all(&name, " ").trim().to_string();
    name = name.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string();
    if name.is_empty() { return "unnamed".to_string(); }

    if name.len() > constants::MAX_FILENAME_BYTES {
        name = safe_truncate_utf8(&name, constants::MAX_FILENAME_BYTES).trim_end().to_string();
    }
    name
}

/// Module names become directory names: `Week 1: Intro & Setup` ->
/// `Week_1_Intro_Setup`.
pub fn safe_dir_name(name: &str) -> String {
    let spaced = DIR_SEPARATORS_RE.replace_all(name, " ");
    let underscored = WHITESPACE_RE.replace_all(spaced.trim(), "_");
    let collapsed = UNDERSCORES_RE.replace_all(&underscored, "_");
    sanitize_filename(collapsed.trim_matches('_'))
}

fn safe_truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes { return s; }
    let mut i = max_bytes;
    while i > 0 && !s.is_char_boundary(i) { i -= 1; }
    &s[..i]
}

/// Cuts `text` to roughly `max_width` terminal columns (wide chars count 2).
pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub fn secure_join_path(base_dir: &Path, relative_path: &Path) -> AppResult<PathBuf> {
    let resolved_base = dunce::canonicalize(base_dir)
        .with_context(|| format!("Base directory '{:?}' does not exist or is not accessible", base_dir))?;
    let mut final_path = resolved_base.clone();
    for component in relative_path.components() {
        match component {
            Component::Normal(part) => final_path.push(part),
            Component::ParentDir => return Err(AppError::Security("path traversal '..' detected".to_string())),
            _ => continue,
        }
    }
    if !final_path.starts_with(&resolved_base) {
        return Err(AppError::Security(format!("path escapes output directory: '{:?}'", relative_path)));
    }
    Ok(final_path)
}

/// First free `<stem>.<ext>`, `<stem>_1.<ext>`, `<stem>_2.<ext>`... in `dir`.
pub fn unique_file_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{}.{}", stem, ext));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// SSO / login pages, as opposed to course content. Markers only count at
/// the start of a word (`/lesson-3` is not a login page).
pub fn is_login_url(url: &str) -> bool {
    LOGIN_URL_RE.is_match(url)
}

/// A Canvas modules index (`.../modules`), not an individual module item.
pub fn is_modules_index(url: &str) -> bool {
    url.contains(constants::canvas::MODULES_PATH) && !url.contains(constants::canvas::MODULE_ITEMS_PATH)
}

/// Signed Kaltura URLs carry their session token in the query and in a
/// `/ks/<token>` path segment. Both are removed before a URL is logged or
/// stored.
pub fn redact_url(url: &str) -> String {
    let without_query = match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    KS_SEGMENT_RE.replace_all(&without_query, "/ks/***").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(redact_url("https://cdn/x.vtt?ks=secret"), "https://cdn/x.vtt");
        assert_eq!(
            redact_url("https://cdnapisec.kaltura.com/api_v3/caption/serve/ks/SECRET/id/1_cap?x=2#t"),
            "https://cdnapisec.kaltura.com/api_v3/caption/serve/ks/***/id/1_cap"
        );
        assert_eq!(redact_url("not a url?ks=1"), "not a url");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a\\b/c:d*e?f\"g<h>i|j"), "a b c d e f g h i j".to_string());
        assert_eq!(sanitize_filename(" . my file. "), "my file".to_string());
        assert_eq!(sanitize_filename("a  b   c"), "a b c".to_string());
        assert_eq!(sanitize_filename("CON.txt"), "_CON.txt".to_string());
        assert_eq!(sanitize_filename("aux"), "_aux".to_string());
        assert_eq!(sanitize_filename(""), "unknown".to_string());
        assert_eq!(sanitize_filename("<>|"), "unnamed".to_string());

        let long = "Lecture ".repeat(30);
        assert!(sanitize_filename(&long).len() <= constants::MAX_FILENAME_BYTES);
        let wide = "講義".repeat(40);
        let cut = sanitize_filename(&wide);
        assert!(cut.len() <= constants::MAX_FILENAME_BYTES);
        assert!(cut.chars().all(|c| c == '講' || c == '義'));
    }

    #[test]
    fn test_safe_dir_name() {
        assert_eq!(safe_dir_name("Week 1: Intro & Setup"), "Week_1_Intro_Setup");
        assert_eq!(safe_dir_name("  a / b  "), "a_b");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 60), "short");
        assert_eq!(truncate_text("abcdefghij", 8), "abcde...");
    }

    #[test]
    fn test_unique_file_path_adds_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_file_path(dir.path(), "Intro", "txt");
        assert!(first.ends_with("Intro.txt"));
        std::fs::write(&first, "x").unwrap();
        let second = unique_file_path(dir.path(), "Intro", "txt");
        assert!(second.ends_with("Intro_1.txt"));
        std::fs::write(&second, "x").unwrap();
        assert!(unique_file_path(dir.path(), "Intro", "txt").ends_with("Intro_2.txt"));
    }

    #[test]
    fn test_secure_join_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(secure_join_path(dir.path(), Path::new("Module 1/a.txt")).is_ok());
        assert!(matches!(
            secure_join_path(dir.path(), Path::new("../escape.txt")),
            Err(AppError::Security(_))
        ));
    }

    #[test]
    fn test_url_shapes() {
        assert!(is_login_url("https://sso.school.edu/idp/profile/SAML2"));
        assert!(is_login_url("https://canvas.school.edu/login/canvas"));
        assert!(!is_login_url("https://canvas.school.edu/courses/12/modules"));
        assert!(!is_login_url("https://canvas.school.edu/courses/12/pages/lesson-3"));
        assert!(is_modules_index("https://canvas.school.edu/courses/12/modules"));
        assert!(!is_modules_index("https://canvas.school.edu/courses/12/modules/items/99"));
        assert!(!is_modules_index("https://canvas.school.edu/courses/12/pages/week-1"));
    }
}
