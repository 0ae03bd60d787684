// src/extractor/validate.rs

use regex::Regex;
use std::{fmt, sync::LazyLock};

/// Page artefacts that end up in "transcript" containers when a selector
/// grabs a style sheet or a bundle instead of captions.
static REJECT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)sourceMappingURL",
        r"(?i)\.plugin-button__",
        r"(?i)\.scss\.",
        r"(?i)base64,",
        r"(?i)\{\s*[a-z-]+\s*:",
        r"(?i)background-color:",
        r"(?i)@media\s",
        r"(?i)@import\s",
        r"(?i)webpack://",
        r"(?i)__webpack_require__",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const MIN_CHARS: usize = 50;
const MIN_WORDS: usize = 10;
const MAX_BRACES: usize = 5;
const MAX_SEMICOLONS: usize = 10;
const MIN_ALPHA_RATIO: f64 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    TooShort,
    MarkupPattern(String),
    TooManyBraces,
    LowAlphaRatio,
    NotEnoughWords,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooShort => write!(f, "too short"),
            Rejection::MarkupPattern(p) => write!(f, "looks like page markup ({})", p),
            Rejection::TooManyBraces => write!(f, "too many braces or semicolons"),
            Rejection::LowAlphaRatio => write!(f, "too few letters"),
            Rejection::NotEnoughWords => write!(f, "not enough words"),
        }
    }
}

/// Decides whether candidate text is plausibly spoken-word captions.
pub fn validate_transcript(text: &str) -> Result<(), Rejection> {
    let char_count = text.chars().count();
    if char_count < MIN_CHARS {
        return Err(Rejection::TooShort);
    }
    if let Some(p) = REJECT_PATTERNS.iter().find(|p| p.is_match(text)) {
        return Err(Rejection::MarkupPattern(p.as_str().trim_start_matches("(?i)").to_string()));
    }
    if text.matches('{').count() > MAX_BRACES || text.matches(';').count() > MAX_SEMICOLONS {
        return Err(Rejection::TooManyBraces);
    }
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    if (alpha as f64) / (char_count as f64) < MIN_ALPHA_RATIO {
        return Err(Rejection::LowAlphaRatio);
    }
    if text.split_whitespace().count() < MIN_WORDS {
        return Err(Rejection::NotEnoughWords);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOKEN: &str = "Welcome back everyone. Today we are going to talk about the borrow checker and why it matters.";

    #[test]
    fn test_accepts_spoken_text() {
        assert_eq!(validate_transcript(SPOKEN), Ok(()));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(validate_transcript("Hello there."), Err(Rejection::TooShort));
        assert!(matches!(
            validate_transcript(".player .plugin-button__icon { background-color: red } and lots more words to pad this out"),
            Err(Rejection::MarkupPattern(_))
        ));
        assert!(matches!(
            validate_transcript("//# sourceMappingURL=app.js.map plus enough filler words to get past the length check"),
            Err(Rejection::MarkupPattern(_))
        ));
        assert_eq!(
            validate_transcript("12:00 13:00 14:00 15:00 16:00 17:00 18:00 19:00 20:00 21:00 22:00 23:00"),
            Err(Rejection::LowAlphaRatio)
        );
        assert_eq!(
            validate_transcript("Supercalifragilisticexpialidocious antidisestablishmentarianism pneumonoultramicroscopic"),
            Err(Rejection::NotEnoughWords)
        );
        assert_eq!(
            validate_transcript("a; b; c; d; e; f; g; h; i; j; k; l; m; and then some more words to be long enough"),
            Err(Rejection::TooManyBraces)
        );
    }
}
