// src/extractor/captions.rs

//! WebVTT / SRT to plain text.

use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?([.,]\d{1,3})?").unwrap());
static CUE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Block headers that never carry spoken text.
const NON_CUE_BLOCKS: &[&str] = &["WEBVTT", "NOTE", "STYLE", "REGION"];

/// Converts a caption file to one line per cue, in source order. Timing
/// lines, cue identifiers, header/NOTE/STYLE blocks and inline markup are
/// dropped; a cue's own line breaks are folded into single spaces.
pub fn parse_captions(content: &str) -> String {
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n");
    let mut out: Vec<String> = Vec::new();

    for block in content.split("\n\n") {
        let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let Some(first) = lines.first() else { continue };
        if NON_CUE_BLOCKS.iter().any(|h| first.starts_with(h)) {
            continue;
        }

        let text_lines = match lines.iter().position(|l| is_timing_line(l)) {
            Some(idx) => &lines[idx + 1..],
            // no timing line: tolerate files with cue text but malformed timings
            None => {
                let start = usize::from(CUE_NUMBER_RE.is_match(first));
                &lines[start..]
            }
        };

        let cue = text_lines
            .iter()
            .filter(|l| !l.contains("-->"))
            .map(|l| clean_line(l))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if cue.is_empty() {
            continue;
        }
        out.push(cue);
    }
    out.join("\n")
}

fn is_timing_line(line: &str) -> bool {
    line.contains("-->") || TIMESTAMP_RE.is_match(line)
}

fn clean_line(line: &str) -> String {
    let stripped = TAG_RE.replace_all(line, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    SPACES_RE.replace_all(decoded.trim(), " ").into_owned()
}
