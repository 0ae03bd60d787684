// src/models/mod.rs

pub mod debug;

use crate::{
    constants,
    error::{AppError, AppResult},
    symbols,
};
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoProvider {
    Kaltura,
    Youtube,
    Vimeo,
    Panopto,
    Yuja,
    Zoom,
    CanvasMedia,
    #[default]
    None,
}

impl VideoProvider {
    pub fn is_video(self) -> bool {
        self != VideoProvider::None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoProvider::Kaltura => "kaltura",
            VideoProvider::Youtube => "youtube",
            VideoProvider::Vimeo => "vimeo",
            VideoProvider::Panopto => "panopto",
            VideoProvider::Yuja => "yuja",
            VideoProvider::Zoom => "zoom",
            VideoProvider::CanvasMedia => "canvas_media",
            VideoProvider::None => "none",
        }
    }
}

impl fmt::Display for VideoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    #[default]
    Anchor,
    Iframe,
}

/// One outbound link found while crawling. Immutable once built; the
/// provider is derived from `href` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredLink {
    pub text: String,
    pub href: String,
    #[serde(default)]
    pub containing_module: String,
    #[serde(default)]
    pub canvas_item_text: Option<String>,
    #[serde(default)]
    pub link_type: LinkType,
    #[serde(default)]
    pub video_provider: VideoProvider,
}

/// A page the crawler gave up on after its retries ran out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPage {
    pub url: String,
    pub label: String,
    pub reason: String,
}

/// Contents of the links file written by `extract-page` / `crawl-course`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkReport {
    pub page_url: String,
    #[serde(default)]
    pub page_title: String,
    pub links: Vec<DiscoveredLink>,
    pub total_links: usize,
    pub video_links_count: usize,
    #[serde(default)]
    pub skipped_pages: Vec<SkippedPage>,
}

impl LinkReport {
    pub fn new(
        page_url: String,
        page_title: String,
        links: Vec<DiscoveredLink>,
        skipped_pages: Vec<SkippedPage>,
    ) -> Self {
        let total_links = links.len();
        let video_links_count = links.iter().filter(|l| l.video_provider.is_video()).count();
        Self {
            page_url,
            page_title,
            links,
            total_links,
            video_links_count,
            skipped_pages,
        }
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::UserInputError(format!(
                "Cannot read links file '{}': {}. Run 'extract-page <url>' or 'crawl-course <url>' first.",
                path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn count_provider(&self, provider: VideoProvider) -> usize {
        self.links.iter().filter(|l| l.video_provider == provider).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    #[default]
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

impl ExtractionStatus {
    /// `pending -> in_progress -> {succeeded, failed}`; only `failed` may go
    /// back to `pending` (retry), and `in_progress -> failed` also covers
    /// stale-ledger recovery.
    pub fn can_transition_to(self, next: ExtractionStatus) -> bool {
        use ExtractionStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Succeeded)
                | (InProgress, Failed)
                | (Failed, Pending)
        )
    }

    pub fn get_display_info(&self) -> (&'static ColoredString, fn(ColoredString) -> ColoredString) {
        match self {
            ExtractionStatus::Succeeded => (&symbols::OK, |s| s.green()),
            ExtractionStatus::Failed => (&symbols::FAIL, |s| s.red()),
            ExtractionStatus::InProgress => (&symbols::WARN, |s| s.yellow()),
            ExtractionStatus::Pending => (&symbols::INFO, |s| s.cyan()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSourceType {
    NetworkIntercept,
    UiFallback,
    #[default]
    None,
}

/// Caption text recovered for one video, tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub source_type: TranscriptSourceType,
    /// Which concrete source produced the text (signed URL, selector, track).
    pub origin: String,
}

/// What one extraction attempt produced, handed to the ledger.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub transcript: Option<Transcript>,
    pub errors: Vec<String>,
    pub page_title: Option<String>,
    pub kaltura_entry_id: Option<String>,
    /// Where the transcript file was written, relative to the output dir.
    pub transcript_path: Option<String>,
}

impl ExtractionOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Default::default()
        }
    }
}

/// One unit of extraction work, derived 1:1 from a Kaltura link.
///
/// `status` is the only field that moves during normal processing;
/// `transcript_text` is set at most once and is never written to the ledger
/// file (the text lives in its own `.txt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTask {
    pub title: String,
    pub source_url: String,
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub provider: VideoProvider,
    #[serde(default)]
    pub link_type: LinkType,
    #[serde(default)]
    pub status: ExtractionStatus,
    #[serde(default)]
    pub transcript_found: bool,
    #[serde(skip)]
    pub transcript_text: Option<String>,
    #[serde(default)]
    pub transcript_source_type: TranscriptSourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kaltura_entry_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl VideoTask {
    /// Builds a task for a Kaltura link; any other provider has no
    /// extraction support and yields `None`.
    pub fn from_link(link: &DiscoveredLink) -> Option<Self> {
        if link.video_provider != VideoProvider::Kaltura {
            return None;
        }
        let title = link.text.trim();
        Some(Self {
            title: if title.is_empty() { "Unknown".to_string() } else { title.to_string() },
            source_url: link.href.clone(),
            module_name: link.containing_module.clone(),
            provider: link.video_provider,
            link_type: link.link_type,
            status: ExtractionStatus::Pending,
            transcript_found: false,
            transcript_text: None,
            transcript_source_type: TranscriptSourceType::None,
            transcript_origin: None,
            transcript_path: None,
            transcript_preview: None,
            kaltura_entry_id: None,
            errors: Vec::new(),
            attempts: 0,
            last_attempt_at: None,
        })
    }

    pub fn transition(&mut self, next: ExtractionStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::LedgerState(format!(
                "'{}' cannot move from {:?} to {:?}",
                self.source_url, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn attach_transcript(&mut self, transcript: Transcript) -> AppResult<()> {
        if self.transcript_text.is_some() || self.transcript_found {
            return Err(AppError::LedgerState(format!(
                "transcript for '{}' was already recorded",
                self.source_url
            )));
        }
        self.transcript_preview = Some(
            transcript
                .text
                .chars()
                .take(constants::TRANSCRIPT_PREVIEW_CHARS)
                .collect(),
        );
        self.transcript_found = true;
        self.transcript_source_type = transcript.source_type;
        self.transcript_origin = Some(transcript.origin);
        self.transcript_text = Some(transcript.text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(href: &str, provider: VideoProvider) -> DiscoveredLink {
        DiscoveredLink {
            text: "  Week 1 Lecture ".into(),
            href: href.into(),
            containing_module: "Module 1".into(),
            canvas_item_text: None,
            link_type: LinkType::Iframe,
            video_provider: provider,
        }
    }

    #[test]
    fn test_task_only_built_for_kaltura_links() {
        assert!(VideoTask::from_link(&link("https://youtube.com/x", VideoProvider::Youtube)).is_none());
        let task = VideoTask::from_link(&link("https://kaf.example/x", VideoProvider::Kaltura)).unwrap();
        assert_eq!(task.title, "Week 1 Lecture");
        assert_eq!(task.module_name, "Module 1");
        assert_eq!(task.status, ExtractionStatus::Pending);
        assert_eq!(task.link_type, LinkType::Iframe);
    }

    #[test]
    fn test_status_transitions() {
        use ExtractionStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Succeeded));
        assert!(InProgress.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
        assert!(!Succeeded.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(InProgress));
    }

    #[test]
    fn test_transcript_written_once() {
        let mut task = VideoTask::from_link(&link("https://kaf.example/x", VideoProvider::Kaltura)).unwrap();
        let t = Transcript {
            text: "hello".into(),
            source_type: TranscriptSourceType::NetworkIntercept,
            origin: "https://cdn/x.vtt".into(),
        };
        task.attach_transcript(t.clone()).unwrap();
        assert!(task.transcript_found);
        assert!(matches!(task.attach_transcript(t), Err(AppError::LedgerState(_))));
    }

    #[test]
    fn test_transcript_text_not_serialized() {
        let mut task = VideoTask::from_link(&link("https://kaf.example/x", VideoProvider::Kaltura)).unwrap();
        task.transcript_text = Some("secret words".into());
        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("secret words"));
        assert!(json.contains("\"sourceUrl\""));
        assert!(json.contains("\"transcriptFound\":false"));
    }
}
