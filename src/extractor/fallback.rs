// src/extractor/fallback.rs

//! Rendered-page strategies, tried in order when interception found nothing.

use super::{captions::parse_captions, validate::validate_transcript};
use crate::{
    browser::{PageSession, evaluate_into, scripts},
    client::RobustClient,
    error::*,
    models::{Transcript, TranscriptSourceType},
    utils,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Text pulled from the page by one strategy, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: String,
    pub origin: String,
}

#[async_trait]
pub trait FallbackStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this strategy found nothing to read. A strategy must
    /// leave the page as it found it.
    async fn attempt(&self, page: &dyn PageSession) -> AppResult<Option<Candidate>>;
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ControlClick {
    clicked: bool,
    label: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RegionText {
    text: Option<String>,
    selector: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TrackRefs {
    urls: Vec<String>,
}

fn tidy_panel_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Opens the player's transcript panel, reads it, then toggles the control
/// back.
pub struct TranscriptControl {
    pub ui_wait: Duration,
}

#[async_trait]
impl FallbackStrategy for TranscriptControl {
    fn name(&self) -> &'static str {
        "transcript control"
    }

    async fn attempt(&self, page: &dyn PageSession) -> AppResult<Option<Candidate>> {
        let click: ControlClick =
            evaluate_into(page, "transcript control", scripts::ACTIVATE_TRANSCRIPT_CONTROL).await?;
        if !click.clicked {
            return Ok(None);
        }
        debug!("Activated transcript control {:?}", click.label);
        tokio::time::sleep(self.ui_wait).await;

        let panel: AppResult<RegionText> =
            evaluate_into(page, "transcript panel", scripts::READ_TRANSCRIPT_PANEL).await;
        if let Err(e) = page.evaluate(scripts::RESTORE_TRANSCRIPT_CONTROL).await {
            warn!("Could not restore transcript control: {}", e);
        }
        let panel = panel?;
        Ok(panel.text.map(|t| Candidate {
            text: tidy_panel_text(&t),
            origin: panel.selector.unwrap_or_else(|| "transcript panel".to_string()),
        }))
    }
}

/// Fetches `<track>` / player-config caption files directly.
pub struct CaptionTrack {
    pub client: RobustClient,
}

#[async_trait]
impl FallbackStrategy for CaptionTrack {
    fn name(&self) -> &'static str {
        "caption track"
    }

    async fn attempt(&self, page: &dyn PageSession) -> AppResult<Option<Candidate>> {
        let refs: TrackRefs = evaluate_into(page, "caption track scan", scripts::CAPTION_TRACK_REFS).await?;
        if refs.urls.is_empty() {
            return Ok(None);
        }
        let base = Url::parse(&page.current_url().await?).ok();
        for raw in refs.urls {
            let resolved = match &base {
                Some(base) => base.join(&raw).map(|u| u.to_string()).unwrap_or(raw),
                None => raw,
            };
            match self.client.fetch_text(resolved.as_str()).await {
                Ok(body) => {
                    let text = parse_captions(&body);
                    if !text.is_empty() {
                        return Ok(Some(Candidate {
                            text,
                            origin: utils::redact_url(&resolved),
                        }));
                    }
                }
                Err(e) => debug!(
                    "Caption track '{}' fetch failed: {}",
                    utils::redact_url(&resolved),
                    e.without_url()
                ),
            }
        }
        Ok(None)
    }
}

/// Reads any visible captions/transcript container.
pub struct CaptionRegion;

#[async_trait]
impl FallbackStrategy for CaptionRegion {
    fn name(&self) -> &'static str {
        "caption region"
    }

    async fn attempt(&self, page: &dyn PageSession) -> AppResult<Option<Candidate>> {
        let region: RegionText = evaluate_into(page, "caption region scan", scripts::CAPTION_REGION_SCAN).await?;
        Ok(region.text.map(|t| Candidate {
            text: tidy_panel_text(&t),
            origin: region.selector.unwrap_or_else(|| "caption region".to_string()),
        }))
    }
}

pub struct FallbackScraper {
    strategies: Vec<Box<dyn FallbackStrategy>>,
}

impl FallbackScraper {
    pub fn new(client: RobustClient, ui_wait: Duration) -> Self {
        Self::with_strategies(vec![
            Box::new(TranscriptControl { ui_wait }),
            Box::new(CaptionTrack { client }),
            Box::new(CaptionRegion),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn FallbackStrategy>>) -> Self {
        Self { strategies }
    }

    /// Runs strategies in order and stops at the first text that validates.
    /// Every miss, rejection or strategy error is noted in `errors`.
    pub async fn extract(&self, page: &dyn PageSession, errors: &mut Vec<String>) -> Option<Transcript> {
        for strategy in &self.strategies {
            let name = strategy.name();
            match strategy.attempt(page).await {
                Ok(Some(candidate)) => match validate_transcript(&candidate.text) {
                    Ok(()) => {
                        info!("Transcript via {} ({} chars)", name, candidate.text.len());
                        return Some(Transcript {
                            text: candidate.text,
                            source_type: TranscriptSourceType::UiFallback,
                            origin: candidate.origin,
                        });
                    }
                    Err(reason) => errors.push(format!("{}: text rejected ({})", name, reason)),
                },
                Ok(None) => errors.push(format!("{}: nothing found", name)),
                Err(e) => {
                    warn!("Fallback strategy '{}' failed: {}", name, e);
                    errors.push(format!("{}: {}", name, e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tidy_panel_text() {
        assert_eq!(tidy_panel_text("  a \n\n\t b\n   \n c "), "a\nb\nc");
    }
}
