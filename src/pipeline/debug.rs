// src/pipeline/debug.rs

use crate::{
    browser::{BrowserDriver, ObserveOptions, ObservedResponse, PageSession, evaluate_into, scripts},
    config::AppConfig,
    constants,
    error::*,
    models::{
        VideoTask,
        debug::{DebugReport, ElementInfo, FrameReport, IframeInfo, NetworkHit, PlayerConfig, TextTrack},
    },
    symbols, ui, utils,
};
use log::{debug, info, warn};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CaptionElements {
    elements: Vec<ElementInfo>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TracksAndIframes {
    tracks: Vec<TextTrack>,
    iframes: Vec<IframeInfo>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Buttons {
    transcript_buttons: Vec<ElementInfo>,
    captions_buttons: Vec<ElementInfo>,
}

/// Deep inspection of a single video page for `--debug` runs. Touches
/// neither the ledger nor the transcripts directory.
pub struct DebugInspector {
    driver: Arc<dyn BrowserDriver>,
    config: Arc<AppConfig>,
}

impl DebugInspector {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: Arc<AppConfig>) -> Self {
        Self { driver, config }
    }

    /// Never fails on page problems: they end up in `report.error`. Only a
    /// fatal error (e.g. the browser is gone) is returned.
    pub async fn inspect(&self, task: &VideoTask) -> AppResult<DebugReport> {
        ui::print_header(&format!("DEBUG: {}", utils::truncate_chars(&task.title, constants::TITLE_TRUNCATE_LENGTH)));
        println!("URL: {}", task.source_url);

        let mut report = DebugReport {
            title: task.title.clone(),
            source_url: task.source_url.clone(),
            ..Default::default()
        };

        let page = match self.driver.open_observed(&task.source_url, ObserveOptions::debug_capture()).await {
            Ok(page) => page,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Debug page failed to open: {}", e);
                report.error = Some(e.to_string());
                report.suggested_actions = suggest_actions(&report);
                return Ok(report);
            }
        };

        println!("    DOM loaded, waiting {:?} for the player to initialise...", self.config.debug_settle);
        tokio::time::sleep(self.config.debug_settle).await;

        if let Err(e) = collect(page.as_ref(), &mut report).await {
            if e.is_fatal() {
                if let Err(close_err) = page.close().await {
                    debug!("Closing debug page failed: {}", close_err);
                }
                return Err(e);
            }
            warn!("Debug inspection incomplete: {}", e);
            report.error = Some(e.to_string());
        }
        if let Err(e) = page.close().await {
            debug!("Closing debug page failed: {}", e);
        }

        report.suggested_actions = suggest_actions(&report);
        Ok(report)
    }
}

async fn collect(page: &dyn PageSession, report: &mut DebugReport) -> AppResult<()> {
    report.final_url = Some(page.current_url().await?);
    report.page_title = page.title().await.ok();
    println!("    Final URL:   {}", report.final_url.as_deref().unwrap_or_default());
    println!("    Page title:  {}", report.page_title.as_deref().unwrap_or_default());

    // Scripts run in the top document; child frames are listed but not searched.
    let frames = page.frames().await?;
    println!("    Frames ({} total)...", frames.len());
    for (i, frame) in frames.into_iter().enumerate() {
        let mut frame_report = FrameReport {
            url: frame.url,
            name: frame.name,
            ..Default::default()
        };
        if i == 0 {
            frame_report.title = report.page_title.clone();
            match evaluate_into::<CaptionElements>(page, "caption elements", scripts::DEBUG_CAPTION_ELEMENTS).await {
                Ok(found) => frame_report.transcript_caption_elements = found.elements,
                Err(e) => frame_report.transcript_caption_elements_error = Some(e.to_string()),
            }
        }
        println!(
            "      Frame: {} [{} element(s)]",
            utils::truncate_chars(&frame_report.url, 80),
            frame_report.transcript_caption_elements.len()
        );
        report.frames.push(frame_report);
    }

    let mut responses = Vec::new();
    while let Some(response) = page.next_response(DRAIN_POLL).await {
        responses.push(response);
    }
    println!("    Network ({} matching responses)...", responses.len());
    report.network_urls = group_network_hits(&responses);

    let dom: TracksAndIframes = evaluate_into(page, "text tracks", scripts::DEBUG_TRACKS).await?;
    report.text_tracks = dom.tracks;
    report.iframes = dom.iframes;

    let buttons: Buttons = evaluate_into(page, "caption buttons", scripts::DEBUG_BUTTONS).await?;
    report.transcript_buttons = buttons.transcript_buttons;
    report.captions_buttons = buttons.captions_buttons;

    report.player_config = Some(evaluate_into::<PlayerConfig>(page, "player config", scripts::PLAYER_CONFIG).await?);
    Ok(())
}

/// A response is listed under every key its URL contains.
pub fn group_network_hits(responses: &[ObservedResponse]) -> BTreeMap<String, Vec<NetworkHit>> {
    let mut grouped: BTreeMap<String, Vec<NetworkHit>> = BTreeMap::new();
    for response in responses {
        let url = response.url.to_lowercase();
        for key in constants::kaltura::DEBUG_NETWORK_KEYS {
            if url.contains(key) {
                grouped.entry(key.to_string()).or_default().push(NetworkHit {
                    url: response.url.clone(),
                    status: response.status,
                    content_type: response.mime_type.clone(),
                });
            }
        }
    }
    grouped
}

pub fn suggest_actions(report: &DebugReport) -> Vec<String> {
    let mut actions = Vec::new();
    let element_count: usize = report.frames.iter().map(|f| f.transcript_caption_elements.len()).sum();
    if !report.text_tracks.is_empty()
        || !report.transcript_buttons.is_empty()
        || !report.captions_buttons.is_empty()
        || element_count > 0
    {
        actions.push("Transcript/caption UI elements found; a button may need to be clicked first".to_string());
    }
    let has_network = |key: &str| report.network_urls.get(key).is_some_and(|hits| !hits.is_empty());
    if has_network("vtt") || has_network("caption") {
        actions.push("Caption URLs seen in network traffic; they can be fetched directly".to_string());
    }
    if report
        .player_config
        .as_ref()
        .is_some_and(|p| !p.captions.is_empty() || !p.caption_urls.is_empty())
    {
        actions.push("Caption/VTT URLs in page scripts; check player_config.caption_urls".to_string());
    }
    if actions.is_empty() {
        actions.push("No transcript/caption sources detected; the video probably has no captions".to_string());
    }
    actions
}

/// Writes `kaltura_debug.json` into `output_dir`.
pub fn save_report(report: &DebugReport, output_dir: &Path) -> AppResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(constants::DEBUG_FILE_NAME);
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    info!("Debug report saved to {:?}", path);
    Ok(path)
}

pub fn print_summary(report: &DebugReport) {
    ui::print_sub_header("Debug summary");
    println!("Final URL:          {}", report.final_url.as_deref().unwrap_or("-"));
    println!("Page title:         {}", report.page_title.as_deref().unwrap_or("-"));
    println!("Frames:             {}", report.frames.len());
    for frame in &report.frames {
        let n = frame.transcript_caption_elements.len();
        let tag = if n > 0 { format!("  [{} element(s)]", n) } else { String::new() };
        println!("  {}{}", utils::truncate_chars(&frame.url, 80), tag);
    }
    let count = |key: &str| report.network_urls.get(key).map_or(0, Vec::len);
    println!(
        "Network  vtt={} srt={} caption={} kaltura={}",
        count("vtt"),
        count("srt"),
        count("caption"),
        count("kaltura")
    );
    println!("Text tracks:        {}", report.text_tracks.len());
    println!("Transcript buttons: {}", report.transcript_buttons.len());
    if let Some(player) = &report.player_config {
        println!(
            "Entry ID: {}  Media ID: {}",
            player.entry_id.as_deref().unwrap_or("-"),
            player.media_id.as_deref().unwrap_or("-")
        );
        if !player.caption_urls.is_empty() {
            println!("Caption URLs in scripts: {}", player.caption_urls.len());
            for url in player.caption_urls.iter().take(3) {
                println!("  {}", utils::truncate_chars(url, 90));
            }
        }
    }
    if let Some(error) = &report.error {
        println!("{} Error: {}", *symbols::FAIL, error);
    }
    println!("\nSuggested actions:");
    for action in &report.suggested_actions {
        println!("  -> {}", action);
    }
}
