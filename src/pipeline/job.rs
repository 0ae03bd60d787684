// src/pipeline/job.rs

use super::{RunReport, writer::TranscriptWriter};
use crate::{
    ExtractionContext,
    browser::{ObserveOptions, PageSession, evaluate_into, scripts},
    error::*,
    extractor::{CaptionInterceptor, FallbackScraper},
    ledger::Ledger,
    models::{ExtractionOutcome, ExtractionStatus, VideoTask},
    symbols, ui, utils,
};
use colored::Colorize;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::{path::PathBuf, sync::atomic::Ordering};

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct VideoMetadata {
    title: Option<String>,
    entry_id: Option<String>,
}

/// Sequential per-video extraction: network interception first, the UI
/// fallbacks second, and a last look at late caption responses. Every state
/// change goes through the ledger before the next video starts.
pub struct ExtractionPipeline {
    context: ExtractionContext,
    interceptor: CaptionInterceptor,
    fallback: FallbackScraper,
    writer: TranscriptWriter,
}

impl ExtractionPipeline {
    pub fn new(context: ExtractionContext, output_dir: impl Into<PathBuf>) -> Self {
        let client = (*context.http_client).clone();
        let interceptor = CaptionInterceptor::new(client.clone(), context.config.caption_wait);
        let fallback = FallbackScraper::new(client, context.config.ui_wait);
        Self {
            context,
            interceptor,
            fallback,
            writer: TranscriptWriter::new(output_dir),
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackScraper) -> Self {
        self.fallback = fallback;
        self
    }

    /// Processes `tasks` in order. A fatal error stops the run after the
    /// current video has been settled in the ledger; anything else is
    /// recorded against that video and the run moves on.
    pub async fn run(&self, ledger: &mut Ledger, tasks: Vec<VideoTask>) -> AppResult<RunReport> {
        let mut report = RunReport::start_batch(tasks.len());
        let pbar = ui::new_tasks_progress_bar(tasks.len() as u64, "Videos");

        for (i, task) in tasks.iter().enumerate() {
            if self.context.cancellation_token.load(Ordering::Relaxed) {
                pbar.abandon();
                return Err(AppError::UserInterrupt);
            }
            if i > 0 && !self.context.config.inter_video_delay.is_zero() {
                tokio::time::sleep(self.context.config.inter_video_delay).await;
            }

            pbar.suspend(|| {
                println!(
                    "\n{} [{}/{}] {}",
                    *symbols::INFO,
                    i + 1,
                    tasks.len(),
                    utils::truncate_text(&task.title, crate::constants::UI_WIDTH - 12).bold()
                );
            });
            ledger.begin(&task.source_url)?;

            let (mut outcome, fatal) = match self.extract_one(task).await {
                Ok(outcome) => (outcome, None),
                Err(e) if e.is_fatal() => (ExtractionOutcome::failed(e.to_string()), Some(e)),
                Err(e) => {
                    warn!("Extraction of '{}' failed: {}", task.source_url, e);
                    (ExtractionOutcome::failed(format!("Navigation/extraction error: {}", e)), None)
                }
            };

            if let Some(transcript) = &outcome.transcript {
                match self.writer.write(&task.module_name, &display_title(task, &outcome), &transcript.text) {
                    Ok(path) => outcome.transcript_path = Some(path),
                    Err(e) => {
                        error!("Writing transcript for '{}' failed: {}", task.source_url, e);
                        outcome.errors.push(format!("could not write transcript: {}", e));
                        outcome.transcript = None;
                    }
                }
            }

            let errors = outcome.errors.clone();
            let status = ledger.record_outcome(&task.source_url, outcome)?;
            let title = ledger
                .get(&task.source_url)
                .map(|t| t.title.clone())
                .unwrap_or_else(|| task.title.clone());
            pbar.suspend(|| print_task_result(status, &errors));
            report.record(&title, status, errors);
            pbar.inc(1);

            if let Some(e) = fatal {
                pbar.abandon();
                return Err(e);
            }
        }

        pbar.finish_and_clear();
        Ok(report)
    }

    /// One video, one page. The page is always closed before returning.
    async fn extract_one(&self, task: &VideoTask) -> AppResult<ExtractionOutcome> {
        let page = self
            .context
            .driver
            .open_observed(&task.source_url, ObserveOptions::caption_resolution())
            .await?;
        let result = self.extract_from_page(page.as_ref()).await;
        if let Err(e) = page.close().await {
            debug!("Closing page for '{}' failed: {}", task.source_url, e);
        }
        result
    }

    async fn extract_from_page(&self, page: &dyn PageSession) -> AppResult<ExtractionOutcome> {
        let landed = page.current_url().await?;
        if utils::is_login_url(&landed) {
            warn!("Redirected to login page: {}", landed);
            return Err(AppError::AuthInvalid);
        }

        let mut outcome = ExtractionOutcome::default();
        let mut transcript = self.interceptor.extract(page, &mut outcome.errors).await;
        if transcript.is_none() {
            transcript = self.fallback.extract(page, &mut outcome.errors).await;
        }
        if transcript.is_none() {
            transcript = self.interceptor.second_chance(page, &mut outcome.errors).await;
        }
        outcome.transcript = transcript;

        match evaluate_into::<VideoMetadata>(page, "video metadata", scripts::VIDEO_METADATA).await {
            Ok(meta) => {
                outcome.page_title = meta.title;
                outcome.kaltura_entry_id = meta.entry_id.filter(|id| !id.is_empty() && id != "null");
            }
            Err(e) => debug!("Metadata read failed: {}", e),
        }
        if outcome.page_title.is_none() {
            outcome.page_title = page.title().await.ok().filter(|t| !t.trim().is_empty());
        }
        info!(
            "Extraction finished, transcript: {}, errors: {}",
            outcome.transcript.is_some(),
            outcome.errors.len()
        );
        Ok(outcome)
    }
}

/// The ledger title, unless it is the `Unknown` placeholder and the page
/// told us something better.
fn display_title(task: &VideoTask, outcome: &ExtractionOutcome) -> String {
    match &outcome.page_title {
        Some(t) if task.title == "Unknown" && !t.trim().is_empty() => t.trim().to_string(),
        _ => task.title.clone(),
    }
}

fn print_task_result(status: ExtractionStatus, errors: &[String]) {
    let (symbol, color) = status.get_display_info();
    let label = match status {
        ExtractionStatus::Succeeded => "transcript saved",
        _ => "no transcript",
    };
    println!("    {} {}", symbol, color(label.into()));
    if status != ExtractionStatus::Succeeded {
        for e in errors {
            println!("      {} {}", "!".yellow(), e.dimmed());
        }
    }
}
