// src/pipeline/mod.rs

pub mod auth;
pub mod debug;
mod job;
pub mod writer;

pub use job::ExtractionPipeline;
pub use writer::TranscriptWriter;

use crate::{constants, models::ExtractionStatus, symbols, ui, utils};
use colored::*;
use log::info;
use std::{collections::BTreeMap, path::PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Per-video result line for the closing summary.
#[derive(Debug, Clone)]
pub struct RunEntry {
    pub title: String,
    pub status: ExtractionStatus,
    pub errors: Vec<String>,
}

/// Accumulates what a single run did. The ledger remains the durable record;
/// this only drives the end-of-run report.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    stats: RunStats,
    entries: Vec<RunEntry>,
}

impl RunReport {
    pub fn start_batch(total: usize) -> Self {
        info!("Starting extraction run, {} video(s)", total);
        Self {
            stats: RunStats { total, ..Default::default() },
            entries: Vec::with_capacity(total),
        }
    }

    pub fn record(&mut self, title: &str, status: ExtractionStatus, errors: Vec<String>) {
        match status {
            ExtractionStatus::Succeeded => self.stats.succeeded += 1,
            _ => {
                log::error!("'{}' ended as {:?}: {:?}", title, status, errors);
                self.stats.failed += 1;
            }
        }
        self.entries.push(RunEntry {
            title: title.to_string(),
            status,
            errors,
        });
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn entries(&self) -> &[RunEntry] {
        &self.entries
    }

    pub fn did_all_succeed(&self) -> bool {
        self.stats.failed == 0
    }

    pub fn print_report(&self, output_dir: &std::path::Path, metadata_path: &std::path::Path) {
        let stats = &self.stats;
        info!(
            "Run report: Total={}, Succeeded={}, Failed={}",
            stats.total, stats.succeeded, stats.failed
        );

        ui::print_sub_header("Results");
        for entry in &self.entries {
            let (symbol, color) = entry.status.get_display_info();
            println!(
                "  {} {}",
                symbol,
                color(utils::truncate_chars(&entry.title, constants::TITLE_TRUNCATE_LENGTH).normal())
            );
            for error in &entry.errors {
                println!("      {} {}", "!".yellow(), error.dimmed());
            }
        }

        let failures: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|e| e.status != ExtractionStatus::Succeeded)
            .map(|e| {
                let reason = e.errors.last().cloned().unwrap_or_else(|| "unknown".to_string());
                (e.title.clone(), reason)
            })
            .collect();
        if !failures.is_empty() {
            println!("\n{} Failed videos ({}):", *symbols::FAIL, failures.len());
            print_grouped_report(&failures, |s| s.red());
        }

        ui::print_sub_header("Summary");
        println!("  Videos processed:  {}", stats.total);
        println!("  Transcripts found: {}", stats.succeeded.to_string().green());
        println!("  Output directory:  {}", output_dir.display());
        println!("  Metadata:          {}", metadata_path.display());
        if stats.total > 0 && self.did_all_succeed() {
            println!("{} All {} video(s) have transcripts.", *symbols::OK, stats.total);
        } else if stats.failed > 0 {
            println!(
                "{} {} | {}  (rerun with --retry-failed)",
                *symbols::INFO,
                format!("Succeeded: {}", stats.succeeded).green(),
                format!("Failed: {}", stats.failed).red(),
            );
        }
    }
}

/// Groups `(title, reason)` pairs by reason, both sorted.
fn print_grouped_report(items: &[(String, String)], color_fn: fn(ColoredString) -> ColoredString) {
    let mut grouped: BTreeMap<&String, Vec<&String>> = BTreeMap::new();
    for (title, reason) in items {
        grouped.entry(reason).or_default().push(title);
    }
    for (reason, mut titles) in grouped {
        println!("  - {}", color_fn(format!("Reason: {}", reason).into()));
        titles.sort();
        for title in titles {
            println!("    - {}", title);
        }
    }
}

/// `<output_dir>/metadata.json`
pub fn metadata_path(output_dir: &std::path::Path) -> PathBuf {
    output_dir.join(constants::METADATA_FILE_NAME)
}
