// src/ledger/mod.rs

//! Per-video status records, persisted after every change so an interrupted
//! run loses at most the task in flight. The same file is the output
//! directory's `metadata.json`.

use crate::{
    constants,
    error::{AppError, AppResult},
    models::{ExtractionOutcome, ExtractionStatus, VideoTask},
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

const INTERRUPTED: &str = "interrupted during a previous run";
const NO_TRANSCRIPT: &str = "no transcript found";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerFile {
    version: u32,
    updated_at: DateTime<Utc>,
    total_videos: usize,
    transcripts_found: usize,
    videos: Vec<VideoTask>,
}

/// What [`Ledger::reconcile`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub recovered: usize,
}

pub struct Ledger {
    path: PathBuf,
    tasks: Vec<VideoTask>,
    index: HashMap<String, usize>,
}

impl Ledger {
    /// Loads `path` if it exists, otherwise starts empty (nothing is written
    /// until the first change). A file that cannot be parsed is an error:
    /// overwriting it would throw away the record of finished work.
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let tasks = if path.is_file() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read ledger '{}'", path.display()))?;
            let file: LedgerFile = serde_json::from_str(&content).map_err(|e| {
                AppError::LedgerState(format!("'{}' is not a valid ledger: {}", path.display(), e))
            })?;
            if file.version != constants::LEDGER_VERSION {
                return Err(AppError::LedgerState(format!(
                    "'{}' has version {}, expected {}",
                    path.display(),
                    file.version,
                    constants::LEDGER_VERSION
                )));
            }
            debug!("Loaded ledger {:?} with {} task(s)", path, file.videos.len());
            file.videos
        } else {
            Vec::new()
        };
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.source_url.clone(), i))
            .collect();
        Ok(Self { path, tasks, index })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tasks(&self) -> &[VideoTask] {
        &self.tasks
    }

    pub fn get(&self, source_url: &str) -> Option<&VideoTask> {
        self.index.get(source_url).map(|&i| &self.tasks[i])
    }

    pub fn total_videos(&self) -> usize {
        self.tasks.len()
    }

    pub fn transcripts_found(&self) -> usize {
        self.tasks.iter().filter(|t| t.transcript_found).count()
    }

    /// Merges freshly built tasks into the ledger and turns any task left
    /// `in_progress` by a crashed run into `failed`, so it is picked up
    /// again. Existing records keep their state.
    pub fn reconcile(&mut self, tasks: Vec<VideoTask>) -> AppResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for task in self.tasks.iter_mut().filter(|t| t.status == ExtractionStatus::InProgress) {
            warn!("Task '{}' was left in progress, marking it failed", task.source_url);
            task.transition(ExtractionStatus::Failed)?;
            task.errors.push(INTERRUPTED.to_string());
            report.recovered += 1;
        }

        for task in tasks {
            if self.index.contains_key(&task.source_url) {
                continue;
            }
            self.index.insert(task.source_url.clone(), self.tasks.len());
            self.tasks.push(task);
            report.added += 1;
        }

        if report != ReconcileReport::default() || !self.path.exists() {
            self.persist()?;
        }
        info!(
            "Ledger reconciled: {} added, {} recovered, {} total",
            report.added,
            report.recovered,
            self.tasks.len()
        );
        Ok(report)
    }

    /// With `retry_failed_only`, exactly the `failed` tasks; otherwise every
    /// task that has not `succeeded`. Selected `failed` tasks are reset to
    /// `pending`. Succeeded tasks are never selected.
    pub fn select_for_run(&mut self, retry_failed_only: bool) -> AppResult<Vec<VideoTask>> {
        let mut selected = Vec::new();
        let mut reset = 0;
        for task in &mut self.tasks {
            let pick = match task.status {
                ExtractionStatus::Failed => true,
                ExtractionStatus::Pending => !retry_failed_only,
                ExtractionStatus::Succeeded | ExtractionStatus::InProgress => false,
            };
            if !pick {
                continue;
            }
            if task.status == ExtractionStatus::Failed {
                task.transition(ExtractionStatus::Pending)?;
                reset += 1;
            }
            selected.push(task.clone());
        }
        if reset > 0 {
            self.persist()?;
        }
        debug!("Selected {} task(s) (retry_failed_only: {})", selected.len(), retry_failed_only);
        Ok(selected)
    }

    /// Marks a task `in_progress` and persists before any work starts.
    pub fn begin(&mut self, source_url: &str) -> AppResult<()> {
        let task = self.task_mut(source_url)?;
        task.transition(ExtractionStatus::InProgress)?;
        task.attempts += 1;
        task.last_attempt_at = Some(Utc::now());
        task.errors.clear();
        self.persist()
    }

    /// Settles an `in_progress` task: `succeeded` with its transcript
    /// attached, or `failed` with the accumulated errors.
    pub fn record_outcome(&mut self, source_url: &str, outcome: ExtractionOutcome) -> AppResult<ExtractionStatus> {
        let task = self.task_mut(source_url)?;
        if task.status != ExtractionStatus::InProgress {
            return Err(AppError::LedgerState(format!(
                "'{}' is {:?}, not in progress",
                source_url, task.status
            )));
        }

        if let Some(entry_id) = outcome.kaltura_entry_id {
            task.kaltura_entry_id = Some(entry_id);
        }
        if let Some(title) = outcome.page_title.filter(|t| !t.trim().is_empty())
            && task.title == "Unknown"
        {
            task.title = title.trim().to_string();
        }
        task.errors.extend(outcome.errors);

        let status = match outcome.transcript {
            Some(transcript) => {
                task.attach_transcript(transcript)?;
                task.transcript_path = outcome.transcript_path;
                ExtractionStatus::Succeeded
            }
            None => {
                if task.errors.is_empty() {
                    task.errors.push(NO_TRANSCRIPT.to_string());
                }
                ExtractionStatus::Failed
            }
        };
        task.transition(status)?;
        self.persist()?;
        Ok(status)
    }

    fn task_mut(&mut self, source_url: &str) -> AppResult<&mut VideoTask> {
        let idx = *self
            .index
            .get(source_url)
            .ok_or_else(|| AppError::LedgerState(format!("unknown task '{}'", source_url)))?;
        Ok(&mut self.tasks[idx])
    }

    /// Write-to-temp then rename, so readers never see a half-written file.
    fn persist(&self) -> AppResult<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let file = LedgerFile {
            version: constants::LEDGER_VERSION,
            updated_at: Utc::now(),
            total_videos: self.total_videos(),
            transcripts_found: self.transcripts_found(),
            videos: self.tasks.clone(),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(serde_json::to_string_pretty(&file)?.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscoveredLink, LinkType, Transcript, TranscriptSourceType, VideoProvider};

    fn task(url: &str) -> VideoTask {
        VideoTask::from_link(&DiscoveredLink {
            text: format!("Video {}", url),
            href: url.to_string(),
            containing_module: "Module 1".into(),
            canvas_item_text: None,
            link_type: LinkType::Anchor,
            video_provider: VideoProvider::Kaltura,
        })
        .unwrap()
    }

    fn success() -> ExtractionOutcome {
        ExtractionOutcome {
            transcript: Some(Transcript {
                text: "hello".into(),
                source_type: TranscriptSourceType::NetworkIntercept,
                origin: "https://cdn/x.vtt".into(),
            }),
            transcript_path: Some("Module 1/a.txt".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_outcomes_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let mut ledger = Ledger::open(&path).unwrap();
        ledger.reconcile(vec![task("a"), task("b")]).unwrap();

        ledger.begin("a").unwrap();
        assert_eq!(ledger.record_outcome("a", success()).unwrap(), ExtractionStatus::Succeeded);
        ledger.begin("b").unwrap();
        assert_eq!(
            ledger.record_outcome("b", ExtractionOutcome::default()).unwrap(),
            ExtractionStatus::Failed
        );

        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.total_videos(), 2);
        assert_eq!(reopened.transcripts_found(), 1);
        assert_eq!(reopened.get("b").unwrap().errors, vec![NO_TRANSCRIPT.to_string()]);
        assert_eq!(reopened.get("a").unwrap().transcript_path.as_deref(), Some("Module 1/a.txt"));

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["totalVideos"], 2);
        assert_eq!(raw["transcriptsFound"], 1);
    }

    #[test]
    fn test_selection_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("metadata.json")).unwrap();
        ledger.reconcile(vec![task("ok"), task("bad"), task("new")]).unwrap();
        ledger.begin("ok").unwrap();
        ledger.record_outcome("ok", success()).unwrap();
        ledger.begin("bad").unwrap();
        ledger.record_outcome("bad", ExtractionOutcome::failed("boom")).unwrap();

        let retry: Vec<_> = ledger.select_for_run(true).unwrap().into_iter().map(|t| t.source_url).collect();
        assert_eq!(retry, vec!["bad"]);
        assert_eq!(ledger.get("bad").unwrap().status, ExtractionStatus::Pending);

        let all: Vec<_> = ledger.select_for_run(false).unwrap().into_iter().map(|t| t.source_url).collect();
        assert_eq!(all, vec!["bad", "new"]);
    }

    #[test]
    fn test_stale_in_progress_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        {
            let mut ledger = Ledger::open(&path).unwrap();
            ledger.reconcile(vec![task("a")]).unwrap();
            ledger.begin("a").unwrap();
            // dropped here without an outcome, like a crash
        }
        let mut ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.get("a").unwrap().status, ExtractionStatus::InProgress);
        let report = ledger.reconcile(vec![task("a")]).unwrap();
        assert_eq!(report, ReconcileReport { added: 0, recovered: 1 });
        assert_eq!(ledger.get("a").unwrap().status, ExtractionStatus::Failed);
        assert_eq!(ledger.select_for_run(false).unwrap().len(), 1);
    }

    #[test]
    fn test_outcome_requires_in_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("metadata.json")).unwrap();
        ledger.reconcile(vec![task("a")]).unwrap();
        assert!(matches!(
            ledger.record_outcome("a", success()),
            Err(AppError::LedgerState(_))
        ));
        assert!(matches!(ledger.begin("missing"), Err(AppError::LedgerState(_))));
    }

    #[test]
    fn test_corrupt_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Ledger::open(&path), Err(AppError::LedgerState(_))));
    }
}
