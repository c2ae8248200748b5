//! Batch runner: apply one mode to every tracked file.
//!
//! Records are processed strictly one after another; each service call is
//! awaited before the next record is touched. A failure on one record is
//! logged, reported to the progress callback and counted in the
//! [`BatchSummary`], and the batch moves on.

use crate::config::ServiceConfig;
use crate::error::{RecordError, XmlpsError};
use crate::record::StepOutcome;
use crate::service::ConversionService;
use crate::store::{discover, FileSet, FileSetStore};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What a run does with the tracked files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Submit every record that has no job yet.
    Submit,
    /// Retrieve every record whose job has completed.
    Retrieve,
    /// Submit, sleep for `wait`, then retrieve.
    Parse { wait: Duration },
}

/// One pass over the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Submit,
    Retrieve,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Submit => "submit",
            Phase::Retrieve => "retrieve",
        })
    }
}

/// Per-outcome counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub submitted: usize,
    pub retrieved: usize,
    pub not_ready: usize,
    pub rejected: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl BatchSummary {
    fn record(&mut self, phase: Phase, outcome: &StepOutcome) {
        match (phase, outcome) {
            (Phase::Submit, StepOutcome::Done) => self.submitted += 1,
            (Phase::Retrieve, StepOutcome::Done) => self.retrieved += 1,
            (_, StepOutcome::NotReady) => self.not_ready += 1,
            (_, StepOutcome::Rejected(_)) => self.rejected += 1,
            (_, StepOutcome::Skipped) => self.skipped += 1,
        }
    }
}

/// Everything a full [`run`] produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub files: FileSet,
    /// Records added by discovery during this run.
    pub discovered: usize,
    /// `None` when no compatible files were found and nothing ran.
    pub summary: Option<BatchSummary>,
}

/// Load, discover, process, save.
///
/// When the merged set is empty nothing is processed and the store is left
/// untouched.
pub async fn run(
    store: &dyn FileSetStore,
    root: &Path,
    mode: Mode,
    service: &dyn ConversionService,
    config: &ServiceConfig,
) -> Result<RunOutput, XmlpsError> {
    let mut files = store.load()?;
    let discovered = discover(root, &mut files, &config.formats, &config.citation_style_hash);

    if files.is_empty() {
        info!("No compatible files with {}", root.display());
        return Ok(RunOutput {
            files,
            discovered,
            summary: None,
        });
    }

    let summary = run_batch(&mut files, mode, service, config).await;
    store.save(&files)?;

    Ok(RunOutput {
        files,
        discovered,
        summary: Some(summary),
    })
}

/// Apply `mode` to every record in `files`.
pub async fn run_batch(
    files: &mut FileSet,
    mode: Mode,
    service: &dyn ConversionService,
    config: &ServiceConfig,
) -> BatchSummary {
    let start = Instant::now();
    let mut summary = BatchSummary::default();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(files.len());
    }

    match mode {
        Mode::Submit => run_phase(files, Phase::Submit, service, config, &mut summary).await,
        Mode::Retrieve => run_phase(files, Phase::Retrieve, service, config, &mut summary).await,
        Mode::Parse { wait } => {
            run_phase(files, Phase::Submit, service, config, &mut summary).await;
            if let Some(ref cb) = config.progress_callback {
                cb.on_wait(wait);
            }
            info!("Waiting {}s before retrieving", wait.as_secs());
            tokio::time::sleep(wait).await;
            run_phase(files, Phase::Retrieve, service, config, &mut summary).await;
        }
    }

    summary.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Batch complete: {} submitted, {} retrieved, {} not ready, {} rejected, {} failed",
        summary.submitted, summary.retrieved, summary.not_ready, summary.rejected, summary.failed
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(&summary);
    }
    summary
}

async fn run_phase(
    files: &mut FileSet,
    phase: Phase,
    service: &dyn ConversionService,
    config: &ServiceConfig,
    summary: &mut BatchSummary,
) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_phase_start(phase, files.len());
    }

    for record in files.records_mut() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_record_start(phase, record);
        }

        let result: Result<StepOutcome, RecordError> = match phase {
            Phase::Submit => record.submit(service, config).await,
            Phase::Retrieve => record.retrieve(service, config).await,
        };

        match result {
            Ok(outcome) => {
                if let StepOutcome::Rejected(ref messages) = outcome {
                    warn!(
                        "{} {}: service refused: {}",
                        phase,
                        record.filepath.display(),
                        messages.join("; ")
                    );
                }
                summary.record(phase, &outcome);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_record_complete(phase, record, &outcome);
                }
            }
            Err(e) => {
                warn!("{} {}: {}", phase, record.filepath.display(), e);
                summary.failed += 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_record_error(phase, record, &e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::progress::BatchProgressCallback;
    use crate::record::tests::FakeService;
    use crate::record::{FileRecord, RecordState};
    use crate::service::{JobId, JobStatus, ServiceOutcome};
    use crate::store::MemoryStore;
    use std::sync::{Arc, Mutex};

    fn files_in(dir: &Path, names: &[&str]) -> FileSet {
        let mut files = FileSet::new();
        for name in names {
            let path = dir.join(name);
            std::fs::write(&path, b"body").unwrap();
            files.insert(FileRecord::new(path, "h"));
        }
        files
    }

    #[tokio::test]
    async fn parse_mode_retrieves_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = files_in(dir.path(), &["A.doc", "B.pdf"]);
        let svc = FakeService::default();

        let summary = run_batch(
            &mut files,
            Mode::Parse { wait: Duration::ZERO },
            &svc,
            &ServiceConfig::default(),
        )
        .await;

        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.retrieved, 2);
        assert!(files.records().all(|r| r.state() == RecordState::Retrieved));
        assert!(dir.path().join("A.nlm3.xml").exists());
        assert!(dir.path().join("B.nlm3.xml").exists());
    }

    #[tokio::test]
    async fn one_failing_record_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = files_in(dir.path(), &["A.doc", "B.doc", "C.doc"]);
        let svc = FakeService::default();
        // Popped from the back: A fails, B and C use the default answer.
        svc.submits.lock().unwrap().push(Err(ServiceError::Transport {
            url: "http://svc".into(),
            reason: "reset".into(),
        }));

        let summary = run_batch(&mut files, Mode::Submit, &svc, &ServiceConfig::default()).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.submitted, 2);
        let states: Vec<_> = files.records().map(FileRecord::state).collect();
        assert_eq!(states, vec![RecordState::New, RecordState::Submitted, RecordState::Submitted]);
    }

    #[tokio::test]
    async fn retrieve_mode_leaves_pending_jobs_for_later() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = files_in(dir.path(), &["A.doc"]);
        for r in files.records_mut() {
            r.job_id = Some(JobId::from(9));
        }
        let svc = FakeService::default();
        svc.statuses
            .lock()
            .unwrap()
            .push(Ok(ServiceOutcome::Accepted(JobStatus(1))));

        let summary =
            run_batch(&mut files, Mode::Retrieve, &svc, &ServiceConfig::default()).await;

        assert_eq!(summary.not_ready, 1);
        assert_eq!(files.records().next().unwrap().state(), RecordState::Pending);
    }

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl BatchProgressCallback for EventLog {
        fn on_phase_start(&self, phase: Phase, total: usize) {
            self.0.lock().unwrap().push(format!("phase {phase} {total}"));
        }
        fn on_wait(&self, wait: Duration) {
            self.0.lock().unwrap().push(format!("wait {}", wait.as_secs()));
        }
        fn on_record_complete(&self, phase: Phase, record: &FileRecord, outcome: &StepOutcome) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{phase} {} {outcome:?}", record.filename));
        }
    }

    #[tokio::test]
    async fn callback_sees_phases_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = files_in(dir.path(), &["A.doc"]);
        let log = Arc::new(EventLog::default());
        let config = ServiceConfig::builder()
            .progress_callback(log.clone())
            .build()
            .unwrap();

        run_batch(&mut files, Mode::Parse { wait: Duration::ZERO }, &FakeService::default(), &config)
            .await;

        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                "phase submit 1".to_string(),
                "submit A.doc Done".to_string(),
                "wait 0".to_string(),
                "phase retrieve 1".to_string(),
                "retrieve A.doc Done".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn run_saves_merged_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Input.doc"), b"body").unwrap();
        let store = MemoryStore::new();

        let out = run(&store, dir.path(), Mode::Submit, &FakeService::default(), &ServiceConfig::default())
            .await
            .unwrap();

        assert_eq!(out.discovered, 1);
        assert_eq!(out.summary.unwrap().submitted, 1);
        let saved = store.load().unwrap();
        assert_eq!(saved, out.files);
        assert!(saved.records().all(|r| !r.to_submit()));
    }

    #[tokio::test]
    async fn run_with_nothing_to_do_skips_save() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"body").unwrap();
        let svc = FakeService::default();

        let out = run(&MemoryStore::new(), dir.path(), Mode::Submit, &svc, &ServiceConfig::default())
            .await
            .unwrap();

        assert!(out.summary.is_none());
        assert!(out.files.is_empty());
        assert!(svc.calls().is_empty());
    }
}
