//! Lifecycle of one tracked input file.
//!
//! A [`FileRecord`] moves strictly forward:
//!
//! ```text
//! New ──submit──▶ Submitted ──check_status──▶ Pending ─┐
//!                                  ▲                    │ (re-query)
//!                                  └────────────────────┘
//!                             ──check_status──▶ Completed ──retrieve──▶ Retrieved
//! ```
//!
//! The state is never stored; [`FileRecord::state`] derives it from which
//! fields are set, so a record loaded from an older store is always
//! consistent with itself.
//!
//! ## Status check inside `retrieve`
//!
//! [`FileRecord::retrieve`] performs one [`FileRecord::check_status`] on its
//! own when the job is not yet known to be complete. Callers may poll
//! explicitly first or call `retrieve` alone; both reach the same end state.

use crate::config::ServiceConfig;
use crate::error::RecordError;
use crate::service::{ConversionService, JobId, JobStatus, ServiceOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a record stands, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// No job id yet (never submitted, or every submit so far failed).
    New,
    /// Job id known, status never queried.
    Submitted,
    /// Status queried and not yet completed.
    Pending,
    /// Job completed, output not fetched yet.
    Completed,
    /// Output written to disk.
    Retrieved,
}

/// Result of one lifecycle step that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran and moved the record forward (or refreshed its status).
    Done,
    /// Nothing to do in the record's current state.
    Skipped,
    /// The job is still running.
    NotReady,
    /// The service refused; the record is unchanged and the step can be
    /// retried on a later run.
    Rejected(Vec<String>),
}

/// One input file and its progress through submit → status → retrieve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    // ── Identity ─────────────────────────────────────────────────────────
    pub filepath: PathBuf,
    pub dirname: PathBuf,
    pub filename: String,
    /// File name without its last extension (`Input` for `Input.doc`).
    pub name: String,
    pub ext: String,

    // ── Submission ───────────────────────────────────────────────────────
    pub input_filename: String,
    pub input_path: PathBuf,
    pub citation_style_hash: String,
    pub submitted_at: Option<DateTime<Utc>>,

    // ── Job ──────────────────────────────────────────────────────────────
    pub job_id: Option<JobId>,
    pub job_status: Option<JobStatus>,

    // ── Retrieval ────────────────────────────────────────────────────────
    pub output_format: Option<String>,
    pub output_binary: Option<bool>,
    pub output_filename: Option<String>,
    pub output_path: Option<PathBuf>,
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Start tracking `filepath`; nothing is read from disk.
    pub fn new(filepath: impl Into<PathBuf>, citation_style_hash: impl Into<String>) -> Self {
        let filepath = filepath.into();
        let dirname = filepath.parent().map(Path::to_path_buf).unwrap_or_default();
        let filename = filepath
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (name, ext) = match filename.rsplit_once('.') {
            Some((name, ext)) => (name.to_string(), ext.to_string()),
            None => (filename.clone(), String::new()),
        };

        Self {
            input_filename: filename.clone(),
            input_path: filepath.clone(),
            citation_style_hash: citation_style_hash.into(),
            submitted_at: None,
            job_id: None,
            job_status: None,
            output_format: None,
            output_binary: None,
            output_filename: None,
            output_path: None,
            retrieved_at: None,
            filepath,
            dirname,
            filename,
            name,
            ext,
        }
    }

    /// No job id yet.
    pub fn to_submit(&self) -> bool {
        self.job_id.is_none()
    }

    /// The job is known to be completed.
    pub fn status_ok(&self) -> bool {
        self.job_status.is_some_and(JobStatus::is_completed)
    }

    /// Completed and not yet fetched.
    pub fn to_retrieve(&self) -> bool {
        self.status_ok() && self.retrieved_at.is_none()
    }

    pub fn state(&self) -> RecordState {
        if self.to_submit() {
            RecordState::New
        } else if self.retrieved_at.is_some() {
            RecordState::Retrieved
        } else if self.status_ok() {
            RecordState::Completed
        } else if self.job_status.is_some() {
            RecordState::Pending
        } else {
            RecordState::Submitted
        }
    }

    /// Upload the input file and record the job id.
    ///
    /// A no-op once a job id exists, so submitting twice never creates a
    /// second job.
    pub async fn submit(
        &mut self,
        service: &dyn ConversionService,
        config: &ServiceConfig,
    ) -> Result<StepOutcome, RecordError> {
        if !self.to_submit() {
            return Ok(StepOutcome::Skipped);
        }

        let content = tokio::fs::read(&self.input_path)
            .await
            .map_err(|e| RecordError::ReadInput {
                path: self.input_path.clone(),
                source: e,
            })?;

        let outcome = service
            .submit(
                &config.credentials,
                &self.input_filename,
                content,
                &self.citation_style_hash,
            )
            .await?;

        match outcome {
            ServiceOutcome::Accepted(id) => {
                info!("Submitted {} as job {}", self.input_path.display(), id);
                self.job_id = Some(id);
                self.submitted_at = Some(Utc::now());
                Ok(StepOutcome::Done)
            }
            ServiceOutcome::NotReady => Ok(StepOutcome::NotReady),
            ServiceOutcome::Rejected { messages } => Ok(StepOutcome::Rejected(messages)),
        }
    }

    /// Refresh the job status.
    ///
    /// Runs only when a job id exists and the job is not yet completed; the
    /// returned code is stored verbatim, pending or not.
    pub async fn check_status(
        &mut self,
        service: &dyn ConversionService,
        config: &ServiceConfig,
    ) -> Result<StepOutcome, RecordError> {
        let Some(job_id) = self.job_id.as_ref() else {
            return Ok(StepOutcome::Skipped);
        };
        if self.status_ok() {
            return Ok(StepOutcome::Skipped);
        }

        match service.status(&config.credentials, job_id).await? {
            ServiceOutcome::Accepted(status) => {
                debug!("Job {} status {}", job_id, status);
                self.job_status = Some(status);
                Ok(StepOutcome::Done)
            }
            ServiceOutcome::NotReady => Ok(StepOutcome::NotReady),
            ServiceOutcome::Rejected { messages } => Ok(StepOutcome::Rejected(messages)),
        }
    }

    /// Fetch the configured output format and write it next to the input.
    ///
    /// Checks the status once first unless the job is already known to be
    /// complete. A no-op after a successful retrieve. Refuses to run when the
    /// output file name equals the input's (`Input.docx` with format `docx`).
    pub async fn retrieve(
        &mut self,
        service: &dyn ConversionService,
        config: &ServiceConfig,
    ) -> Result<StepOutcome, RecordError> {
        if self.retrieved_at.is_some() || self.to_submit() {
            return Ok(StepOutcome::Skipped);
        }

        if !self.to_retrieve() {
            if let StepOutcome::Rejected(messages) = self.check_status(service, config).await? {
                return Ok(StepOutcome::Rejected(messages));
            }
        }
        if !self.to_retrieve() {
            return Ok(StepOutcome::NotReady);
        }

        let format = config.formats.lookup(&config.output_format)?;
        let Some(job_id) = self.job_id.as_ref() else {
            return Ok(StepOutcome::Skipped);
        };

        let output_filename = format!("{}.{}", self.name, format.ext);
        let output_path = self.dirname.join(&output_filename);
        if output_path == self.input_path {
            warn!(
                "Output for job {} would overwrite its input {}",
                job_id,
                self.input_path.display()
            );
            return Err(RecordError::OutputOverwritesInput { path: output_path });
        }

        let payload = match service
            .retrieve(&config.credentials, job_id, format.conversion_stage, format.binary)
            .await?
        {
            ServiceOutcome::Accepted(payload) => payload,
            ServiceOutcome::NotReady => return Ok(StepOutcome::NotReady),
            ServiceOutcome::Rejected { messages } => return Ok(StepOutcome::Rejected(messages)),
        };

        tokio::fs::write(&output_path, payload.as_bytes())
            .await
            .map_err(|e| RecordError::WriteOutput {
                path: output_path.clone(),
                source: e,
            })?;

        info!(
            "Retrieved job {} → {} ({} bytes)",
            job_id,
            output_path.display(),
            payload.len()
        );

        self.output_format = Some(config.output_format.clone());
        self.output_binary = Some(format.binary);
        self.output_filename = Some(output_filename);
        self.output_path = Some(output_path);
        self.retrieved_at = Some(Utc::now());
        Ok(StepOutcome::Done)
    }

    /// `to submit`, `to retrieve` or `done`.
    pub fn todo(&self) -> &'static str {
        if self.to_submit() {
            "to submit"
        } else if self.to_retrieve() {
            "to retrieve"
        } else {
            "done"
        }
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let job_id = self
            .job_id
            .as_ref()
            .map(JobId::to_string)
            .unwrap_or_else(|| "<id?>".to_string());
        let input = if self.input_filename.is_empty() {
            "<input?>"
        } else {
            self.input_filename.as_str()
        };
        write!(
            f,
            "{:>5} : {} --> {} [{}]",
            job_id,
            input,
            self.output_filename.as_deref().unwrap_or("<output?>"),
            self.todo()
        )
    }
}
