//! # xmlps-client
//!
//! Client for the PKP XML Parsing Service: submit manuscripts (`.doc`,
//! `.docx`, `.odt`, `.pdf`), poll the conversion jobs, and fetch the converted
//! output (JATS XML, EPUB, BibTeX, …) next to each input file.
//!
//! ## Workflow
//!
//! ```text
//! files.json ──load──▶ FileSet ◀──discover── data/
//!                         │
//!                         ├─ submit    upload each new file, keep the job id
//!                         ├─ retrieve  poll status, download completed jobs
//!                         └─ parse     submit, wait, retrieve
//!                         │
//! files.json ◀──save──────┘
//! ```
//!
//! Each input file is tracked by a [`FileRecord`] whose state is derived from
//! which fields are set. The set of records survives between runs in a
//! [`FileSetStore`], so `submit` today and `retrieve` tomorrow work on the
//! same jobs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xmlps_client::{run, HttpService, JsonFileStore, Mode, ServiceConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .credentials("me@example.org", "secret")
//!         .output_format("xml")
//!         .build()?;
//!     let service = HttpService::new(&config)?;
//!     let store = JsonFileStore::new("files.json");
//!
//!     let out = run(&store, Path::new("data"), Mode::Submit, &service, &config).await?;
//!     for record in out.files.records() {
//!         println!("{record}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `xmlps` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod formats;
pub mod progress;
pub mod record;
pub mod report;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run, run_batch, BatchSummary, Mode, Phase, RunOutput};
pub use config::{Credentials, ServiceConfig, ServiceConfigBuilder};
pub use error::{RecordError, ServiceError, XmlpsError};
pub use formats::{FormatRegistry, OutputFormat, SUPPORTED_INPUT_FORMATS};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{FileRecord, RecordState, StepOutcome};
pub use service::{
    CitationStyle, ConversionService, HttpService, JobId, JobStatus, Payload, ServiceOutcome,
};
pub use store::{discover, FileSet, FileSetStore, JsonFileStore, MemoryStore};
