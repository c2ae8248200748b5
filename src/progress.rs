//! Progress-callback trait for per-record batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ServiceConfigBuilder::progress_callback`] to hear about
//! each record as the batch works through it. The CLI uses this to print the
//! running report and drive a spinner; a library caller can forward the
//! events anywhere without the batch runner knowing how.
//!
//! # Example
//!
//! ```rust
//! use xmlps_client::{BatchProgressCallback, FileRecord, Phase, ServiceConfig, StepOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_record_complete(&self, _phase: Phase, _record: &FileRecord, outcome: &StepOutcome) {
//!         if *outcome == StepOutcome::Done {
//!             self.done.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = ServiceConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::batch::{BatchSummary, Phase};
use crate::error::RecordError;
use crate::record::{FileRecord, StepOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Called by the batch runner as it processes each record.
///
/// Records are processed one at a time, so calls never overlap, but the
/// trait is `Send + Sync` so a config carrying it can cross threads. All
/// methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first phase, with the number of tracked records.
    fn on_batch_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called when the submit or retrieve pass begins.
    fn on_phase_start(&self, phase: Phase, total_records: usize) {
        let _ = (phase, total_records);
    }

    /// Called just before a record's step runs.
    fn on_record_start(&self, phase: Phase, record: &FileRecord) {
        let _ = (phase, record);
    }

    /// Called after a step that did not error; `record` reflects the new state.
    fn on_record_complete(&self, phase: Phase, record: &FileRecord, outcome: &StepOutcome) {
        let _ = (phase, record, outcome);
    }

    /// Called when a step failed for this record only.
    fn on_record_error(&self, phase: Phase, record: &FileRecord, error: &RecordError) {
        let _ = (phase, record, error);
    }

    /// Called before `parse` sleeps between its two phases.
    fn on_wait(&self, wait: Duration) {
        let _ = wait;
    }

    /// Called once after every phase has run.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ServiceConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
