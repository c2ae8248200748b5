//! Plain-text run report.
//!
//! ```text
//!
//! PKP XML Parsing Service
//! ========================================
//! SUBMITTING
//! ----------------------------------------
//! Input.doc : 42
//!
//! FINAL REPORT
//! ----------------------------------------
//!    42 : Input.doc --> <output?> [to retrieve]
//! ```

use crate::batch::Phase;
use crate::record::{FileRecord, StepOutcome};
use crate::store::FileSet;
use std::io::{self, Write};

/// Width of the rule lines.
pub const REPORT_WIDTH: usize = 40;

pub fn write_header(w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "{}", " ".repeat(REPORT_WIDTH))?;
    writeln!(w, "PKP XML Parsing Service")?;
    writeln!(w, "{}", "=".repeat(REPORT_WIDTH))
}

pub fn write_phase_title(w: &mut impl Write, phase: Phase) -> io::Result<()> {
    let title = match phase {
        Phase::Submit => "SUBMITTING",
        Phase::Retrieve => "RETRIEVING",
    };
    writeln!(w, "{title}")?;
    writeln!(w, "{}", "-".repeat(REPORT_WIDTH))
}

/// Spacer printed while `parse` waits between phases.
pub fn write_blank(w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "{}", " ".repeat(REPORT_WIDTH))
}

pub fn write_final_report(w: &mut impl Write, files: &FileSet) -> io::Result<()> {
    write_blank(w)?;
    writeln!(w, "FINAL REPORT")?;
    writeln!(w, "{}", "-".repeat(REPORT_WIDTH))?;
    for record in files.records() {
        writeln!(w, "{record}")?;
    }
    write_blank(w)
}

/// The running-report line for one finished step, or `None` when the step
/// had nothing to do.
pub fn step_line(phase: Phase, record: &FileRecord, outcome: &StepOutcome) -> Option<String> {
    match (phase, outcome) {
        (_, StepOutcome::Skipped) => None,
        (Phase::Submit, StepOutcome::Done) => Some(format!(
            "{} : {}",
            record.input_filename,
            record.job_id.as_ref().map(|id| id.to_string()).unwrap_or_else(|| "failed".into())
        )),
        (Phase::Retrieve, StepOutcome::Done) => Some(format!(
            "{} : {}",
            record.filename,
            record.output_filename.as_deref().unwrap_or("failed")
        )),
        (_, StepOutcome::NotReady) => Some(format!("{} : not ready", record.filename)),
        (_, StepOutcome::Rejected(messages)) => Some(format!(
            "{} : failed ({})",
            record.filename,
            messages.join("; ")
        )),
    }
}

/// The running-report line for a step that errored.
pub fn error_line(record: &FileRecord, error: &dyn std::fmt::Display) -> String {
    format!("{} : failed ({})", record.filename, error)
}
