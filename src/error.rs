//! Error types for the xmlps-client library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`XmlpsError`]: **Fatal**: the run cannot proceed at all (unknown
//!   output format, unreadable or corrupt file store, HTTP client cannot be
//!   built). Returned as `Err(XmlpsError)` from configuration and store APIs.
//!
//! * [`ServiceError`]: the remote service could not be *reached* or answered
//!   with something unparseable. Kept apart from a service-level refusal,
//!   which is a normal [`crate::service::ServiceOutcome::Rejected`] value.
//!
//! * [`RecordError`]: **Non-fatal**: one file's submit or retrieve step
//!   failed. The batch logs it, counts it, and moves on to the next record.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the xmlps-client library.
#[derive(Debug, Error)]
pub enum XmlpsError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The requested output format is not in the format registry.
    #[error("Unknown output format '{key}'\nKnown formats: {known}")]
    UnknownFormat { key: String, known: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// reqwest refused to build a client (TLS backend, bad proxy env, …).
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Store errors ──────────────────────────────────────────────────────
    /// The file store exists but could not be read.
    #[error("Failed to read file store '{path}': {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file store could not be written.
    #[error("Failed to write file store '{path}': {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file store is not a valid JSON document of tracked files.
    #[error(
        "File store '{path}' is corrupt: {detail}\n\
Delete it to start over (tracked jobs will be submitted again)."
    )]
    CorruptStore { path: PathBuf, detail: String },
}

/// The service could not be reached, or its answer could not be understood.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Connection refused, DNS failure, TLS error, broken body stream.
    #[error("Request to '{url}' failed: {reason}")]
    Transport { url: String, reason: String },

    /// No response within the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The response body is not the JSON envelope the endpoint promises.
    #[error("Unexpected response from '{url}': {detail}")]
    InvalidResponse { url: String, detail: String },
}

/// A non-fatal error for a single tracked file.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The input document could not be read for submission.
    #[error("Cannot read input file '{path}': {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The converted output could not be written next to the input.
    #[error("Failed to write output file '{path}': {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output file would replace the input document.
    #[error("Output '{path}' would overwrite the input file")]
    OutputOverwritesInput { path: PathBuf },

    /// Transport or protocol failure talking to the service.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The configured output format vanished from the registry.
    #[error(transparent)]
    Format(#[from] XmlpsError),
}
