//! The remote conversion service.
//!
//! [`ConversionService`] is the seam between local bookkeeping and the network:
//! [`crate::record::FileRecord`] only ever talks to a `&dyn ConversionService`,
//! so tests drive the full lifecycle with an in-process fake while the binary
//! plugs in [`HttpService`].
//!
//! Every method returns `Result<ServiceOutcome<T>, ServiceError>`:
//!
//! | Result | Meaning | Caller's move |
//! |--------|---------|---------------|
//! | `Ok(Accepted(v))` | the service did it | record the value |
//! | `Ok(NotReady)` | job still running | try again on a later run |
//! | `Ok(Rejected{..})` | service said no | report, retry on a later run |
//! | `Err(ServiceError)` | never reached / unparseable | report as a failure |

pub mod http;
pub mod types;

pub use http::HttpService;
pub use types::{CitationStyle, JobId, JobStatus, Payload, ServiceOutcome};

use crate::config::Credentials;
use crate::error::ServiceError;
use async_trait::async_trait;

/// Request/response contract of the conversion service.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Upload a document and start a conversion job.
    async fn submit(
        &self,
        credentials: &Credentials,
        filename: &str,
        content: Vec<u8>,
        citation_style_hash: &str,
    ) -> Result<ServiceOutcome<JobId>, ServiceError>;

    /// Ask how far a job has progressed.
    async fn status(
        &self,
        credentials: &Credentials,
        job_id: &JobId,
    ) -> Result<ServiceOutcome<JobStatus>, ServiceError>;

    /// Download one conversion stage of a finished job.
    async fn retrieve(
        &self,
        credentials: &Credentials,
        job_id: &JobId,
        conversion_stage: u32,
        binary: bool,
    ) -> Result<ServiceOutcome<Payload>, ServiceError>;

    /// List the citation styles a submission may ask for.
    async fn citation_styles(&self) -> Result<ServiceOutcome<Vec<CitationStyle>>, ServiceError>;
}
