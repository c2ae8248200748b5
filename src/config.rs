//! Configuration for talking to the conversion service.
//!
//! Everything a run needs to know (where the service lives, who is calling,
//! which citation style and output format to ask for, how long to wait) sits
//! in one [`ServiceConfig`] built through [`ServiceConfigBuilder`]. The config
//! is created once at startup and passed by reference to the service client,
//! the file records and the batch runner.

use crate::error::XmlpsError;
use crate::formats::FormatRegistry;
use crate::progress::ProgressCallback;
use std::fmt;
use std::time::Duration;

/// Public PKP XML Parsing Service endpoint.
pub const DEFAULT_SERVICE_URL: &str = "http://pkp-udev.lib.sfu.ca/api/";

/// American Psychological Association, 6th edition.
pub const DEFAULT_CITATION_STYLE_HASH: &str = "3f0f7fede090f24cc71b7281073996be";

/// JATS XML.
pub const DEFAULT_OUTPUT_FORMAT: &str = "xml";

/// Seconds `parse` sleeps between its submit and retrieve phases.
pub const DEFAULT_WAIT_SECS: u64 = 60;

/// Per-request HTTP timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Where the tracked file set is kept between runs.
pub const DEFAULT_STORE_PATH: &str = "files.json";

/// Account credentials sent with every job request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for one client run.
///
/// Built via [`ServiceConfig::builder()`]; `build()` rejects an output format
/// the registry does not know, so a typo fails at startup instead of after
/// every job has been submitted.
///
/// # Example
/// ```rust
/// use xmlps_client::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .credentials("me@example.org", "secret")
///     .output_format("epub")
///     .build()
///     .unwrap();
/// assert_eq!(config.output_format, "epub");
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Base URL the `job/*` endpoints are resolved against. Always ends in `/`.
    pub service_url: String,

    pub credentials: Credentials,

    /// Citation style applied to bibliographies of newly discovered files.
    pub citation_style_hash: String,

    /// Output-format key used by `retrieve`. Default: `xml`.
    pub output_format: String,

    /// Output-format table consulted on retrieve.
    pub formats: FormatRegistry,

    /// Per-request timeout in seconds. Default: 60.
    pub timeout_secs: u64,

    /// Pause between the submit and retrieve phases of `parse`. Default: 60.
    ///
    /// The pause is fixed; jobs that are still running when it ends are left
    /// for a later `retrieve`.
    pub wait_secs: u64,

    /// Optional per-record progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            credentials: Credentials::default(),
            citation_style_hash: DEFAULT_CITATION_STYLE_HASH.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            formats: FormatRegistry::builtin(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            wait_secs: DEFAULT_WAIT_SECS,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("service_url", &self.service_url)
            .field("credentials", &self.credentials)
            .field("citation_style_hash", &self.citation_style_hash)
            .field("output_format", &self.output_format)
            .field("timeout_secs", &self.timeout_secs)
            .field("wait_secs", &self.wait_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.config.service_url = url.into();
        self
    }

    pub fn credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Credentials::new(email, password);
        self
    }

    pub fn citation_style_hash(mut self, hash: impl Into<String>) -> Self {
        self.config.citation_style_hash = hash.into();
        self
    }

    pub fn output_format(mut self, key: impl Into<String>) -> Self {
        self.config.output_format = key.into();
        self
    }

    pub fn formats(mut self, registry: FormatRegistry) -> Self {
        self.config.formats = registry;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn wait_secs(mut self, secs: u64) -> Self {
        self.config.wait_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ServiceConfig, XmlpsError> {
        let url = self.config.service_url.trim().to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(XmlpsError::InvalidConfig(format!(
                "service URL must be http:// or https://, got '{url}'"
            )));
        }
        self.config.service_url = if url.ends_with('/') { url } else { format!("{url}/") };

        if self.config.timeout_secs == 0 {
            return Err(XmlpsError::InvalidConfig("timeout must be ≥ 1 second".into()));
        }

        self.config.formats.lookup(&self.config.output_format)?;
        Ok(self.config)
    }
}
