//! reqwest implementation of [`ConversionService`].
//!
//! Endpoints are resolved relative to [`ServiceConfig::service_url`]:
//!
//! ```text
//! POST job/submit             multipart: email, password, fileName,
//!                                        citationStyleHash, fileContent
//! GET  job/status             ?email&password&id
//! GET  job/retrieve           ?email&password&id&conversionStage
//! GET  job/citationStyleList
//! ```

use super::types::{
    CitationStyle, CitationStylesEnvelope, Envelope, JobId, JobStatus, Payload, ServiceOutcome,
    StatusEnvelope, SubmitEnvelope,
};
use super::ConversionService;
use crate::config::{Credentials, ServiceConfig};
use crate::error::{ServiceError, XmlpsError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client for the conversion service.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl HttpService {
    /// Build a client for the configured service URL and timeout.
    pub fn new(config: &ServiceConfig) -> Result<Self, XmlpsError> {
        let base_url = Url::parse(&config.service_url).map_err(|e| {
            XmlpsError::InvalidConfig(format!("service URL '{}': {e}", config.service_url))
        })?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| XmlpsError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::InvalidResponse {
                url: format!("{}{path}", self.base_url),
                detail: format!("cannot build endpoint URL: {e}"),
            })
    }

    fn transport_error(&self, url: &Url, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout {
                url: redact(url),
                secs: self.timeout_secs,
            }
        } else {
            ServiceError::Transport {
                url: redact(url),
                reason: e.to_string(),
            }
        }
    }

    /// Read the whole body and decode it as a JSON envelope.
    async fn read_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        response: Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        serde_json::from_slice(&body).map_err(|e| ServiceError::InvalidResponse {
            url: redact(url),
            detail: format!("HTTP {status}: {e}; body starts with {:?}", snippet(&body)),
        })
    }
}

#[async_trait]
impl ConversionService for HttpService {
    async fn submit(
        &self,
        credentials: &Credentials,
        filename: &str,
        content: Vec<u8>,
        citation_style_hash: &str,
    ) -> Result<ServiceOutcome<JobId>, ServiceError> {
        let url = self.endpoint("job/submit")?;
        debug!("POST {} ({} bytes, {})", url, content.len(), filename);

        let form = Form::new()
            .text("email", credentials.email.clone())
            .text("password", credentials.password.clone())
            .text("fileName", filename.to_string())
            .text("citationStyleHash", citation_style_hash.to_string())
            .part("fileContent", Part::bytes(content).file_name(filename.to_string()));

        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let envelope: SubmitEnvelope = self.read_json(&url, response).await?;
        if !envelope.envelope.is_success() {
            return Ok(ServiceOutcome::Rejected {
                messages: envelope.envelope.messages(),
            });
        }

        JobId::from_json(&envelope.id)
            .map(ServiceOutcome::Accepted)
            .ok_or_else(|| ServiceError::InvalidResponse {
                url: url.to_string(),
                detail: format!("submit succeeded without a job id (got {})", envelope.id),
            })
    }

    async fn status(
        &self,
        credentials: &Credentials,
        job_id: &JobId,
    ) -> Result<ServiceOutcome<JobStatus>, ServiceError> {
        let url = self.endpoint("job/status")?;
        debug!("GET {} (job {})", url, job_id);

        let response = self
            .client
            .get(url.clone())
            .query(&[
                ("email", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
                ("id", job_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let envelope: StatusEnvelope = self.read_json(&url, response).await?;
        if !envelope.envelope.is_success() {
            return Ok(ServiceOutcome::Rejected {
                messages: envelope.envelope.messages(),
            });
        }

        let status = envelope.job_status().ok_or_else(|| ServiceError::InvalidResponse {
            url: url.to_string(),
            detail: format!("jobStatus is not a status code: {}", envelope.job_status),
        })?;
        debug!(
            "job {} status {} ({})",
            job_id,
            status,
            envelope.job_status_description.as_deref().unwrap_or("no description")
        );
        Ok(ServiceOutcome::Accepted(status))
    }

    async fn retrieve(
        &self,
        credentials: &Credentials,
        job_id: &JobId,
        conversion_stage: u32,
        binary: bool,
    ) -> Result<ServiceOutcome<Payload>, ServiceError> {
        let url = self.endpoint("job/retrieve")?;
        debug!("GET {} (job {}, stage {})", url, job_id, conversion_stage);

        let stage = conversion_stage.to_string();
        let response = self
            .client
            .get(url.clone())
            .query(&[
                ("email", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
                ("id", job_id.as_str()),
                ("conversionStage", stage.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(ServiceOutcome::NotReady);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        // Text formats are decoded with the charset the response declares.
        let payload = if binary {
            let body = response
                .bytes()
                .await
                .map_err(|e| self.transport_error(&url, e))?;
            Payload::Binary(body.to_vec())
        } else {
            let body = response
                .text()
                .await
                .map_err(|e| self.transport_error(&url, e))?;
            Payload::Text(body)
        };

        // Errors come back as a JSON envelope; a JSON artifact (e.g. `ner`)
        // has no `status` field and falls through as content.
        if is_json {
            if let Ok(envelope) = serde_json::from_slice::<Envelope>(payload.as_bytes()) {
                if !envelope.is_success() {
                    return Ok(ServiceOutcome::Rejected {
                        messages: envelope.messages(),
                    });
                }
            }
        }

        if !status.is_success() {
            return Ok(ServiceOutcome::Rejected {
                messages: vec![format!("HTTP {status}")],
            });
        }

        if payload.is_empty() {
            return Ok(ServiceOutcome::NotReady);
        }

        Ok(ServiceOutcome::Accepted(payload))
    }

    async fn citation_styles(&self) -> Result<ServiceOutcome<Vec<CitationStyle>>, ServiceError> {
        let url = self.endpoint("job/citationStyleList")?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        let envelope: CitationStylesEnvelope = self.read_json(&url, response).await?;
        if !envelope.envelope.is_success() {
            return Ok(ServiceOutcome::Rejected {
                messages: envelope.envelope.messages(),
            });
        }

        envelope
            .styles()
            .map(ServiceOutcome::Accepted)
            .ok_or_else(|| ServiceError::InvalidResponse {
                url: url.to_string(),
                detail: "citationStyles is neither a map nor a list of {hash, title}".into(),
            })
    }
}

/// Drop the query string so credentials never end up in error messages.
fn redact(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(&body[..body.len().min(80)]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(url: &str) -> HttpService {
        let config = ServiceConfig::builder().service_url(url).build().unwrap();
        HttpService::new(&config).unwrap()
    }

    #[test]
    fn endpoints_resolve_under_base_path() {
        let svc = service("http://pkp-udev.lib.sfu.ca/api");
        assert_eq!(
            svc.endpoint("job/submit").unwrap().as_str(),
            "http://pkp-udev.lib.sfu.ca/api/job/submit"
        );
        assert_eq!(
            svc.endpoint("job/citationStyleList").unwrap().as_str(),
            "http://pkp-udev.lib.sfu.ca/api/job/citationStyleList"
        );
    }

    #[test]
    fn redact_strips_query() {
        let url = Url::parse("http://svc/api/job/status?email=a&password=b&id=1").unwrap();
        assert_eq!(redact(&url), "http://svc/api/job/status");
    }

    #[test]
    fn snippet_is_bounded() {
        let body = vec![b'x'; 500];
        assert_eq!(snippet(&body).len(), 80);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let svc = service("http://127.0.0.1:9/api/");
        let err = svc
            .status(&Credentials::new("a", "b"), &JobId::from(1))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Transport { .. } | ServiceError::Timeout { .. }),
            "got {err:?}"
        );
    }
}
