//! Values exchanged with the conversion service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque job identifier handed out by a successful submit.
///
/// The service sends numeric ids today; they are kept as text so a switch to
/// string ids does not invalidate stored file sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accept `42` or `"42"`; anything else is not an id.
    pub(crate) fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Job status code, stored verbatim as the service reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStatus(pub i64);

impl JobStatus {
    /// Queued or still converting. Also assumed when the service omits it.
    pub const PENDING: JobStatus = JobStatus(0);
    /// Conversion finished; every stage can be retrieved.
    pub const COMPLETED: JobStatus = JobStatus(2);

    pub fn is_completed(self) -> bool {
        self == Self::COMPLETED
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A converted artifact as returned by the retrieve endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Binary(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Binary(b) => b.len(),
            Payload::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Binary(b) => b,
            Payload::Text(t) => t.as_bytes(),
        }
    }
}

/// One entry of the service's citation-style list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationStyle {
    pub hash: String,
    pub title: String,
}

/// What the service said about a request it did receive.
///
/// Transport-level failures are not represented here; they surface as
/// [`crate::error::ServiceError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome<T> {
    /// The request succeeded and produced a value.
    Accepted(T),
    /// The job exists but the requested artifact is not available yet.
    NotReady,
    /// The service answered with `status != "success"`.
    Rejected { messages: Vec<String> },
}

impl<T> ServiceOutcome<T> {
    pub fn accepted(self) -> Option<T> {
        match self {
            ServiceOutcome::Accepted(v) => Some(v),
            _ => None,
        }
    }
}

// ── Wire envelopes ───────────────────────────────────────────────────────

/// `{status, flashMessages, ...}` wrapper shared by every JSON endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope {
    pub status: String,
    #[serde(default)]
    pub flash_messages: Value,
    #[serde(default)]
    pub error: Value,
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Every human-readable message the envelope carries.
    pub fn messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        collect_messages(&self.flash_messages, &mut out);
        collect_messages(&self.error, &mut out);
        if out.is_empty() {
            out.push(format!("service status '{}'", self.status));
        }
        out
    }
}

/// `job/submit` response.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitEnvelope {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub id: Value,
}

/// `job/status` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusEnvelope {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub job_status: Value,
    #[serde(default)]
    pub job_status_description: Option<String>,
}

impl StatusEnvelope {
    /// `jobStatus` as a code; absent or null means pending.
    pub fn job_status(&self) -> Option<JobStatus> {
        match &self.job_status {
            Value::Null => Some(JobStatus::PENDING),
            Value::Number(n) => n.as_i64().map(JobStatus),
            Value::String(s) => s.trim().parse().ok().map(JobStatus),
            _ => None,
        }
    }
}

/// `job/citationStyleList` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CitationStylesEnvelope {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub citation_styles: Value,
}

impl CitationStylesEnvelope {
    /// Accepts either `{hash: title, ...}` or `[{hash, title}, ...]`.
    pub fn styles(&self) -> Option<Vec<CitationStyle>> {
        match &self.citation_styles {
            Value::Object(map) => Some(
                map.iter()
                    .map(|(hash, title)| CitationStyle {
                        hash: hash.clone(),
                        title: title.as_str().map(str::to_string).unwrap_or_else(|| title.to_string()),
                    })
                    .collect(),
            ),
            Value::Array(items) => items
                .iter()
                .map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            Value::Null => Some(Vec::new()),
            _ => None,
        }
    }
}

fn collect_messages(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
        Value::Array(items) => items.iter().for_each(|v| collect_messages(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_messages(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_id_from_number_or_string() {
        assert_eq!(JobId::from_json(&json!(42)), Some(JobId::new("42")));
        assert_eq!(JobId::from_json(&json!("abc")), Some(JobId::new("abc")));
        assert_eq!(JobId::from_json(&json!("")), None);
        assert_eq!(JobId::from_json(&Value::Null), None);
    }

    #[test]
    fn job_id_display_honours_width() {
        assert_eq!(format!("{:>5}", JobId::from(42)), "   42");
    }

    #[test]
    fn status_defaults_to_pending() {
        let env: StatusEnvelope = serde_json::from_value(json!({"status": "success"})).unwrap();
        assert_eq!(env.job_status(), Some(JobStatus::PENDING));

        let env: StatusEnvelope =
            serde_json::from_value(json!({"status": "success", "jobStatus": "2"})).unwrap();
        assert_eq!(env.job_status(), Some(JobStatus::COMPLETED));
    }

    #[test]
    fn envelope_messages_are_flattened() {
        let env: Envelope = serde_json::from_value(json!({
            "status": "error",
            "flashMessages": {"error": ["Bad password", ""], "notice": "Try again"},
            "error": "Login failed"
        }))
        .unwrap();
        let msgs = env.messages();
        assert!(msgs.contains(&"Bad password".to_string()));
        assert!(msgs.contains(&"Try again".to_string()));
        assert!(msgs.contains(&"Login failed".to_string()));
        assert_eq!(msgs.len(), 3);
    }

    #[test]
    fn envelope_without_messages_reports_status() {
        let env: Envelope = serde_json::from_value(json!({"status": "error"})).unwrap();
        assert_eq!(env.messages(), vec!["service status 'error'".to_string()]);
    }

    #[test]
    fn citation_styles_from_map_and_list() {
        let env: CitationStylesEnvelope = serde_json::from_value(json!({
            "status": "success",
            "citationStyles": {"3f0f": "APA 6th"}
        }))
        .unwrap();
        assert_eq!(
            env.styles().unwrap(),
            vec![CitationStyle { hash: "3f0f".into(), title: "APA 6th".into() }]
        );

        let env: CitationStylesEnvelope = serde_json::from_value(json!({
            "status": "success",
            "citationStyles": [{"hash": "a1", "title": "Chicago"}]
        }))
        .unwrap();
        assert_eq!(env.styles().unwrap()[0].title, "Chicago");
    }
}
