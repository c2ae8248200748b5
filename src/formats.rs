//! Output and input format tables.
//!
//! The service returns one derived artifact per *conversion stage* (JATS XML,
//! EPUB, a zip of everything, …). A [`FormatRegistry`] maps the short keys a
//! user picks on the command line (`xml`, `epub`, …) to the stage code the
//! retrieve endpoint expects, whether the payload is binary, and the file
//! extension the output is saved under.
//!
//! The registry is an ordinary value: build it once, put it in
//! [`crate::config::ServiceConfig`], and hand it down. Nothing reads it as
//! global state.

use crate::error::XmlpsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input extensions the service accepts for submission.
pub const SUPPORTED_INPUT_FORMATS: &[&str] = &["pdf", "doc", "docx", "odt"];

/// `(key, conversion_stage, binary, ext)` for every stage the service is known
/// to serve.
const BUILTIN_OUTPUT_FORMATS: &[(&str, u32, bool, &str)] = &[
    ("zip", 10, true, "zip"),        // all files
    ("xml", 14, false, "nlm3.xml"),  // JATS (NLM3) XML
    ("epub", 11, true, "epub"),
    ("ref", 3, false, "bib.xml"),    // references
    ("bib", 4, false, "bib"),        // BibTeX
    ("ner", 17, false, "ner.json"),  // named-entity relations
    ("xmp", 9, false, "xmp.pdf"),    // XMP metadata
    ("html", 6, true, "html.zip"),   // HTML plus assets
    ("docx", 15, true, "docx"),
];

/// How to ask the service for one output artifact and how to store it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormat {
    /// Stage code passed as `conversionStage` to the retrieve endpoint.
    pub conversion_stage: u32,
    /// Write the payload as raw bytes (`true`) or as decoded text.
    pub binary: bool,
    /// Extension appended to the input's name stem, without a leading dot.
    pub ext: String,
}

impl OutputFormat {
    pub fn new(conversion_stage: u32, binary: bool, ext: impl Into<String>) -> Self {
        Self {
            conversion_stage,
            binary,
            ext: ext.into(),
        }
    }
}

/// Lookup table from output-format key to [`OutputFormat`], plus the set of
/// accepted input extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRegistry {
    outputs: BTreeMap<String, OutputFormat>,
    inputs: Vec<String>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FormatRegistry {
    /// The formats the public service is known to support.
    pub fn builtin() -> Self {
        let outputs = BUILTIN_OUTPUT_FORMATS
            .iter()
            .map(|&(key, stage, binary, ext)| (key.to_string(), OutputFormat::new(stage, binary, ext)))
            .collect();
        let inputs = SUPPORTED_INPUT_FORMATS.iter().map(|s| s.to_string()).collect();
        Self { outputs, inputs }
    }

    /// Resolve an output-format key.
    pub fn lookup(&self, key: &str) -> Result<&OutputFormat, XmlpsError> {
        self.outputs
            .get(key)
            .ok_or_else(|| XmlpsError::UnknownFormat {
                key: key.to_string(),
                known: self.keys().collect::<Vec<_>>().join(", "),
            })
    }

    /// Register (or replace) an output format, e.g. a stage the built-in table
    /// does not know about yet.
    pub fn insert(&mut self, key: impl Into<String>, format: OutputFormat) -> Option<OutputFormat> {
        self.outputs.insert(key.into(), format)
    }

    /// Output-format keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    /// Whether a file with this extension may be submitted.
    ///
    /// Matching is exact: `Input.DOC` is not picked up.
    pub fn accepts_input(&self, ext: &str) -> bool {
        self.inputs.iter().any(|i| i == ext)
    }
}
