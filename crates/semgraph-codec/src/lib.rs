//! One-way workflow exporters.
//!
//! Each exporter renders a [`Workflow`] to text and names the file after
//! the workflow title. Only the JSON format has a matching importer.

pub mod json;
pub mod markdown;
pub mod xml;
pub mod yaml;

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use semgraph_core::error::{Result, SemgraphError};
use semgraph_core::types::Workflow;

pub use json::import_json;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Yaml,
    Xml,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [Self::Json, Self::Markdown, Self::Yaml, Self::Xml];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Yaml => "yaml",
            Self::Xml => "xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Yaml => "yaml",
            Self::Xml => "xml",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Markdown => "text/markdown",
            Self::Yaml => "application/x-yaml",
            Self::Xml => "application/xml",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Json => "Structured workflow graph",
            Self::Markdown => "Human-readable workflow document",
            Self::Yaml => "Indented key/value workflow description",
            Self::Xml => "Tagged workflow tree",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ExportFormat {
    type Err = SemgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "yaml" | "yml" => Ok(Self::Yaml),
            "xml" => Ok(Self::Xml),
            other => Err(SemgraphError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Rendered export ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub content: String,
    pub filename: String,
    pub mime_type: String,
}

/// Export `workflow` in the format named by `format_key`.
///
/// Unknown keys fail immediately with [`SemgraphError::UnsupportedFormat`].
pub fn export_workflow(workflow: &Workflow, format_key: &str) -> Result<ExportedFile> {
    let format = format_key.parse::<ExportFormat>()?;
    export_as(workflow, format)
}

pub fn export_as(workflow: &Workflow, format: ExportFormat) -> Result<ExportedFile> {
    let exported_at = Utc::now();
    let content = render(workflow, format, exported_at)?;
    debug!(format = %format, bytes = content.len(), "Exported workflow");

    Ok(ExportedFile {
        content,
        filename: filename_for(workflow, format),
        mime_type: format.mime_type().to_string(),
    })
}

/// Render the body only; used when embedding a workflow in a prompt.
pub fn render(workflow: &Workflow, format: ExportFormat, exported_at: DateTime<Utc>) -> Result<String> {
    match format {
        ExportFormat::Json => json::render(workflow, exported_at),
        ExportFormat::Markdown => Ok(markdown::render(workflow, exported_at)),
        ExportFormat::Yaml => Ok(yaml::render(workflow, exported_at)),
        ExportFormat::Xml => Ok(xml::render(workflow, exported_at)),
    }
}

pub fn filename_for(workflow: &Workflow, format: ExportFormat) -> String {
    format!("{}-workflow.{}", slugify(workflow.title()), format.extension())
}

/// Lowercase, runs of non-alphanumerics collapsed to `-`, trimmed.
pub fn slugify(title: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));

    let lowered = title.to_lowercase();
    let slug = re.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
