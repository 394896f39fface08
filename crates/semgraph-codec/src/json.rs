use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use semgraph_core::error::Result;
use semgraph_core::types::{Workflow, WORKFLOW_VERSION};

use crate::{timestamp, ExportFormat};

/// The workflow object with an `exportMetadata` stamp, pretty-printed.
pub fn render(workflow: &Workflow, exported_at: DateTime<Utc>) -> Result<String> {
    let mut value = serde_json::to_value(workflow)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            "exportMetadata".to_string(),
            json!({
                "format": ExportFormat::Json.key(),
                "version": WORKFLOW_VERSION,
                "exportedAt": timestamp(exported_at),
                "description": ExportFormat::Json.description(),
            }),
        );
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Parse a structured export (or a plain saved workflow) back into a workflow.
/// The `exportMetadata` stamp is ignored.
pub fn import_json(content: &str) -> Result<Workflow> {
    Ok(serde_json::from_str(content)?)
}
