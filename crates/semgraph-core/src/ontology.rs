//! Node-type catalog.
//!
//! The catalog is a static lookup table owned by the host application.
//! Unknown type codes never fail: they degrade to a generic "freeform"
//! descriptor so graphs built against an older catalog still load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemgraphError};

/// Type code of the empty placeholder node (no seeded fields).
pub const BLANK_TYPE: &str = "blank";

/// Type code used for unknown or unclassified content.
pub const FREEFORM_TYPE: &str = "freeform";

/// Metadata describing one node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeInfo {
    pub code: String,
    pub name: String,
    pub cluster: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

impl NodeTypeInfo {
    pub fn freeform() -> Self {
        Self {
            code: FREEFORM_TYPE.to_string(),
            name: "Freeform Content".to_string(),
            cluster: "general".to_string(),
            description: "Unstructured content without a specific ontology type".to_string(),
            icon: "file-text".to_string(),
        }
    }
}

pub trait OntologyCatalog: Send + Sync + 'static {
    fn lookup(&self, code: &str) -> Option<&NodeTypeInfo>;

    /// All entries in catalog order.
    fn entries(&self) -> &[NodeTypeInfo];

    /// Metadata for `code`, falling back to the freeform descriptor.
    fn describe(&self, code: &str) -> NodeTypeInfo {
        self.lookup(code)
            .cloned()
            .unwrap_or_else(NodeTypeInfo::freeform)
    }

    /// Entries grouped by cluster name.
    fn clusters(&self) -> BTreeMap<String, Vec<&NodeTypeInfo>> {
        let mut map: BTreeMap<String, Vec<&NodeTypeInfo>> = BTreeMap::new();
        for entry in self.entries() {
            map.entry(entry.cluster.clone()).or_default().push(entry);
        }
        map
    }
}

/// A catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<NodeTypeInfo>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<NodeTypeInfo>) -> Self {
        Self { entries }
    }

    /// Load a catalog from a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<NodeTypeInfo> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SemgraphError::ConfigNotFound(path.display().to_string()))?;
        Self::from_json(&content)
    }

    /// The catalog shipped with the binary.
    pub fn builtin() -> Self {
        let raw: &[(&str, &str, &str, &str, &str)] = &[
            ("blank", "Blank", "general", "Empty placeholder node", "square"),
            ("freeform", "Freeform Content", "general", "Unstructured content without a specific ontology type", "file-text"),
            ("concept", "Concept", "knowledge", "An abstract idea or notion", "lightbulb"),
            ("definition", "Definition", "knowledge", "A precise statement of meaning", "book"),
            ("fact", "Fact", "knowledge", "A verifiable statement", "check-circle"),
            ("question", "Question", "inquiry", "An open question to investigate", "help-circle"),
            ("hypothesis", "Hypothesis", "inquiry", "A testable proposition", "flask"),
            ("evidence", "Evidence", "inquiry", "Support for or against a claim", "search"),
            ("goal", "Goal", "planning", "A desired outcome", "target"),
            ("task", "Task", "planning", "A unit of work to perform", "check-square"),
            ("decision", "Decision", "planning", "A choice between alternatives", "git-branch"),
            ("prompt", "Prompt", "generation", "An instruction for a language model", "message-square"),
            ("summary", "Summary", "generation", "A condensed restatement", "align-left"),
            ("code", "Code", "generation", "Source code or a code fragment", "code"),
        ];
        Self::new(
            raw.iter()
                .map(|(code, name, cluster, description, icon)| NodeTypeInfo {
                    code: code.to_string(),
                    name: name.to_string(),
                    cluster: cluster.to_string(),
                    description: description.to_string(),
                    icon: icon.to_string(),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OntologyCatalog for StaticCatalog {
    fn lookup(&self, code: &str) -> Option<&NodeTypeInfo> {
        self.entries.iter().find(|e| e.code == code)
    }

    fn entries(&self) -> &[NodeTypeInfo] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_degrades_to_freeform() {
        let catalog = StaticCatalog::builtin();
        let info = catalog.describe("does-not-exist");
        assert_eq!(info.code, FREEFORM_TYPE);
    }

    #[test]
    fn test_lookup_known() {
        let catalog = StaticCatalog::builtin();
        let info = catalog.lookup("concept").expect("concept present");
        assert_eq!(info.cluster, "knowledge");
    }

    #[test]
    fn test_clusters_grouping() {
        let catalog = StaticCatalog::builtin();
        let clusters = catalog.clusters();
        assert_eq!(clusters["planning"].len(), 3);
    }

    #[test]
    fn test_from_json() {
        let catalog = StaticCatalog::from_json(
            r#"[{"code":"x","name":"X","cluster":"c"}]"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("x").unwrap().description, "");
    }
}
