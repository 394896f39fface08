use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use semgraph_core::error::{Result, SemgraphError};

/// System/user template pair plus named instruction fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
}

impl PromptTemplate {
    pub fn variant(&self, name: &str) -> Option<&str> {
        self.variants.get(name).map(String::as_str)
    }
}

/// Templates for the three prompt-assembly modes.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptLibrary {
    pub convert: PromptTemplate,
    pub execute: PromptTemplate,
    pub enhance: PromptTemplate,
}

#[derive(Debug, Default, Deserialize)]
struct TemplateOverride {
    system: Option<String>,
    user: Option<String>,
    #[serde(default)]
    variants: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct LibraryFile {
    convert: Option<TemplateOverride>,
    execute: Option<TemplateOverride>,
    enhance: Option<TemplateOverride>,
}

impl TemplateOverride {
    fn apply(self, template: &mut PromptTemplate) {
        if let Some(system) = self.system {
            template.system = system;
        }
        if let Some(user) = self.user {
            template.user = user;
        }
        template.variants.extend(self.variants);
    }
}

pub const ENHANCE_VARIANTS: [&str; 6] = [
    "improve",
    "optimize",
    "refactor",
    "enhance",
    "simplify",
    "elaborate",
];

impl PromptLibrary {
    pub fn builtin() -> Self {
        Self {
            convert: PromptTemplate {
                system: "You convert free text into a semantic graph of typed content nodes.\n\
                         Reply with a single JSON object of the form \
                         {\"nodes\": [{\"id\", \"type\", \"label\", \"content\", \"cluster\"}], \
                         \"edges\": [{\"source\", \"target\", \"relation\"}]} and nothing else.\n\
                         {{policy}}"
                    .to_string(),
                user: "Text to convert:\n{{text}}\n{{ontology}}".to_string(),
                variants: variants(&[
                    (
                        "force_framework",
                        "Every node type MUST be one of the listed ontology codes.",
                    ),
                    (
                        "novel_category",
                        "Prefer the listed ontology codes, but invent a new type code when none fits.",
                    ),
                    (
                        "exclude",
                        "Ignore any ontology; choose short descriptive type codes yourself.",
                    ),
                ]),
            },
            execute: PromptTemplate {
                system: "You execute semantic graphs. Each node is a unit of content; edges \
                         describe how outputs flow between nodes. Work through the graph and \
                         produce the final result as plain text."
                    .to_string(),
                user: "Graph ({{format}}):\n{{graph}}\n\nAvailable node types:\n{{catalog}}"
                    .to_string(),
                variants: BTreeMap::new(),
            },
            enhance: PromptTemplate {
                system: "You rewrite the content of a single graph node. Reply with the \
                         rewritten content only."
                    .to_string(),
                user: "{{instruction}}\n\n{{content}}".to_string(),
                variants: variants(&[
                    ("improve", "Improve the clarity and quality of the following content."),
                    ("optimize", "Optimize the following content for precision and brevity."),
                    ("refactor", "Restructure the following content without changing its meaning."),
                    ("enhance", "Enrich the following content with relevant detail."),
                    ("simplify", "Simplify the following content for a general audience."),
                    ("elaborate", "Expand on the following content with examples and explanation."),
                ]),
            },
        }
    }

    /// Built-in library with a TOML file's sections layered over it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SemgraphError::ConfigNotFound(path.display().to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: LibraryFile =
            toml::from_str(content).map_err(|e| SemgraphError::Template(e.to_string()))?;
        let mut library = Self::builtin();
        if let Some(o) = file.convert {
            o.apply(&mut library.convert);
        }
        if let Some(o) = file.execute {
            o.apply(&mut library.execute);
        }
        if let Some(o) = file.enhance {
            o.apply(&mut library.enhance);
        }
        Ok(library)
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn variants(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Substitute `{{name}}` placeholders. Unknown placeholders are an error.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };
        let name = after[..close].trim();
        let value = vars
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| SemgraphError::Template(format!("unknown placeholder {{{{{}}}}}", name)))?;
        out.push_str(value);
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// How convert mode treats the ontology catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OntologyPolicy {
    #[default]
    ForceFramework,
    NovelCategory,
    Exclude,
}

impl OntologyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForceFramework => "force_framework",
            Self::NovelCategory => "novel_category",
            Self::Exclude => "exclude",
        }
    }
}

impl fmt::Display for OntologyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OntologyPolicy {
    type Err = SemgraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "force_framework" => Ok(Self::ForceFramework),
            "novel_category" => Ok(Self::NovelCategory),
            "exclude" => Ok(Self::Exclude),
            other => Err(SemgraphError::Config(format!(
                "unknown ontology policy: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let out = render("Hi {{ name }}, {{x}}!", &[("name", "Ada"), ("x", "go")]).unwrap();
        assert_eq!(out, "Hi Ada, go!");
    }

    #[test]
    fn test_render_unknown_placeholder() {
        let err = render("{{missing}}", &[]).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_render_unclosed_kept_literally() {
        assert_eq!(render("a {{b", &[]).unwrap(), "a {{b");
    }

    #[test]
    fn test_builtin_has_core_variants() {
        let library = PromptLibrary::builtin();
        for name in ENHANCE_VARIANTS {
            assert!(library.enhance.variant(name).is_some(), "{}", name);
        }
        for policy in [
            OntologyPolicy::ForceFramework,
            OntologyPolicy::NovelCategory,
            OntologyPolicy::Exclude,
        ] {
            assert!(library.convert.variant(policy.as_str()).is_some());
        }
    }

    #[test]
    fn test_toml_override_merges() {
        let library = PromptLibrary::from_toml_str(
            r#"
[enhance]
system = "Custom system"

[enhance.variants]
pirate = "Rewrite like a pirate."
"#,
        )
        .unwrap();
        assert_eq!(library.enhance.system, "Custom system");
        assert_eq!(library.enhance.variant("pirate"), Some("Rewrite like a pirate."));
        assert!(library.enhance.variant("improve").is_some());
        assert_eq!(library.convert, PromptLibrary::builtin().convert);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "novel-category".parse::<OntologyPolicy>().unwrap(),
            OntologyPolicy::NovelCategory
        );
        assert!("whatever".parse::<OntologyPolicy>().is_err());
        assert_eq!(OntologyPolicy::Exclude.to_string(), "exclude");
    }
}
