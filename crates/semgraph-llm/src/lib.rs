pub mod gateway;
pub mod history;
pub mod modes;
pub mod prompts;
pub mod providers;
pub mod selection;
pub mod streaming;
pub mod usage;

use std::path::Path;

use semgraph_core::config::AppConfig;
use semgraph_core::error::Result;

pub use gateway::ProviderGateway;
pub use history::{CallHistory, CallRecord};
pub use modes::{
    ConvertOptions, ConvertedGraph, Enhancement, ExecutedGraph, ModeOutcome, OntologySelection,
    PromptModes,
};
pub use prompts::{OntologyPolicy, PromptLibrary, PromptTemplate};
pub use providers::{ProviderAdapter, ProviderInfo, ProviderRegistry, Transport};
pub use selection::{resolve_selection, Selection};

/// Prompt library named by `config.prompts`, or the built-in one.
pub fn prompt_library(config: &AppConfig) -> Result<PromptLibrary> {
    match &config.prompts {
        Some(path) => PromptLibrary::load(Path::new(path)),
        None => Ok(PromptLibrary::builtin()),
    }
}
