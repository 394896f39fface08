pub mod config;
pub mod error;
pub mod event;
pub mod ontology;
pub mod store;
pub mod traits;
pub mod types;

pub use config::{AppConfig, ExecutionOrder};
pub use error::{Result, SemgraphError};
pub use event::{BusEvent, EventBus};
pub use ontology::{NodeTypeInfo, OntologyCatalog, StaticCatalog};
pub use store::{KeyValueStore, MemoryStore};
pub use traits::ModelClient;
pub use types::*;
