//! Graph model operations: node/edge factories, advisory validation,
//! and the dependency resolver that orders nodes for execution.

pub mod factory;
pub mod resolver;
pub mod validate;

pub use factory::{create_edge, create_node, create_workflow, generate_id};
pub use resolver::{declaration_order, resolve, topological_order};
pub use semgraph_core::config::ExecutionOrder;
pub use validate::{validate_edge, validate_node, validate_workflow, ValidationReport};
