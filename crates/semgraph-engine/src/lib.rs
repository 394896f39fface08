pub mod engine;
pub mod progress;
pub mod state;

pub use engine::{compose_input, ExecutionEngine, ExecutionSummary, NO_OUTPUT};
pub use progress::ProgressEvent;
pub use state::{NodeRuntimeState, NodeStatus};
