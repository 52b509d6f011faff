//! # sentflow-core
//!
//! The Sentient Flow workflow execution engine: variable resolution
//! against prior node outputs, task primitives, the node-handler
//! registry, and the input-buffered graph scheduler.

pub mod engine;
pub mod error;
pub mod expression;
pub mod handlers;
pub mod tasks;

pub use engine::{PortValue, WorkflowEngine};
pub use error::{EngineError, ResolveError};
pub use expression::{resolve_all, resolve_path, ExecutionState};
pub use handlers::{HandlerContext, HandlerOutput, HandlerRegistry, NodeHandler};
