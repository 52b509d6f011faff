//! Variable resolution for node parameters.
//!
//! Parameters reference prior node outputs with `$`-prefixed path
//! expressions (`$Node.field`, `$'Node Name'['field'][0]`). Two modes:
//! a string that is exactly one path is replaced by the resolved value
//! with its type preserved; any other string containing paths is treated
//! as a template and each occurrence is stringified in place.

pub mod path;
pub mod resolver;

pub use path::resolve_path;
pub use resolver::resolve_all;

use std::collections::HashMap;

/// Accumulated per-run results, keyed by node name.
pub type ExecutionState = HashMap<String, serde_json::Value>;
