//! Node types and definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

fn default_type_version() -> f64 {
    1.0
}

fn empty_parameters() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A workflow node instance.
///
/// `name` is the key used everywhere in the graph and must be unique
/// within a workflow. `parameters` is unstructured because every node
/// type is different; unresolved `$`-paths live inside it until the
/// scheduler resolves them against the execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier for this node instance.
    pub id: String,
    /// Display name, unique within the workflow.
    pub name: String,
    /// Node type identifier (native or "n8n-nodes-base.*").
    #[serde(rename = "type")]
    pub node_type: String,
    /// Version of the node type.
    #[serde(rename = "typeVersion", default = "default_type_version")]
    pub type_version: f64,
    /// Position on the canvas [x, y].
    #[serde(default)]
    pub position: [f64; 2],
    /// Node configuration parameters.
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
    /// Credential references, defined per node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
    /// Whether the node is disabled (bypassed at execution time).
    #[serde(default)]
    pub disabled: bool,
    /// Notes/comments for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Node {
    /// Create a new node with default settings.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            node_type: node_type.into(),
            type_version: 1.0,
            position: [0.0, 0.0],
            parameters: empty_parameters(),
            credentials: None,
            disabled: false,
            notes: None,
        }
    }

    /// Set a parameter value.
    pub fn set_parameter(&mut self, key: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut self.parameters {
            map.insert(key.into(), value);
        }
    }

    /// Check if this node is the manual-trigger start node.
    ///
    /// Accepts both the native spelling and the n8n-compatible one.
    pub fn is_trigger(&self) -> bool {
        self.node_type.contains("manual_trigger") || self.node_type.ends_with("manualTrigger")
    }

    /// Check if this node joins multiple inputs.
    pub fn is_merge(&self) -> bool {
        self.node_type.contains("merge")
    }
}
