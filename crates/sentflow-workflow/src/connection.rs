//! Connection types for the workflow graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard connection type for data flow.
pub const CONNECTION_MAIN: &str = "main";

fn default_connection_type() -> String {
    CONNECTION_MAIN.to_string()
}

/// Single outgoing edge endpoint.
///
/// The `index` names the input port on the target; the scheduler buffers
/// inputs in arrival order, so the index is informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Destination node name.
    pub node: String,
    /// Connection type at the destination.
    #[serde(rename = "type", default = "default_connection_type")]
    pub connection_type: String,
    /// Input port index at the destination.
    #[serde(default)]
    pub index: usize,
}

impl ConnectionTarget {
    pub fn main(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            connection_type: CONNECTION_MAIN.to_string(),
            index: 0,
        }
    }
}

/// Output ports of a node for one connection type.
///
/// The outer position is the output port index: port 0 is the first
/// list, port 1 the second. A branch node fires exactly one port per
/// execution; fan-out happens within a port.
pub type OutputPorts = Vec<Vec<ConnectionTarget>>;

/// All connections from a node, keyed by output type (usually "main").
pub type NodeConnections = HashMap<String, OutputPorts>;

/// All workflow connections, keyed by source node name.
pub type WorkflowConnections = HashMap<String, NodeConnections>;
