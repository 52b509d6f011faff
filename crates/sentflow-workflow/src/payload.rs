//! Workflow payload container and graph utilities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::connection::{ConnectionTarget, WorkflowConnections, CONNECTION_MAIN};
use crate::error::WorkflowError;
use crate::node::Node;

fn default_workflow_name() -> String {
    "My Workflow".to_string()
}

/// The workflow container accepted by the execute endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPayload {
    #[serde(default = "default_workflow_name")]
    pub name: String,

    pub nodes: Vec<Node>,

    /// The adjacency list:
    /// `{ "NodeName": { "main": [ [Target1, Target2], [Target3] ] } }`.
    #[serde(default)]
    pub connections: WorkflowConnections,

    // Metadata carried by upstream UIs, ignored by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, rename = "pinData", skip_serializing_if = "Option::is_none")]
    pub pin_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

impl WorkflowPayload {
    /// Create an empty payload for programmatic construction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: WorkflowConnections::new(),
            meta: None,
            pin_data: None,
            settings: None,
        }
    }

    /// Add a node to the workflow.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Wire `source` output port `port` to `target`.
    pub fn connect(&mut self, source: &str, target: &str, port: usize) {
        let ports = self
            .connections
            .entry(source.to_string())
            .or_default()
            .entry(CONNECTION_MAIN.to_string())
            .or_default();
        while ports.len() <= port {
            ports.push(Vec::new());
        }
        ports[port].push(ConnectionTarget::main(target));
    }

    /// Get a node by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// The unique manual-trigger start node, if present.
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_trigger())
    }

    /// Static in-degree of every node: the number of real upstream edges
    /// targeting it across all source nodes and all output ports.
    pub fn in_degrees(&self) -> HashMap<String, usize> {
        let mut degrees: HashMap<String, usize> =
            self.nodes.iter().map(|n| (n.name.clone(), 0)).collect();

        for node_connections in self.connections.values() {
            for ports in node_connections.values() {
                for targets in ports {
                    for target in targets {
                        if let Some(count) = degrees.get_mut(&target.node) {
                            *count += 1;
                        }
                    }
                }
            }
        }

        degrees
    }

    fn main_ports(&self, source: &str) -> Option<&Vec<Vec<ConnectionTarget>>> {
        self.connections.get(source)?.get(CONNECTION_MAIN)
    }

    /// Children wired to the selected output port.
    pub fn children_on_port(&self, source: &str, port: usize) -> Vec<String> {
        self.main_ports(source)
            .and_then(|ports| ports.get(port))
            .map(|targets| targets.iter().map(|t| t.node.clone()).collect())
            .unwrap_or_default()
    }

    /// Children on every output port other than the selected one
    /// (the unselected branches of an IF/Switch node).
    pub fn children_except_port(&self, source: &str, port: usize) -> Vec<String> {
        self.main_ports(source)
            .map(|ports| {
                ports
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != port)
                    .flat_map(|(_, targets)| targets.iter().map(|t| t.node.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Children across all output ports (used when propagating skips).
    pub fn all_children(&self, source: &str) -> Vec<String> {
        self.main_ports(source)
            .map(|ports| {
                ports
                    .iter()
                    .flat_map(|targets| targets.iter().map(|t| t.node.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Validate the workflow structure before dispatch.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.nodes.is_empty() {
            return Err(WorkflowError::InvalidWorkflow(
                "Workflow has no nodes".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(WorkflowError::InvalidWorkflow(format!(
                    "Duplicate node name: {}",
                    node.name
                )));
            }
        }

        for (source, node_connections) in &self.connections {
            if !names.contains(source.as_str()) {
                return Err(WorkflowError::NodeNotFound(source.clone()));
            }
            for ports in node_connections.values() {
                for targets in ports {
                    for target in targets {
                        if !names.contains(target.node.as_str()) {
                            return Err(WorkflowError::NodeNotFound(target.node.clone()));
                        }
                    }
                }
            }
        }

        let triggers = self.nodes.iter().filter(|n| n.is_trigger()).count();
        match triggers {
            0 => Err(WorkflowError::InvalidWorkflow(
                "No 'manual_trigger' node found".to_string(),
            )),
            1 => Ok(()),
            n => Err(WorkflowError::InvalidWorkflow(format!(
                "Expected exactly one 'manual_trigger' node, found {n}"
            ))),
        }
    }
}
