//! The graph scheduler.
//!
//! Walks the workflow DAG with an input-buffered ready queue: a node is
//! enqueued exactly when its buffer holds one entry per incoming edge.
//! Branch nodes fire one output port; every other port receives a skip
//! signal so downstream joins never deadlock. Errors are caught per
//! node and propagate as skips.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use sentflow_workflow::{Node, WorkflowError, WorkflowPayload};

use crate::error::EngineError;
use crate::expression::{resolve_all, ExecutionState};
use crate::handlers::{HandlerContext, HandlerOutput, HandlerRegistry};

/// One slot of a node's input buffer: a real upstream payload or the
/// skip sentinel delivered along an unselected branch.
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    Value(Value),
    Skip,
}

impl PortValue {
    fn is_skip(&self) -> bool {
        matches!(self, PortValue::Skip)
    }
}

/// Message recorded for nodes that never became ready.
const STUCK_NODE_ERROR: &str = "Node never executed (possible cycle or missing input)";

/// Single-run workflow engine.
///
/// Owns all per-run state exclusively; concurrent runs share only the
/// outbound HTTP client. Dropping the returned future abandons the run
/// at the next await point and discards partial state.
pub struct WorkflowEngine {
    payload: WorkflowPayload,
    registry: Arc<HandlerRegistry>,
    http_client: reqwest::Client,
    start_node: String,
    in_degree: HashMap<String, usize>,
    input_buffer: HashMap<String, Vec<PortValue>>,
    queue: VecDeque<(String, Vec<PortValue>)>,
    state: ExecutionState,
}

impl WorkflowEngine {
    /// Validate the payload and prepare the run.
    pub fn new(
        payload: WorkflowPayload,
        registry: Arc<HandlerRegistry>,
        http_client: reqwest::Client,
    ) -> Result<Self, WorkflowError> {
        payload.validate()?;

        let start_node = payload
            .start_node()
            .map(|n| n.name.clone())
            .ok_or_else(|| {
                WorkflowError::InvalidWorkflow("No 'manual_trigger' node found".to_string())
            })?;

        let mut in_degree = payload.in_degrees();
        // The start node needs one virtual input to enter the loop.
        *in_degree.entry(start_node.clone()).or_insert(0) += 1;

        let input_buffer = payload
            .nodes
            .iter()
            .map(|n| (n.name.clone(), Vec::new()))
            .collect();

        Ok(Self {
            payload,
            registry,
            http_client,
            start_node,
            in_degree,
            input_buffer,
            queue: VecDeque::new(),
            state: ExecutionState::new(),
        })
    }

    /// Drive the workflow to completion and return the per-node results.
    pub async fn run(mut self) -> ExecutionState {
        let start = self.start_node.clone();
        self.deliver(&start, PortValue::Value(json!({})));

        while let Some((name, inputs)) = self.queue.pop_front() {
            debug!(node = %name, "executing node");

            // A node is skipped outright when every buffered input is a
            // skip signal.
            if inputs.iter().all(PortValue::is_skip) {
                self.state
                    .insert(name.clone(), json!({"status": "skipped"}));
                self.skip_all_children(&name);
                continue;
            }

            let node = self
                .payload
                .node(&name)
                .cloned()
                .expect("queued nodes come from validated connections");

            let input_data = Self::shape_input(&node, &inputs);

            match self.execute_node(&node, &input_data).await {
                Ok(HandlerOutput {
                    result,
                    output_index,
                }) => {
                    self.state.insert(name.clone(), result.clone());

                    for child in self.payload.children_on_port(&name, output_index) {
                        self.deliver(&child, PortValue::Value(result.clone()));
                    }
                    for child in self.payload.children_except_port(&name, output_index) {
                        self.deliver(&child, PortValue::Skip);
                    }
                }
                Err(e) => {
                    warn!(node = %name, error = %e, "node failed");
                    self.state
                        .insert(name.clone(), json!({"error": e.to_string()}));
                    // Propagate failure so downstream joins aren't stuck
                    // waiting.
                    self.skip_all_children(&name);
                }
            }
        }

        // Anything never executed sat on a cycle or an unreachable
        // island; record it so the caller sees the full picture.
        for node in &self.payload.nodes {
            self.state
                .entry(node.name.clone())
                .or_insert_with(|| json!({"error": STUCK_NODE_ERROR}));
        }

        self.state
    }

    /// Filter skip signals and shape the handler input: merge nodes see
    /// the full list of valid inputs, ordinary nodes the first one (or
    /// an empty object when an errored upstream was filtered away).
    fn shape_input(node: &Node, inputs: &[PortValue]) -> Value {
        let mut valid = inputs.iter().filter_map(|slot| match slot {
            PortValue::Value(v) => Some(v.clone()),
            PortValue::Skip => None,
        });

        if node.is_merge() {
            Value::Array(valid.collect())
        } else {
            valid.next().unwrap_or_else(|| json!({}))
        }
    }

    /// Append a value to a child's input buffer and enqueue the child
    /// the moment its buffer holds one entry per incoming edge.
    fn deliver(&mut self, child: &str, value: PortValue) {
        let Some(buffer) = self.input_buffer.get_mut(child) else {
            return;
        };
        buffer.push(value);

        if buffer.len() == *self.in_degree.get(child).unwrap_or(&usize::MAX) {
            self.queue.push_back((child.to_string(), buffer.clone()));
        }
    }

    fn skip_all_children(&mut self, name: &str) {
        for child in self.payload.all_children(name) {
            self.deliver(&child, PortValue::Skip);
        }
    }

    /// Resolve parameters against the accumulated state and invoke the
    /// dispatched handler. Disabled nodes bypass their handler and pass
    /// the input through on port 0.
    async fn execute_node(
        &self,
        node: &Node,
        input_data: &Value,
    ) -> Result<HandlerOutput, EngineError> {
        if node.disabled {
            return Ok(HandlerOutput::main(input_data.clone()));
        }

        let handler = self.registry.get(&node.node_type);
        let params = resolve_all(&self.state, &node.parameters, handler.skip_resolution_keys())?;

        handler
            .run(HandlerContext {
                params: &params,
                input: input_data,
                node_type: &node.node_type,
                http_client: &self.http_client,
            })
            .await
    }
}
