//! Node handlers and the dispatch registry.
//!
//! Each handler receives the node's resolved parameters and shaped input
//! data and returns both a result and the output port index to fire.
//! Most nodes always fire port 0; branch nodes pick the port that
//! matched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::EngineError;
use crate::expression::resolver::template_string;
use crate::tasks;

/// Execution context handed to a handler.
pub struct HandlerContext<'a> {
    /// Fully resolved node parameters.
    pub params: &'a Value,
    /// Shaped input data: the first valid upstream value for ordinary
    /// nodes, the full list for merge nodes, `{}` when nothing arrived.
    pub input: &'a Value,
    /// The node's declared type string.
    pub node_type: &'a str,
    /// Shared outbound HTTP client.
    pub http_client: &'a reqwest::Client,
}

/// A handler's result plus the output port it selects.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    pub result: Value,
    pub output_index: usize,
}

impl HandlerOutput {
    /// Result routed to the default output port.
    pub fn main(result: Value) -> Self {
        Self {
            result,
            output_index: 0,
        }
    }
}

/// Trait for executing nodes.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Parameter keys whose sub-trees the resolver must pass through
    /// unresolved (sub-task bodies resolved in their own scope later).
    fn skip_resolution_keys(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError>;
}

// ============================================================================
// Built-in node handlers
// ============================================================================

/// `manual_trigger` - entry point; emits an empty object.
struct ManualTriggerHandler;

#[async_trait]
impl NodeHandler for ManualTriggerHandler {
    async fn run(&self, _ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        Ok(HandlerOutput::main(json!({})))
    }
}

/// `print` - log and pass along `content` (or `text`), falling back to
/// the input data.
struct PrintHandler;

#[async_trait]
impl NodeHandler for PrintHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let content = ctx
            .params
            .get("content")
            .or_else(|| ctx.params.get("text"))
            .unwrap_or(ctx.input);
        Ok(HandlerOutput::main(tasks::print(content)))
    }
}

/// `set` - emit `params.value`, or the whole parameter object when no
/// value key is present.
struct SetHandler;

#[async_trait]
impl NodeHandler for SetHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let value = ctx
            .params
            .get("value")
            .cloned()
            .unwrap_or_else(|| ctx.params.clone());
        Ok(HandlerOutput::main(value))
    }
}

/// `calculate` - fold `params.numbers` with `params.operation`.
struct CalculateHandler;

#[async_trait]
impl NodeHandler for CalculateHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let op = ctx
            .params
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or("add");
        let numbers = ctx
            .params
            .get("numbers")
            .and_then(Value::as_array)
            .ok_or(EngineError::MissingParameter("numbers"))?;
        Ok(HandlerOutput::main(tasks::calc(op, numbers)?))
    }
}

/// `http` - request with retry/timeout policy.
struct HttpHandler;

#[async_trait]
impl NodeHandler for HttpHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let url = ctx
            .params
            .get("url")
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingParameter("url"))?;

        let request = tasks::HttpRequest {
            url,
            method: ctx
                .params
                .get("method")
                .and_then(Value::as_str)
                .unwrap_or("GET"),
            body: ctx.params.get("body"),
            headers: ctx.params.get("headers"),
            retries: ctx
                .params
                .get("retries")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            retry_delay: ctx
                .params
                .get("retry_delay")
                .and_then(Value::as_f64)
                .unwrap_or(1.0),
            timeout: ctx
                .params
                .get("timeout")
                .and_then(Value::as_f64)
                .unwrap_or(30.0),
        };

        Ok(HandlerOutput::main(
            tasks::http(ctx.http_client, request).await?,
        ))
    }
}

/// `parallel` - GET every URL concurrently, collecting bodies in order.
struct ParallelHandler;

#[async_trait]
impl NodeHandler for ParallelHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let urls: Vec<String> = match (ctx.params.get("urls"), ctx.params.get("tasks")) {
            (Some(Value::Array(urls)), _) => urls
                .iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect(),
            (_, Some(Value::Array(subtasks))) => subtasks
                .iter()
                .filter_map(|t| t.get("url").and_then(Value::as_str).map(str::to_string))
                .collect(),
            _ => return Err(EngineError::MissingParameter("urls")),
        };

        Ok(HandlerOutput::main(
            tasks::fetch_all(ctx.http_client, &urls).await,
        ))
    }
}

/// `delay` - wait `params.seconds`, report how long.
struct DelayHandler;

#[async_trait]
impl NodeHandler for DelayHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let seconds_param = ctx
            .params
            .get("seconds")
            .ok_or(EngineError::MissingParameter("seconds"))?;
        let seconds = seconds_param
            .as_f64()
            .ok_or_else(|| EngineError::NotANumber(seconds_param.to_string()))?;

        tasks::delay(seconds).await;

        Ok(HandlerOutput::main(json!(format!(
            "Waited {} seconds",
            template_string(seconds_param)
        ))))
    }
}

/// `condition` / `if` - evaluate and select the true (0) or false (1)
/// output port.
struct ConditionHandler;

#[async_trait]
impl NodeHandler for ConditionHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let left = ctx
            .params
            .get("left")
            .ok_or(EngineError::MissingParameter("left"))?;
        let operator = ctx
            .params
            .get("operator")
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingParameter("operator"))?;
        let right = ctx
            .params
            .get("right")
            .ok_or(EngineError::MissingParameter("right"))?;

        let outcome = tasks::condition(left, operator, right)?;

        Ok(HandlerOutput {
            result: json!({"condition_result": outcome}),
            output_index: if outcome { 0 } else { 1 },
        })
    }
}

/// `switch` - route to the port of the first case equal (as strings) to
/// `params.value`; port `cases.len()` is the default output.
struct SwitchHandler;

#[async_trait]
impl NodeHandler for SwitchHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        let value = ctx
            .params
            .get("value")
            .ok_or(EngineError::MissingParameter("value"))?;
        let cases = ctx
            .params
            .get("cases")
            .and_then(Value::as_array)
            .ok_or(EngineError::MissingParameter("cases"))?;

        let needle = template_string(value);
        let matched = cases
            .iter()
            .position(|case| template_string(case) == needle);

        Ok(match matched {
            Some(index) => HandlerOutput {
                result: json!({"matched_case": cases[index]}),
                output_index: index,
            },
            None => HandlerOutput {
                result: json!({"matched_case": "default"}),
                output_index: cases.len(),
            },
        })
    }
}

/// `merge` - emit the buffered inputs exactly as received.
struct MergeHandler;

#[async_trait]
impl NodeHandler for MergeHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        Ok(HandlerOutput::main(ctx.input.clone()))
    }
}

/// Fallback for node types with no compatible handler: pass the input
/// through untouched.
struct PassthroughHandler;

#[async_trait]
impl NodeHandler for PassthroughHandler {
    async fn run(&self, ctx: HandlerContext<'_>) -> Result<HandlerOutput, EngineError> {
        debug!(node_type = ctx.node_type, "no handler registered, passing through");
        Ok(HandlerOutput::main(ctx.input.clone()))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Dispatch table mapping node-type strings to handlers.
///
/// Lookup order: native table, then the n8n compatibility table, then
/// the pass-through fallback. All lookups are constant-time key checks
/// on fully qualified type strings.
pub struct HandlerRegistry {
    native: HashMap<&'static str, Arc<dyn NodeHandler>>,
    compat: HashMap<&'static str, &'static str>,
    fallback: Arc<dyn NodeHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        let mut native: HashMap<&'static str, Arc<dyn NodeHandler>> = HashMap::new();
        native.insert("manual_trigger", Arc::new(ManualTriggerHandler));
        native.insert("print", Arc::new(PrintHandler));
        native.insert("set", Arc::new(SetHandler));
        native.insert("calculate", Arc::new(CalculateHandler));
        native.insert("http", Arc::new(HttpHandler));
        native.insert("parallel", Arc::new(ParallelHandler));
        native.insert("delay", Arc::new(DelayHandler));
        native.insert("condition", Arc::new(ConditionHandler));
        native.insert("if", Arc::new(ConditionHandler));
        native.insert("switch", Arc::new(SwitchHandler));
        native.insert("merge", Arc::new(MergeHandler));

        let compat: HashMap<&'static str, &'static str> = [
            ("n8n-nodes-base.manualTrigger", "manual_trigger"),
            ("n8n-nodes-base.httpRequest", "http"),
            ("n8n-nodes-base.if", "condition"),
            ("n8n-nodes-base.set", "set"),
            ("n8n-nodes-base.merge", "merge"),
            ("n8n-nodes-base.switch", "switch"),
        ]
        .into_iter()
        .collect();

        Self {
            native,
            compat,
            fallback: Arc::new(PassthroughHandler),
        }
    }

    /// Resolve a node type to its handler; unknown types get the
    /// pass-through fallback, never an error.
    pub fn get(&self, node_type: &str) -> Arc<dyn NodeHandler> {
        if let Some(handler) = self.native.get(node_type) {
            return handler.clone();
        }
        if let Some(handler) = self
            .compat
            .get(node_type)
            .and_then(|native_name| self.native.get(*native_name))
        {
            return handler.clone();
        }
        self.fallback.clone()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
