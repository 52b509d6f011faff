//! Integration tests for the workflow execution engine.
//!
//! These tests verify end-to-end graph execution: linear data flow,
//! conditional branching with skip propagation, joins, switch routing,
//! HTTP retry behavior, and cycle reporting.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use sentflow_core::{ExecutionState, HandlerRegistry, WorkflowEngine};
use sentflow_workflow::{Node, WorkflowPayload};

// ============================================================================
// Helper functions
// ============================================================================

/// Build a payload from nodes and `(source, target, output_port)` wires.
fn make_workflow(nodes: Vec<Node>, wires: &[(&str, &str, usize)]) -> WorkflowPayload {
    let mut wf = WorkflowPayload::new("test workflow");
    for node in nodes {
        wf.add_node(node);
    }
    for &(source, target, port) in wires {
        wf.connect(source, target, port);
    }
    wf
}

async fn run(wf: WorkflowPayload) -> ExecutionState {
    let engine = WorkflowEngine::new(wf, Arc::new(HandlerRegistry::new()), reqwest::Client::new())
        .expect("workflow should validate");
    engine.run().await
}

fn trigger(name: &str) -> Node {
    Node::new(name, "manual_trigger")
}

fn print_node(name: &str, content: Option<&str>) -> Node {
    let mut node = Node::new(name, "print");
    if let Some(content) = content {
        node.set_parameter("content", json!(content));
    }
    node
}

fn calculate_node(name: &str, operation: &str, numbers: Value) -> Node {
    let mut node = Node::new(name, "calculate");
    node.set_parameter("operation", json!(operation));
    node.set_parameter("numbers", numbers);
    node
}

fn condition_node(name: &str, left: Value, operator: &str, right: Value) -> Node {
    let mut node = Node::new(name, "condition");
    node.set_parameter("left", left);
    node.set_parameter("operator", json!(operator));
    node.set_parameter("right", right);
    node
}

fn switch_node(name: &str, value: Value, cases: Value) -> Node {
    let mut node = Node::new(name, "switch");
    node.set_parameter("value", value);
    node.set_parameter("cases", cases);
    node
}

fn merge_node(name: &str) -> Node {
    Node::new(name, "merge")
}

fn http_node(name: &str, url: &str, retries: u32, retry_delay: f64) -> Node {
    let mut node = Node::new(name, "http");
    node.set_parameter("url", json!(url));
    node.set_parameter("retries", json!(retries));
    node.set_parameter("retry_delay", json!(retry_delay));
    node
}

const SKIPPED: &str = r#"{"status":"skipped"}"#;

fn skipped() -> Value {
    serde_json::from_str(SKIPPED).unwrap()
}

// ============================================================================
// Scenario 1: linear arithmetic into a template print
// ============================================================================

#[tokio::test]
async fn test_linear_arithmetic_and_template() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            calculate_node("sum", "add", json!([10, 20])),
            print_node("show", Some("Result: $sum")),
        ],
        &[("trigger", "sum", 0), ("sum", "show", 0)],
    );

    let results = run(wf).await;

    assert_eq!(results["trigger"], json!({}));
    assert_eq!(results["sum"], json!(30.0));
    assert_eq!(results["show"], json!("Result: 30.0"));
}

// ============================================================================
// Scenario 2: IF branches with skip propagation
// ============================================================================

#[tokio::test]
async fn test_if_branch_selection() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            condition_node("check", json!(5), ">", json!(3)),
            print_node("yes", Some("T")),
            print_node("no", Some("F")),
        ],
        &[("trigger", "check", 0), ("check", "yes", 0), ("check", "no", 1)],
    );

    let results = run(wf).await;

    assert_eq!(results["check"], json!({"condition_result": true}));
    assert_eq!(results["yes"], json!("T"));
    assert_eq!(results["no"], skipped());
}

// ============================================================================
// Scenario 3: merge after IF filters the skip signal out
// ============================================================================

#[tokio::test]
async fn test_merge_after_if() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            condition_node("check", json!(5), ">", json!(3)),
            print_node("yes", Some("T")),
            print_node("no", Some("F")),
            merge_node("tail"),
        ],
        &[
            ("trigger", "check", 0),
            ("check", "yes", 0),
            ("check", "no", 1),
            ("yes", "tail", 0),
            ("no", "tail", 0),
        ],
    );

    let results = run(wf).await;

    assert_eq!(results["tail"], json!(["T"]));
}

#[tokio::test]
async fn test_merge_receives_all_real_inputs() {
    let mut a = Node::new("a", "set");
    a.set_parameter("value", json!(1));
    let mut b = Node::new("b", "set");
    b.set_parameter("value", json!(2));

    let wf = make_workflow(
        vec![trigger("trigger"), a, b, merge_node("tail")],
        &[
            ("trigger", "a", 0),
            ("trigger", "b", 0),
            ("a", "tail", 0),
            ("b", "tail", 0),
        ],
    );

    let results = run(wf).await;

    // Arrival order follows connection declaration order.
    assert_eq!(results["tail"], json!([1, 2]));
}

// ============================================================================
// Scenario 4: switch routing
// ============================================================================

#[tokio::test]
async fn test_switch_routes_matched_port() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            switch_node("sw", json!("b"), json!(["a", "b", "c"])),
            print_node("A", None),
            print_node("B", None),
            print_node("C", None),
            print_node("D", None),
        ],
        &[
            ("trigger", "sw", 0),
            ("sw", "A", 0),
            ("sw", "B", 1),
            ("sw", "C", 2),
            ("sw", "D", 3),
        ],
    );

    let results = run(wf).await;

    assert_eq!(results["sw"], json!({"matched_case": "b"}));
    // The matched branch receives the switch result as input.
    assert_eq!(results["B"], json!({"matched_case": "b"}));
    assert_eq!(results["A"], skipped());
    assert_eq!(results["C"], skipped());
    assert_eq!(results["D"], skipped());
}

#[tokio::test]
async fn test_switch_default_port() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            switch_node("sw", json!("zz"), json!(["a", "b"])),
            print_node("A", None),
            print_node("B", None),
            print_node("fallback", None),
        ],
        &[
            ("trigger", "sw", 0),
            ("sw", "A", 0),
            ("sw", "B", 1),
            ("sw", "fallback", 2),
        ],
    );

    let results = run(wf).await;

    assert_eq!(results["sw"], json!({"matched_case": "default"}));
    assert_eq!(results["fallback"], json!({"matched_case": "default"}));
    assert_eq!(results["A"], skipped());
    assert_eq!(results["B"], skipped());
}

// ============================================================================
// Scenario 5: HTTP with retry succeeding on the second attempt
// ============================================================================

#[tokio::test]
async fn test_http_retry_succeeds_on_second_attempt() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection: accept and drop, a transport error for the
        // client mid-request.
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);

        // Second connection: minimal JSON response.
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = socket.read(&mut buf).await;
        let body = r#"{"x":1}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    let url = format!("http://{addr}/data");
    let wf = make_workflow(
        vec![trigger("trigger"), http_node("req", &url, 1, 0.05)],
        &[("trigger", "req", 0)],
    );

    let results = run(wf).await;

    assert_eq!(results["req"], json!({"x": 1}));
}

#[tokio::test]
async fn test_http_exhausted_retries_marks_node_errored() {
    // Nothing listens here; every attempt is a transport error.
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            http_node("req", "http://127.0.0.1:1/unreachable", 1, 0.01),
            print_node("after", None),
        ],
        &[("trigger", "req", 0), ("req", "after", 0)],
    );

    let results = run(wf).await;

    let message = results["req"]["error"].as_str().unwrap();
    assert!(message.contains("after 2 attempts"), "got: {message}");
    assert!(message.contains("http://127.0.0.1:1/unreachable"));
    // Failure propagates a skip so downstream nodes are not stuck.
    assert_eq!(results["after"], skipped());
}

#[tokio::test]
async fn test_http_json_and_plain_responses() {
    let server = httpmock::MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(httpmock::Method::GET).path("/json");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"ok":true,"n":3}"#);
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(httpmock::Method::GET).path("/plain");
            then.status(201)
                .header("content-type", "text/plain")
                .body("hello");
        })
        .await;

    let wf = make_workflow(
        vec![
            trigger("trigger"),
            http_node("json", &server.url("/json"), 0, 1.0),
            http_node("plain", &server.url("/plain"), 0, 1.0),
        ],
        &[("trigger", "json", 0), ("trigger", "plain", 0)],
    );

    let results = run(wf).await;

    assert_eq!(results["json"], json!({"ok": true, "n": 3}));
    assert_eq!(results["plain"]["status_code"], json!(201));
    assert_eq!(results["plain"]["text"], json!("hello"));
    assert_eq!(
        results["plain"]["headers"]["content-type"],
        json!("text/plain")
    );
}

#[tokio::test]
async fn test_parallel_fetch_preserves_order_and_isolates_failures() {
    let server = httpmock::MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(httpmock::Method::GET).path("/a");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"id":"a"}"#);
        })
        .await;

    let good = server.url("/a");
    let bad = "http://127.0.0.1:1/dead".to_string();

    let mut node = Node::new("fan", "parallel");
    node.set_parameter("urls", json!([good, bad]));

    let wf = make_workflow(
        vec![trigger("trigger"), node],
        &[("trigger", "fan", 0)],
    );

    let results = run(wf).await;

    let fan = results["fan"].as_array().unwrap();
    assert_eq!(fan.len(), 2);
    assert_eq!(fan[0], json!({"id": "a"}));
    assert!(fan[1]["error"].is_string());
}

// ============================================================================
// Scenario 6: cycles are reported after the run
// ============================================================================

#[tokio::test]
async fn test_cycle_nodes_marked_stuck() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            print_node("ok", Some("done")),
            print_node("A", None),
            print_node("B", None),
        ],
        &[("trigger", "ok", 0), ("A", "B", 0), ("B", "A", 0)],
    );

    let results = run(wf).await;

    assert_eq!(results["ok"], json!("done"));
    let cycle_error = json!({
        "error": "Node never executed (possible cycle or missing input)"
    });
    assert_eq!(results["A"], cycle_error);
    assert_eq!(results["B"], cycle_error);
}

// ============================================================================
// Error and edge behaviors
// ============================================================================

#[tokio::test]
async fn test_every_reachable_node_gets_exactly_one_entry() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            condition_node("check", json!(1), "<", json!(2)),
            print_node("yes", Some("y")),
            print_node("no", Some("n")),
            merge_node("tail"),
            print_node("end", None),
        ],
        &[
            ("trigger", "check", 0),
            ("check", "yes", 0),
            ("check", "no", 1),
            ("yes", "tail", 0),
            ("no", "tail", 0),
            ("tail", "end", 0),
        ],
    );

    let results = run(wf).await;

    // 6 nodes, 6 entries, no extras.
    assert_eq!(results.len(), 6);
    assert_eq!(results["end"], json!(["y"]));
}

#[tokio::test]
async fn test_unresolvable_variable_marks_node_errored() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            print_node("show", Some("$ghost")),
            print_node("after", None),
        ],
        &[("trigger", "show", 0), ("show", "after", 0)],
    );

    let results = run(wf).await;

    let message = results["show"]["error"].as_str().unwrap();
    assert!(message.contains("'ghost' not found"), "got: {message}");
    assert_eq!(results["after"], skipped());
}

#[tokio::test]
async fn test_division_by_zero_marks_node_errored() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            calculate_node("div", "divide", json!([1, 0])),
        ],
        &[("trigger", "div", 0)],
    );

    let results = run(wf).await;

    assert_eq!(results["div"], json!({"error": "Division by zero"}));
}

#[tokio::test]
async fn test_disabled_node_passes_input_through() {
    let mut bypassed = calculate_node("calc", "divide", json!([1, 0]));
    bypassed.disabled = true;

    let wf = make_workflow(
        vec![trigger("trigger"), bypassed, print_node("after", None)],
        &[("trigger", "calc", 0), ("calc", "after", 0)],
    );

    let results = run(wf).await;

    // The disabled node forwards its input instead of dividing by zero.
    assert_eq!(results["calc"], json!({}));
    assert_eq!(results["after"], json!({}));
}

#[tokio::test]
async fn test_unknown_node_type_is_a_noop() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            Node::new("sheet", "n8n-nodes-base.spreadsheetFile"),
        ],
        &[("trigger", "sheet", 0)],
    );

    let results = run(wf).await;

    assert_eq!(results["sheet"], json!({}));
}

#[tokio::test]
async fn test_chained_variable_descent() {
    let mut seed = Node::new("seed", "set");
    seed.set_parameter("value", json!({"items": [{"name": "first"}, {"name": "second"}]}));

    let wf = make_workflow(
        vec![
            trigger("trigger"),
            seed,
            print_node("pick", Some("$seed.items[1]['name']")),
        ],
        &[("trigger", "seed", 0), ("seed", "pick", 0)],
    );

    let results = run(wf).await;

    assert_eq!(results["pick"], json!("second"));
}

#[tokio::test]
async fn test_skip_cascades_through_chains() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            condition_node("check", json!(1), ">", json!(2)),
            print_node("yes", Some("T")),
            print_node("deep", Some("deeper")),
            print_node("no", Some("F")),
        ],
        &[
            ("trigger", "check", 0),
            ("check", "yes", 0),
            ("yes", "deep", 0),
            ("check", "no", 1),
        ],
    );

    let results = run(wf).await;

    assert_eq!(results["check"], json!({"condition_result": false}));
    assert_eq!(results["yes"], skipped());
    assert_eq!(results["deep"], skipped());
    assert_eq!(results["no"], json!("F"));
}

#[tokio::test]
async fn test_fan_out_within_one_port() {
    let wf = make_workflow(
        vec![
            trigger("trigger"),
            calculate_node("sum", "add", json!([1, 2])),
            print_node("left", Some("L $sum")),
            print_node("right", Some("R $sum")),
        ],
        &[
            ("trigger", "sum", 0),
            ("sum", "left", 0),
            ("sum", "right", 0),
        ],
    );

    let results = run(wf).await;

    assert_eq!(results["left"], json!("L 3.0"));
    assert_eq!(results["right"], json!("R 3.0"));
}
