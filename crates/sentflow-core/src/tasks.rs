//! Task primitives invoked by node handlers.
//!
//! Pure or I/O workers: arithmetic folds, comparisons, HTTP with retry,
//! concurrent fetches, and delays. Handlers own parameter extraction;
//! these functions own the semantics.

use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::EngineError;

/// Coerce a value to `f64` for arithmetic: numbers as-is, numeric
/// strings parsed, booleans as 1/0.
fn coerce_number(value: &Value) -> Result<f64, EngineError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EngineError::NotANumber(value.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EngineError::NotANumber(value.to_string())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(EngineError::NotANumber(other.to_string())),
    }
}

/// Numeric view used by `condition`: `None` means the side does not
/// look like a number and comparison falls back to the raw values.
fn try_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Log and return the content unchanged.
pub fn print(content: &Value) -> Value {
    match content {
        Value::String(s) => info!("{s}"),
        other => info!("{other}"),
    }
    content.clone()
}

/// Left-fold arithmetic over a list of numbers. Empty input yields 0.
pub fn calc(op: &str, numbers: &[Value]) -> Result<Value, EngineError> {
    if numbers.is_empty() {
        return Ok(json!(0.0));
    }

    let nums: Vec<f64> = numbers.iter().map(coerce_number).collect::<Result<_, _>>()?;

    let result = match op {
        "add" => nums.iter().sum(),
        "sub" => nums[1..].iter().fold(nums[0], |acc, n| acc - n),
        "mul" => nums[1..].iter().fold(nums[0], |acc, n| acc * n),
        "divide" => {
            let mut acc = nums[0];
            for n in &nums[1..] {
                if *n == 0.0 {
                    return Err(EngineError::DivisionByZero);
                }
                acc /= n;
            }
            acc
        }
        other => return Err(EngineError::UnknownOperation(other.to_string())),
    };

    Ok(json!(result))
}

/// Evaluate a comparison. Compares numerically whenever both sides
/// coerce to numbers; `==`/`!=` always produce a boolean; ordering
/// non-numeric values is only defined between strings.
pub fn condition(left: &Value, operator: &str, right: &Value) -> Result<bool, EngineError> {
    if let (Some(l), Some(r)) = (try_numeric(left), try_numeric(right)) {
        return Ok(match operator {
            "<" => l < r,
            ">" => l > r,
            "==" => l == r,
            "!=" => l != r,
            ">=" => l >= r,
            "<=" => l <= r,
            other => return Err(EngineError::InvalidOperator(other.to_string())),
        });
    }

    match operator {
        "==" => Ok(left == right),
        "!=" => Ok(left != right),
        "<" | ">" | ">=" | "<=" => match (left, right) {
            (Value::String(l), Value::String(r)) => Ok(match operator {
                "<" => l < r,
                ">" => l > r,
                ">=" => l >= r,
                _ => l <= r,
            }),
            _ => Err(EngineError::Incomparable {
                left: left.to_string(),
                right: right.to_string(),
            }),
        },
        other => Err(EngineError::InvalidOperator(other.to_string())),
    }
}

/// An outbound HTTP request with retry and timeout policy.
#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub method: &'a str,
    pub body: Option<&'a Value>,
    pub headers: Option<&'a Value>,
    /// Additional attempts after the first.
    pub retries: u32,
    /// Seconds to wait between attempts.
    pub retry_delay: f64,
    /// Per-attempt wall-clock budget in seconds.
    pub timeout: f64,
}

impl<'a> HttpRequest<'a> {
    pub fn get(url: &'a str) -> Self {
        Self {
            url,
            method: "GET",
            body: None,
            headers: None,
            retries: 0,
            retry_delay: 1.0,
            timeout: 30.0,
        }
    }
}

fn apply_headers(
    mut builder: reqwest::RequestBuilder,
    headers: Option<&Value>,
) -> reqwest::RequestBuilder {
    if let Some(Value::Object(map)) = headers {
        for (key, value) in map {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            builder = builder.header(key.as_str(), rendered);
        }
    }
    builder
}

async fn http_attempt(
    client: &reqwest::Client,
    method: &reqwest::Method,
    request: &HttpRequest<'_>,
) -> Result<Value, reqwest::Error> {
    let mut builder = client.request(method.clone(), request.url);
    builder = apply_headers(builder, request.headers);

    if *method == reqwest::Method::POST
        || *method == reqwest::Method::PUT
        || *method == reqwest::Method::PATCH
    {
        builder = builder.json(request.body.unwrap_or(&Value::Null));
    }

    let response = builder.send().await?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.contains("application/json") {
        response.json().await
    } else {
        let status_code = response.status().as_u16();
        let mut headers = Map::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.as_str().to_string(),
                json!(value.to_str().unwrap_or_default()),
            );
        }
        let text = response.text().await?;
        Ok(json!({
            "status_code": status_code,
            "text": text,
            "headers": headers,
        }))
    }
}

/// Issue an HTTP request with up to `retries + 1` attempts.
///
/// JSON responses are decoded; anything else comes back as
/// `{status_code, text, headers}`. Timeouts and transport errors both
/// retry after `retry_delay` seconds; the final failure names the URL
/// and the total attempt count.
pub async fn http(client: &reqwest::Client, request: HttpRequest<'_>) -> Result<Value, EngineError> {
    let method: reqwest::Method = match request.method.to_uppercase().as_str() {
        "GET" => reqwest::Method::GET,
        "POST" => reqwest::Method::POST,
        "PUT" => reqwest::Method::PUT,
        "PATCH" => reqwest::Method::PATCH,
        "DELETE" => reqwest::Method::DELETE,
        other => return Err(EngineError::UnsupportedMethod(other.to_string())),
    };

    let attempts = request.retries + 1;
    let budget = Duration::try_from_secs_f64(request.timeout.max(0.0))
        .map_err(|_| EngineError::NotANumber(request.timeout.to_string()))?;
    let mut last_error: Option<EngineError> = None;

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(budget, http_attempt(client, &method, &request)).await;

        let error = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => EngineError::RequestFailed {
                url: request.url.to_string(),
                attempts,
                message: e.to_string(),
            },
            Err(_) => EngineError::RequestTimedOut {
                url: request.url.to_string(),
                attempts,
            },
        };

        if attempt < attempts {
            warn!(
                url = request.url,
                attempt,
                total = attempts,
                "request failed, retrying in {}s",
                request.retry_delay
            );
            let pause = Duration::try_from_secs_f64(request.retry_delay.max(0.0))
                .unwrap_or(Duration::from_secs(1));
            tokio::time::sleep(pause).await;
        }
        last_error = Some(error);
    }

    Err(last_error.expect("at least one attempt"))
}

/// Fetch every URL concurrently with GET. Per-URL failures become
/// `{"error": ...}` entries; results keep input order.
pub async fn fetch_all(client: &reqwest::Client, urls: &[String]) -> Value {
    let requests = urls.iter().map(|url| async move {
        match client.get(url).send().await {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) => body,
                Err(e) => json!({"error": e.to_string()}),
            },
            Err(e) => json!({"error": e.to_string()}),
        }
    });

    Value::Array(join_all(requests).await)
}

/// Suspend for the duration. Negative values are treated as zero.
pub async fn delay(seconds: f64) {
    let duration = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
    tokio::time::sleep(duration).await;
}
