//! `$`-path parsing and state descent.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::ExecutionState;
use crate::error::ResolveError;

/// Token extractor for the lenient grammar: quoted strings or bare
/// identifier/digit runs, in order. Dots and brackets are discarded, so
/// `$Node.field.0` and `$'Node Name'['field'][0]` tokenize identically.
fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"]([^'"]+)['"]|(\w+)"#).expect("valid token pattern"))
}

/// A full path occurrence: `$` + root (quoted name or identifier) +
/// any chain of `.prop`, `['key']`, `["key"]`, `[0]` segments.
pub(crate) fn path_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"\$(?:(?:['"][^'"]+['"])|(?:\w+))(?:(?:\.\w+)|(?:\[['"][^'"]+['"]\])|(?:\[\d+\]))*"#,
        )
        .expect("valid path pattern")
    })
}

/// Anchored variant used to decide whole-value mode.
pub(crate) fn whole_path_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\$(?:(?:['"][^'"]+['"])|(?:\w+))(?:(?:\.\w+)|(?:\[['"][^'"]+['"]\])|(?:\[\d+\]))*$"#,
        )
        .expect("valid anchored path pattern")
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Navigate the execution state along a `$`-path expression.
///
/// The first token is the root node name; subsequent tokens descend into
/// the root's value: object keys by name, array elements by decimal
/// 0-based index.
pub fn resolve_path(state: &ExecutionState, path: &str) -> Result<Value, ResolveError> {
    let stripped = path.strip_prefix('$').unwrap_or(path);

    let tokens: Vec<&str> = token_pattern()
        .captures_iter(stripped)
        .map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default()
        })
        .collect();

    let Some((root, rest)) = tokens.split_first() else {
        return Ok(Value::String(stripped.to_string()));
    };

    let mut current = state.get(*root).ok_or_else(|| {
        let mut available: Vec<String> = state.keys().cloned().collect();
        available.sort();
        ResolveError::UnknownRoot {
            root: (*root).to_string(),
            available,
        }
    })?;

    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(*segment).ok_or_else(|| ResolveError::MissingKey {
                segment: (*segment).to_string(),
                path: path.to_string(),
            })?,
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(index) => items.get(index).ok_or(ResolveError::IndexOutOfBounds {
                    index,
                    path: path.to_string(),
                })?,
                Err(_) => {
                    return Err(ResolveError::CannotAccess {
                        segment: (*segment).to_string(),
                        kind: "array",
                        path: path.to_string(),
                    })
                }
            },
            scalar => {
                return Err(ResolveError::CannotAccess {
                    segment: (*segment).to_string(),
                    kind: value_kind(scalar),
                    path: path.to_string(),
                })
            }
        };
    }

    Ok(current.clone())
}
