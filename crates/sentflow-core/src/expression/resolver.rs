//! Recursive parameter-tree rewriting.

use serde_json::{Map, Value};

use super::path::{path_pattern, resolve_path, whole_path_pattern};
use super::ExecutionState;
use crate::error::ResolveError;

/// String form of a resolved value for template substitution: strings
/// verbatim, everything else as its compact JSON rendering.
pub(crate) fn template_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Recursively resolve `$` variables in a parameter tree.
///
/// Sub-trees under keys listed in `skip_keys` are passed through
/// unresolved at every mapping level; control-flow nodes use this for
/// sub-task bodies whose variables only exist in a later scope.
///
/// Whole-value failures propagate (the owning node errors); template
/// occurrences that fail to resolve keep their original text, which is
/// what permits literals like `"$100 USD"`.
pub fn resolve_all(
    state: &ExecutionState,
    value: &Value,
    skip_keys: &[&str],
) -> Result<Value, ResolveError> {
    match value {
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, sub_value) in map {
                if skip_keys.contains(&key.as_str()) {
                    resolved.insert(key.clone(), sub_value.clone());
                } else {
                    resolved.insert(key.clone(), resolve_all(state, sub_value, skip_keys)?);
                }
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| resolve_all(state, item, skip_keys))
                .collect::<Result<_, _>>()?,
        )),
        Value::String(s) if s.contains('$') => {
            if whole_path_pattern().is_match(s) {
                // Whole-value mode: the resolved value keeps its type.
                resolve_path(state, s)
            } else {
                // Template mode: stringify each occurrence in place.
                let rendered = path_pattern().replace_all(s, |caps: &regex::Captures| {
                    let occurrence = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                    match resolve_path(state, occurrence) {
                        Ok(resolved) => template_string(&resolved),
                        Err(_) => occurrence.to_string(),
                    }
                });
                Ok(Value::String(rendered.into_owned()))
            }
        }
        other => Ok(other.clone()),
    }
}
