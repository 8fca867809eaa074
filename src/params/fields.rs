//! Reusable field validation primitives.

use serde_json::Value;
use std::collections::BTreeSet;

use super::{ValidationErrors, UNSUPPORTED_PARAM};

/// Coerce a query parameter value into an ordered list of strings.
///
/// A single string becomes a one-element list; a list is kept in order with
/// any comma-containing entries split apart. The empty string and `null` both
/// normalize to an empty list.
pub fn coerce_string_or_list(value: &Value) -> Result<Vec<String>, String> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) if s.is_empty() => return Ok(Vec::new()),
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(entries) => {
            let mut items = Vec::with_capacity(entries.len());
            for entry in entries {
                match entry {
                    Value::String(s) => items.push(s.clone()),
                    Value::Number(n) => items.push(n.to_string()),
                    Value::Bool(b) => items.push(b.to_string()),
                    _ => return Err("Expected a string or a list of strings.".to_string()),
                }
            }
            items
        }
        _ => return Err("Expected a string or a list of strings.".to_string()),
    };

    // Comma separated values are allowed inside a single query param.
    Ok(items
        .iter()
        .flat_map(|item| item.split(','))
        .map(str::to_string)
        .collect())
}

/// Reject any supplied field name that is not declared on the schema.
///
/// All offending names are aggregated into one error mapping in a single pass.
/// Callers must only invoke this with the explicitly supplied key set; fields
/// populated from defaults never reach it.
pub fn reject_unknown_fields<'a, D, S>(declared: D, supplied: S) -> Result<(), ValidationErrors>
where
    D: IntoIterator<Item = &'a str>,
    S: IntoIterator<Item = &'a str>,
{
    let declared: BTreeSet<&str> = declared.into_iter().collect();
    let mut errors = ValidationErrors::new();
    for name in supplied {
        if !declared.contains(name) {
            errors.push(name, UNSUPPORTED_PARAM);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
