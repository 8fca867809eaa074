//! Report query validation endpoint.
//!
//! Accepts the bracketed query-parameter syntax
//! (`filter[resolution]=daily&group_by[account]=a&order_by[cost]=asc`),
//! validates it for the tenant, and returns the normalized query
//! specification. Report execution against the validated query is handled by
//! a separate query-builder service.

use axum::extract::{Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{Map, Value};

use crate::api::AppState;
use crate::error::AppError;
use crate::params::{ReportQuery, ReportQueryValidator, ReportScope};

pub async fn get_report_costs(
    Path(scope): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<ReportQuery>, AppError> {
    let scope: ReportScope = scope
        .parse()
        .map_err(|_| AppError::NotFound(format!("unknown report scope: {}", scope)))?;

    let schema = tenant_schema(&headers, &state.config.default_schema);

    let tag_keys: Vec<String> = state
        .store
        .enabled_tag_keys(&schema)
        .await?
        .into_iter()
        .map(|key| format!("tag:{}", key))
        .collect();

    let payload = parse_query_string(query.as_deref().unwrap_or(""));
    let validator = ReportQueryValidator::new(scope, tag_keys, state.dates.clone());
    let report = validator.validate(&payload).map_err(AppError::Validation)?;

    Ok(Json(report))
}

fn tenant_schema(headers: &HeaderMap, default_schema: &str) -> String {
    headers
        .get("x-tenant-schema")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default_schema)
        .to_string()
}

/// Parse a raw query string into the nested payload the validator expects.
///
/// `group[field]=value` nests under `group`; bare keys stay at the top
/// level. Repeated keys accumulate into lists in arrival order.
pub fn parse_query_string(raw: &str) -> Value {
    let mut top = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        let value = value.into_owned();
        if let Some((outer, rest)) = key.split_once('[') {
            if let Some(inner) = rest.strip_suffix(']') {
                let entry = top
                    .entry(outer.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(group) = entry {
                    push_param(group, inner, value);
                }
                continue;
            }
        }
        push_param(&mut top, &key, value);
    }
    Value::Object(top)
}

fn push_param(map: &mut Map<String, Value>, key: &str, value: String) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), Value::String(value));
        }
        Some(Value::String(_)) => {
            let Some(Value::String(first)) = map.remove(key) else {
                return;
            };
            map.insert(
                key.to_string(),
                Value::Array(vec![Value::String(first), Value::String(value)]),
            );
        }
        Some(Value::Array(items)) => items.push(Value::String(value)),
        // A scalar arriving for a key already used with brackets (or the
        // other way round) is dropped; the validator rejects what remains.
        Some(_) => {}
    }
}
