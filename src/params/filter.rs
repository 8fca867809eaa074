//! Filter parameter group: resolution, relative time scope, resource scope,
//! pagination, provider dimensions, and dynamic tag filters.

use std::collections::BTreeMap;

use super::schema::{FieldKind, FieldSchema, ParamValue};
use super::{ReportScope, ValidationErrors};

pub const RESOLUTION_CHOICES: &[&str] = &["daily", "monthly"];
pub const TIME_SCOPE_VALUE_CHOICES: &[&str] = &["-10", "-30", "-1", "-2"];
pub const TIME_SCOPE_UNITS_CHOICES: &[&str] = &["day", "month"];

const AWS_OPFIELDS: &[&str] = &["account", "service", "region"];
const OCP_OPFIELDS: &[&str] = &["project", "cluster", "node"];

fn base_fields() -> Vec<(&'static str, FieldKind)> {
    vec![
        ("resolution", FieldKind::Choice(RESOLUTION_CHOICES)),
        // time_scope_value/units are deprecated in favor of start/end dates.
        ("time_scope_value", FieldKind::Choice(TIME_SCOPE_VALUE_CHOICES)),
        ("time_scope_units", FieldKind::Choice(TIME_SCOPE_UNITS_CHOICES)),
        ("resource_scope", FieldKind::StringOrList),
        ("limit", FieldKind::Integer { min: 1 }),
        ("offset", FieldKind::Integer { min: 0 }),
    ]
}

/// The primary filter schema for a report scope.
pub fn schema_for(scope: ReportScope, tag_keys: &[String]) -> FieldSchema {
    let mut fields = base_fields();
    let opfields: &[&str] = match scope {
        ReportScope::Aws => {
            for name in AWS_OPFIELDS {
                fields.push((*name, FieldKind::StringOrList));
            }
            AWS_OPFIELDS
        }
        ReportScope::Ocp => {
            for name in OCP_OPFIELDS {
                fields.push((*name, FieldKind::StringOrList));
            }
            OCP_OPFIELDS
        }
        ReportScope::All => &[],
    };
    FieldSchema::build(&fields, opfields, tag_keys, FieldKind::StringOrList)
}

/// Fallback schemas tried in order when the primary schema rejects the group.
pub fn alternatives_for(scope: ReportScope, tag_keys: &[String]) -> Vec<FieldSchema> {
    match scope {
        ReportScope::All => vec![
            schema_for(ReportScope::Aws, tag_keys),
            schema_for(ReportScope::Ocp, tag_keys),
        ],
        _ => Vec::new(),
    }
}

/// Cross-field rule for the deprecated relative time scope.
///
/// Runs after per-field validation, so tokens here are already members of
/// their choice sets.
pub fn validate_time_scope(
    values: &BTreeMap<String, ParamValue>,
) -> Result<(), ValidationErrors> {
    let units = values.get("time_scope_units").and_then(ParamValue::as_token);
    let value = values.get("time_scope_value").and_then(ParamValue::as_token);
    let resolution = values.get("resolution").and_then(ParamValue::as_token);

    let (Some(units), Some(value)) = (units, value) else {
        return Ok(());
    };

    let message = |valid: &str, unit: &str| {
        format!("Valid values are {} when time_scope_units is {}", valid, unit)
    };

    if units == "day" && (value == "-1" || value == "-2") {
        return Err(ValidationErrors::single(
            "time_scope_value",
            message("-10, -30", "day"),
        ));
    }
    if units == "day" && resolution == Some("monthly") {
        return Err(ValidationErrors::single("resolution", message("daily", "day")));
    }
    if units == "month" && (value == "-10" || value == "-30") {
        return Err(ValidationErrors::single(
            "time_scope_value",
            message("-1, -2", "month"),
        ));
    }
    Ok(())
}
