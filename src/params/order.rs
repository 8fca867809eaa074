//! Order-by parameter group: every field, including dynamic tag fields, takes
//! an asc/desc direction rather than a value list.

use super::schema::{FieldKind, FieldSchema};
use super::ReportScope;

pub const ORDER_CHOICES: &[&str] = &["asc", "desc"];

const BASE_FIELDS: &[&str] = &["cost", "infrastructure", "supplementary", "delta"];
const AWS_FIELDS: &[&str] = &["account_alias", "usage"];
const OCP_FIELDS: &[&str] = &["usage", "request", "limit", "capacity"];

/// The primary order-by schema for a report scope.
///
/// Operator variants are declared here so `or:`-prefixed keys pass field
/// validation and reach the order-by/group-by cross check, which rejects
/// them with a targeted message.
pub fn schema_for(scope: ReportScope, tag_keys: &[String]) -> FieldSchema {
    let mut names: Vec<&str> = BASE_FIELDS.to_vec();
    match scope {
        ReportScope::Aws => names.extend(AWS_FIELDS),
        ReportScope::Ocp => names.extend(OCP_FIELDS),
        ReportScope::All => {}
    }
    let fields: Vec<(&str, FieldKind)> = names
        .iter()
        .map(|name| (*name, FieldKind::Choice(ORDER_CHOICES)))
        .collect();
    FieldSchema::build(&fields, &names, tag_keys, FieldKind::Choice(ORDER_CHOICES))
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
