//! Group-by parameter group.
//!
//! Declares no fields beyond the provider dimensions; it exists as its own
//! schema so tag keys and operator variants are synthesized with group-by
//! semantics (string-or-list values, no ordering constraint).

use super::schema::{FieldKind, FieldSchema};
use super::ReportScope;

const AWS_FIELDS: &[&str] = &["account", "service", "region"];
const OCP_FIELDS: &[&str] = &["project", "cluster", "node"];

/// The primary group-by schema for a report scope.
pub fn schema_for(scope: ReportScope, tag_keys: &[String]) -> FieldSchema {
    let names: &[&str] = match scope {
        ReportScope::Aws => AWS_FIELDS,
        ReportScope::Ocp => OCP_FIELDS,
        ReportScope::All => &[],
    };
    let fields: Vec<(&str, FieldKind)> = names
        .iter()
        .map(|name| (*name, FieldKind::StringOrList))
        .collect();
    FieldSchema::build(&fields, names, tag_keys, FieldKind::StringOrList)
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
