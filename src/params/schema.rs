//! Immutable field schemas built per request.
//!
//! A [`FieldSchema`] is constructed once from the static field declarations,
//! the operator-eligible field list, and the tenant's tag keys. Nothing is
//! mutated after construction, so schemas are safe to share across checks.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::fields::{coerce_string_or_list, reject_unknown_fields};
use super::ValidationErrors;

/// How a declared field coerces and constrains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string or list of strings, comma-splitting applied.
    StringOrList,
    /// One token from a fixed set of choices.
    Choice(&'static [&'static str]),
    /// An integer with an inclusive lower bound.
    Integer { min: i64 },
    /// An ISO-8601 calendar date.
    Date,
}

/// A validated, normalized parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Strings(Vec<String>),
    Token(String),
    Int(i64),
    Date(NaiveDate),
}

impl ParamValue {
    pub fn as_token(&self) -> Option<&str> {
        match self {
            ParamValue::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            ParamValue::Strings(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ParamValue::Date(date) => Some(*date),
            _ => None,
        }
    }
}

/// An ordered, immutable map of declared field names to their kinds.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    fields: BTreeMap<String, FieldKind>,
}

impl FieldSchema {
    /// Build a complete field map from static declarations, operator-eligible
    /// fields, and dynamic tag keys.
    ///
    /// Every name in `opfields` gets `and:` and `or:` string-or-list variants.
    /// Every tag key (already carrying its `tag:` prefix) is declared with
    /// `tag_kind`, which differs between filter/group (string-or-list) and
    /// order (asc/desc choice) schemas.
    pub fn build(
        base: &[(&str, FieldKind)],
        opfields: &[&str],
        tag_keys: &[String],
        tag_kind: FieldKind,
    ) -> Self {
        let mut fields = BTreeMap::new();
        for (name, kind) in base {
            fields.insert((*name).to_string(), *kind);
        }
        for name in opfields {
            fields.insert(format!("and:{}", name), FieldKind::StringOrList);
            fields.insert(format!("or:{}", name), FieldKind::StringOrList);
        }
        for key in tag_keys {
            fields.insert(key.clone(), tag_kind);
        }
        FieldSchema { fields }
    }

    pub fn declares(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Validate a raw parameter group against this schema.
    ///
    /// Unknown fields are rejected first (aggregated), then each supplied
    /// value is coerced per its declared kind.
    pub fn validate(
        &self,
        raw: &Map<String, Value>,
    ) -> Result<BTreeMap<String, ParamValue>, ValidationErrors> {
        reject_unknown_fields(
            self.fields.keys().map(String::as_str),
            raw.keys().map(String::as_str),
        )?;

        let mut validated = BTreeMap::new();
        let mut errors = ValidationErrors::new();
        for (name, value) in raw {
            let Some(kind) = self.fields.get(name) else {
                continue;
            };
            match coerce_field(*kind, value) {
                Ok(param) => {
                    validated.insert(name.clone(), param);
                }
                Err(message) => errors.push(name, message),
            }
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }

    /// Validate against this schema, falling back to `alternatives` in
    /// declared priority order.
    ///
    /// The first schema that validates wins. When every alternative fails, the
    /// error of the last attempted alternative is surfaced; the primary error
    /// only surfaces when there are no alternatives at all.
    pub fn validate_with_alternatives(
        &self,
        alternatives: &[FieldSchema],
        raw: &Map<String, Value>,
    ) -> Result<BTreeMap<String, ParamValue>, ValidationErrors> {
        let mut last = match self.validate(raw) {
            Ok(validated) => return Ok(validated),
            Err(errors) => errors,
        };
        for alternative in alternatives {
            match alternative.validate(raw) {
                Ok(validated) => return Ok(validated),
                Err(errors) => last = errors,
            }
        }
        Err(last)
    }
}

/// Coerce one supplied value per its declared kind.
pub(crate) fn coerce_field(kind: FieldKind, value: &Value) -> Result<ParamValue, String> {
    match kind {
        FieldKind::StringOrList => coerce_string_or_list(value).map(ParamValue::Strings),
        FieldKind::Choice(choices) => {
            let token = scalar_string(value)
                .ok_or_else(|| format!("\"{}\" is not a valid choice.", value))?;
            if choices.contains(&token.as_str()) {
                Ok(ParamValue::Token(token))
            } else {
                Err(format!("\"{}\" is not a valid choice.", token))
            }
        }
        FieldKind::Integer { min } => {
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse::<i64>().ok(),
                _ => None,
            };
            let n = parsed.ok_or_else(|| "A valid integer is required.".to_string())?;
            if n < min {
                Err(format!(
                    "Ensure this value is greater than or equal to {}.",
                    min
                ))
            } else {
                Ok(ParamValue::Int(n))
            }
        }
        FieldKind::Date => {
            let text = scalar_string(value).ok_or_else(date_format_error)?;
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(ParamValue::Date)
                .map_err(|_| date_format_error())
        }
    }
}

fn date_format_error() -> String {
    "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".to_string()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().expect("test payload is an object").clone()
    }

    #[test]
    fn test_build_synthesizes_operator_fields() {
        let schema = FieldSchema::build(
            &[("account", FieldKind::StringOrList)],
            &["account"],
            &[],
            FieldKind::StringOrList,
        );
        assert!(schema.declares("account"));
        assert!(schema.declares("and:account"));
        assert!(schema.declares("or:account"));
    }

    #[test]
    fn test_build_synthesizes_tag_fields() {
        let tags = vec!["tag:env".to_string(), "tag:app".to_string()];
        let schema = FieldSchema::build(&[], &[], &tags, FieldKind::StringOrList);
        assert!(schema.declares("tag:env"));
        assert!(schema.declares("tag:app"));

        let validated = schema
            .validate(&raw(json!({"tag:env": "prod,stage"})))
            .unwrap();
        assert_eq!(
            validated["tag:env"].as_strings().unwrap(),
            ["prod", "stage"]
        );
    }

    #[test]
    fn test_tag_fields_as_order_choices() {
        let tags = vec!["tag:env".to_string()];
        let schema = FieldSchema::build(&[], &[], &tags, FieldKind::Choice(&["asc", "desc"]));
        let validated = schema.validate(&raw(json!({"tag:env": "desc"}))).unwrap();
        assert_eq!(validated["tag:env"].as_token(), Some("desc"));
        assert!(schema.validate(&raw(json!({"tag:env": "sideways"}))).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_before_coercion() {
        let schema = FieldSchema::build(
            &[("limit", FieldKind::Integer { min: 1 })],
            &[],
            &[],
            FieldKind::StringOrList,
        );
        let err = schema
            .validate(&raw(json!({"bogus": "x", "limit": "not-a-number"})))
            .unwrap_err();
        assert!(err.contains("bogus"));
        // Unknown-field rejection short-circuits; limit coercion never ran.
        assert!(!err.contains("limit"));
    }

    #[test]
    fn test_integer_minimum_enforced() {
        let schema = FieldSchema::build(
            &[("limit", FieldKind::Integer { min: 1 })],
            &[],
            &[],
            FieldKind::StringOrList,
        );
        let err = schema.validate(&raw(json!({"limit": 0}))).unwrap_err();
        assert_eq!(
            err.messages("limit"),
            ["Ensure this value is greater than or equal to 1."]
        );
        let ok = schema.validate(&raw(json!({"limit": "5"}))).unwrap();
        assert_eq!(ok["limit"].as_int(), Some(5));
    }

    #[test]
    fn test_alternatives_first_success_wins() {
        let primary = FieldSchema::build(
            &[("resolution", FieldKind::StringOrList)],
            &[],
            &[],
            FieldKind::StringOrList,
        );
        let alt_a = FieldSchema::build(
            &[("project", FieldKind::StringOrList)],
            &[],
            &[],
            FieldKind::StringOrList,
        );
        let alt_b = FieldSchema::build(
            &[("project", FieldKind::StringOrList), ("cluster", FieldKind::StringOrList)],
            &[],
            &[],
            FieldKind::StringOrList,
        );

        let validated = primary
            .validate_with_alternatives(&[alt_a, alt_b], &raw(json!({"project": "billing"})))
            .unwrap();
        assert_eq!(validated["project"].as_strings().unwrap(), ["billing"]);
    }

    #[test]
    fn test_alternatives_surface_last_error() {
        let primary = FieldSchema::build(
            &[("resolution", FieldKind::StringOrList)],
            &[],
            &[],
            FieldKind::StringOrList,
        );
        let alt_a = FieldSchema::build(
            &[("account", FieldKind::StringOrList)],
            &[],
            &[],
            FieldKind::StringOrList,
        );
        let alt_b = FieldSchema::build(
            &[("cluster", FieldKind::StringOrList)],
            &[],
            &[],
            FieldKind::StringOrList,
        );

        // The last alternative declares "cluster" but its value is malformed,
        // so the surfaced error is the coercion failure from alt_b, not the
        // unknown-field error the primary and alt_a produced.
        let err = primary
            .validate_with_alternatives(
                &[alt_a, alt_b],
                &raw(json!({"cluster": {"nested": 1}})),
            )
            .unwrap_err();
        assert_eq!(
            err.messages("cluster"),
            ["Expected a string or a list of strings."]
        );

        // With no alternatives the primary error surfaces.
        let err = primary
            .validate_with_alternatives(&[], &raw(json!({"mystery": "x"})))
            .unwrap_err();
        assert!(err.contains("mystery"));
    }

    #[test]
    fn test_date_coercion() {
        let schema = FieldSchema::build(
            &[("start_date", FieldKind::Date)],
            &[],
            &[],
            FieldKind::StringOrList,
        );
        let ok = schema
            .validate(&raw(json!({"start_date": "2021-01-05"})))
            .unwrap();
        assert_eq!(
            ok["start_date"].as_date(),
            NaiveDate::from_ymd_opt(2021, 1, 5)
        );
        assert!(schema.validate(&raw(json!({"start_date": "01/05/2021"}))).is_err());
    }
}
