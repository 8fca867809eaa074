//! Top-level report query validation.
//!
//! Composes the filter, group-by, and order-by groups with the date-range
//! fields and enforces the cross-group rules: order-by must match group-by,
//! and explicit date ranges are mutually exclusive with the deprecated
//! relative time scope.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dates::{previous_month_start, DateReference};

use super::fields::reject_unknown_fields;
use super::schema::{coerce_field, FieldKind, FieldSchema, ParamValue};
use super::{filter, group, order, ReportScope, ValidationErrors};

const DECLARED_FIELDS: &[&str] = &[
    "filter",
    "group_by",
    "order_by",
    "start_date",
    "end_date",
    "limit",
    "offset",
];

/// Order-by keys that never require a matching group-by.
const ORDER_BY_ALLOWLIST: &[&str] = &[
    "cost",
    "supplementary",
    "infrastructure",
    "delta",
    "usage",
    "request",
    "limit",
    "capacity",
];

/// A validated, normalized report query specification.
///
/// This is the contract consumed by downstream report builders; group values
/// are normalized maps because tag and operator fields are dynamic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub filter: BTreeMap<String, ParamValue>,
    pub group_by: BTreeMap<String, ParamValue>,
    pub order_by: BTreeMap<String, ParamValue>,
}

/// Validates one incoming report query for a scope and tenant tag-key set.
///
/// Stateless per request: `validate` is a pure function of the payload, the
/// tag keys, and the injected date reference.
pub struct ReportQueryValidator {
    scope: ReportScope,
    tag_keys: Vec<String>,
    dates: Arc<dyn DateReference>,
}

impl ReportQueryValidator {
    /// `tag_keys` must already carry their `tag:` prefix; the caller looks
    /// them up for the current tenant.
    pub fn new(scope: ReportScope, tag_keys: Vec<String>, dates: Arc<dyn DateReference>) -> Self {
        ReportQueryValidator {
            scope,
            tag_keys,
            dates,
        }
    }

    pub fn validate(&self, payload: &Value) -> Result<ReportQuery, ValidationErrors> {
        let map = payload.as_object().ok_or_else(|| {
            ValidationErrors::single("error", "Expected a mapping of query parameters.")
        })?;

        reject_unknown_fields(
            DECLARED_FIELDS.iter().copied(),
            map.keys().map(String::as_str),
        )?;

        let mut errors = ValidationErrors::new();

        let limit = self.integer_field(map, "limit", &mut errors);
        let offset = self.integer_field(map, "offset", &mut errors);
        let start_date = self.date_field(map, "start_date", &mut errors);
        let end_date = self.date_field(map, "end_date", &mut errors);

        let filter_values = self.validate_group(
            map,
            "filter",
            filter::schema_for(self.scope, &self.tag_keys),
            filter::alternatives_for(self.scope, &self.tag_keys),
            &mut errors,
        );
        if let Err(scope_errors) = filter::validate_time_scope(&filter_values) {
            errors.merge(scope_errors.prefixed("filter"));
        }

        let group_by_values = self.validate_group(
            map,
            "group_by",
            group::schema_for(self.scope, &self.tag_keys),
            group::alternatives_for(self.scope, &self.tag_keys),
            &mut errors,
        );
        let order_by_values = self.validate_group(
            map,
            "order_by",
            order::schema_for(self.scope, &self.tag_keys),
            order::alternatives_for(self.scope, &self.tag_keys),
            &mut errors,
        );

        if !errors.is_empty() {
            return Err(errors);
        }

        validate_order_by(&order_by_values, &group_by_values)?;

        let has_date_bound = start_date.is_some() || end_date.is_some();
        let has_time_scope = filter_values.contains_key("time_scope_value")
            || filter_values.contains_key("time_scope_units");
        if has_date_bound && has_time_scope {
            return Err(ValidationErrors::single(
                "error",
                "The parameters [start_date, end_date] may not be used with the \
                 filters [time_scope_value, time_scope_units].",
            ));
        }

        if start_date.is_some() != end_date.is_some() {
            return Err(ValidationErrors::single(
                "error",
                "The parameters [start_date, end_date] must both be defined.",
            ));
        }

        if let (Some(start), Some(end)) = (start_date, end_date) {
            if start > end {
                return Err(ValidationErrors::single(
                    "error",
                    "start_date must be a date that is before end_date.",
                ));
            }
        }

        Ok(ReportQuery {
            start_date,
            end_date,
            limit,
            offset,
            filter: filter_values,
            group_by: group_by_values,
            order_by: order_by_values,
        })
    }

    fn integer_field(
        &self,
        map: &Map<String, Value>,
        name: &str,
        errors: &mut ValidationErrors,
    ) -> Option<i64> {
        let value = map.get(name)?;
        match coerce_field(FieldKind::Integer { min: i64::MIN }, value) {
            Ok(param) => param.as_int(),
            Err(message) => {
                errors.push(name, message);
                None
            }
        }
    }

    /// Parse an ISO date field and enforce the permitted reporting window:
    /// [first day of the previous month, today].
    fn date_field(
        &self,
        map: &Map<String, Value>,
        name: &str,
        errors: &mut ValidationErrors,
    ) -> Option<NaiveDate> {
        let value = map.get(name)?;
        let date = match coerce_field(FieldKind::Date, value) {
            Ok(param) => param.as_date()?,
            Err(message) => {
                errors.push(name, message);
                return None;
            }
        };

        let today = self.dates.today();
        let window_start = previous_month_start(today);
        if date < window_start || date > today {
            errors.push(
                name,
                format!(
                    "Parameter {} must be from {} to {}",
                    name, window_start, today
                ),
            );
            return None;
        }
        Some(date)
    }

    fn validate_group(
        &self,
        map: &Map<String, Value>,
        name: &str,
        schema: FieldSchema,
        alternatives: Vec<FieldSchema>,
        errors: &mut ValidationErrors,
    ) -> BTreeMap<String, ParamValue> {
        let raw = match map.get(name) {
            None => return BTreeMap::new(),
            Some(Value::Object(raw)) => raw,
            Some(_) => {
                errors.push(name, "Expected an object of parameters.");
                return BTreeMap::new();
            }
        };
        match schema.validate_with_alternatives(&alternatives, raw) {
            Ok(validated) => validated,
            Err(group_errors) => {
                errors.merge(group_errors.prefixed(name));
                BTreeMap::new()
            }
        }
    }
}

/// Every order-by key must either be allow-listed or have a matching
/// group-by key.
fn validate_order_by(
    order_by: &BTreeMap<String, ParamValue>,
    group_by: &BTreeMap<String, ParamValue>,
) -> Result<(), ValidationErrors> {
    for key in order_by.keys() {
        if ORDER_BY_ALLOWLIST.contains(&key.as_str()) {
            continue;
        }

        // Ordering by an "or" group is undefined.
        if key.starts_with("or:") {
            return Err(ValidationErrors::single(
                format!("order_by.{}", key),
                format!("The order_by key \"{}\" can not contain the or parameter.", key),
            ));
        }

        let or_keys: Vec<&str> = group_by
            .keys()
            .filter_map(|name| name.strip_prefix("or:"))
            .collect();

        if group_by.contains_key(key) || or_keys.contains(&key.as_str()) {
            continue;
        }

        // Known denormalization: ordering by account_alias is backed by a
        // group-by on account.
        if key == "account_alias"
            && (group_by.contains_key("account") || or_keys.contains(&"account"))
        {
            continue;
        }

        return Err(ValidationErrors::single(
            format!("order_by.{}", key),
            format!("Order-by \"{}\" requires matching Group-by.", key),
        ));
    }
    Ok(())
}
