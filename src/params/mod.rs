//! Report query parameter validation pipeline.
//!
//! Raw HTTP query parameters arrive as loosely-typed JSON-ish maps. This module
//! validates and normalizes them into a [`ReportQuery`]: a strongly-typed query
//! specification ready for a downstream report builder. Validation is pure and
//! request-scoped; errors are collected into a field-path keyed mapping.

pub mod fields;
pub mod filter;
pub mod group;
pub mod order;
pub mod query;
pub mod schema;

pub use query::{ReportQuery, ReportQueryValidator};
pub use schema::{FieldKind, FieldSchema, ParamValue};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Message attached to every unrecognized parameter.
pub const UNSUPPORTED_PARAM: &str = "Unsupported parameter or invalid value";

/// Which report family a query is validated against.
///
/// The `All` scope accepts the union of provider-specific parameters by
/// falling back to each provider schema in declared order (see
/// [`FieldSchema::validate_with_alternatives`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    All,
    Aws,
    Ocp,
}

impl FromStr for ReportScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ReportScope::All),
            "aws" => Ok(ReportScope::Aws),
            "ocp" => Ok(ReportScope::Ocp),
            other => Err(format!("unknown report scope: {}", other)),
        }
    }
}

impl fmt::Display for ReportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportScope::All => write!(f, "all"),
            ReportScope::Aws => write!(f, "aws"),
            ReportScope::Ocp => write!(f, "ocp"),
        }
    }
}

/// Field-path keyed validation errors.
///
/// Keys are dotted paths (`filter.resolution`); cross-group violations use the
/// reserved key `error`. Serializes as a plain map of message lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Re-key every error under `prefix.` for surfacing sub-group errors.
    pub fn prefixed(self, prefix: &str) -> Self {
        let errors = self
            .errors
            .into_iter()
            .map(|(field, messages)| (format!("{}.{}", prefix, field), messages))
            .collect();
        Self { errors }
    }

    pub fn merge(&mut self, other: Self) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
