//! [DIF Presentation Exchange] constraint matching: whether a decoded
//! Credential's claims satisfy an `InputDescriptor`'s `Constraints`.
//!
//! Not invoked by §4.4's format/signature checks alone — those only
//! establish that a descriptor's sub-token cryptographically verifies.
//! This module supplies the remaining half of what a Presentation
//! Definition actually demands: that the *content* of the presented
//! Credential matches what was asked for. The VP verifiers call
//! `Constraints::satisfied` after a sub-token's signature checks out.
//!
//! Works directly on decoded `serde_json::Value` claims rather than a
//! generic `Claims` trait, since this crate only ever deals in JSON
//! claim sets.
//!
//! [DIF Presentation Exchange]: https://identity.foundation/presentation-exchange/spec/v2.0.0

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;
use serde_json_path::JsonPath;

use crate::domain::{Constraints, Field, FilterValue};
use crate::Error;

impl Constraints {
    /// Whether `claims` satisfies every (non-optional) field constraint.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidVPToken` if a field's `path` contains an
    /// invalid JSONPath expression, or a `pattern` filter's regex fails
    /// to compile.
    pub fn satisfied(&self, claims: &Value) -> Result<bool, Error> {
        let Some(fields) = &self.fields else {
            return Ok(true);
        };
        for field in fields {
            if !field.matched(claims)? && !field.optional.unwrap_or(false) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Field {
    /// Whether the first JSONPath in `self.path` that resolves against
    /// `claims` also satisfies `self.filter`, if any (PE 2.0.0: only one
    /// matching path is required).
    fn matched(&self, claims: &Value) -> Result<bool, Error> {
        for path in &self.path {
            let jpath = JsonPath::parse(path)
                .map_err(|e| Error::InvalidVPToken(format!("invalid JSONPath {path}: {e}")))?;
            let nodes = jpath.query(claims).all();
            if nodes.is_empty() {
                continue;
            }
            let Some(filter) = &self.filter else {
                return Ok(true);
            };
            if let Some(node) = nodes.into_iter().next() {
                if filter.value.matched(node)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl FilterValue {
    fn matched(&self, node: &Value) -> Result<bool, Error> {
        match self {
            Self::Const(expected) => Ok(match node {
                Value::String(s) => s == expected,
                Value::Array(items) => items.iter().any(|v| v.as_str() == Some(expected)),
                Value::Bool(b) => b.to_string() == *expected,
                Value::Number(n) => n.to_string() == *expected,
                Value::Null | Value::Object(_) => false,
            }),
            Self::Pattern(pattern) => {
                let re = Regex::new(pattern)
                    .map_err(|e| Error::InvalidVPToken(format!("invalid regex {pattern}: {e}")))?;
                let text = match node {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Ok(re.is_match(&text))
            }
            Self::Format(format) => match format.as_str() {
                "date" => Ok(matches!(node, Value::String(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())),
                "date-time" => Ok(matches!(node, Value::String(s) if DateTime::parse_from_rfc3339(s).is_ok())),
                other => Err(Error::InvalidVPToken(format!("unsupported filter format: {other}"))),
            },
        }
    }
}
