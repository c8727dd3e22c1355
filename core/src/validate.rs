//! Structural contract checks over a `NormalizedResponse`.
//!
//! # Design
//! Violations are data. `validate` runs every check and returns one
//! `Violation` per breach so a failing test reports everything that is wrong
//! with a response at once. Checks run in a fixed order: status, content
//! type, headers (by name), required keys (by name).
//!
//! An empty `acceptable_status_codes` set means the status is not checked.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::error::ValidationError;
use crate::http::NormalizedResponse;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationExpectation {
    acceptable_status_codes: BTreeSet<u16>,
    required_keys: BTreeSet<String>,
    header_expectations: BTreeMap<String, String>,
    content_type_substring: Option<String>,
}

impl ValidationExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept exactly one status code.
    pub fn status(code: u16) -> Self {
        Self::statuses([code])
    }

    /// Accept any status in `codes`, e.g. `[200, 400, 404]` for a store
    /// that signals business errors with an HTML page.
    pub fn statuses<I: IntoIterator<Item = u16>>(codes: I) -> Self {
        Self {
            acceptable_status_codes: codes.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn require_key(mut self, key: impl Into<String>) -> Self {
        self.required_keys.insert(key.into());
        self
    }

    pub fn require_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.required_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_expectations
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Require the content type to contain `fragment` (case-insensitive).
    pub fn content_type(mut self, fragment: impl Into<String>) -> Self {
        self.content_type_substring = Some(fragment.into());
        self
    }

    pub fn acceptable_status_codes(&self) -> &BTreeSet<u16> {
        &self.acceptable_status_codes
    }

    pub fn required_keys(&self) -> &BTreeSet<String> {
        &self.required_keys
    }
}

/// A single mismatch between an expectation and a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    StatusNotAccepted { actual: u16, accepted: Vec<u16> },
    ContentTypeMismatch { expected: String, actual: Option<String> },
    HeaderMismatch { name: String, expected: String, actual: Option<String> },
    MissingKey { key: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::StatusNotAccepted { actual, accepted } => {
                write!(f, "status {actual} not in accepted set {accepted:?}")
            }
            Violation::ContentTypeMismatch { expected, actual: Some(actual) } => {
                write!(f, "content type `{actual}` does not contain `{expected}`")
            }
            Violation::ContentTypeMismatch { expected, actual: None } => {
                write!(f, "content type missing, expected one containing `{expected}`")
            }
            Violation::HeaderMismatch { name, expected, actual: Some(actual) } => {
                write!(f, "header `{name}` is `{actual}`, expected `{expected}`")
            }
            Violation::HeaderMismatch { name, expected, actual: None } => {
                write!(f, "header `{name}` missing, expected `{expected}`")
            }
            Violation::MissingKey { key } => write!(f, "required key `{key}` missing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<Violation>),
}

/// Every violation of a failed validation, usable with `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} contract violation(s): {}", .0.len(), join(.0))]
pub struct ContractViolations(pub Vec<Violation>);

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(violations) => violations,
        }
    }

    pub fn into_result(self) -> Result<(), ContractViolations> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(violations) => Err(ContractViolations(violations)),
        }
    }
}

pub fn validate(
    response: &NormalizedResponse,
    expectation: &ValidationExpectation,
) -> Result<ValidationResult, ValidationError> {
    let mut violations = Vec::new();

    let accepted = &expectation.acceptable_status_codes;
    if !accepted.is_empty() && !accepted.contains(&response.status()) {
        violations.push(Violation::StatusNotAccepted {
            actual: response.status(),
            accepted: accepted.iter().copied().collect(),
        });
    }

    if let Some(expected) = &expectation.content_type_substring {
        let actual = response.content_type();
        let matches = actual.is_some_and(|ct| {
            ct.to_ascii_lowercase()
                .contains(&expected.to_ascii_lowercase())
        });
        if !matches {
            violations.push(Violation::ContentTypeMismatch {
                expected: expected.clone(),
                actual: actual.map(str::to_string),
            });
        }
    }

    for (name, expected) in &expectation.header_expectations {
        let actual = response.header(name);
        if actual != Some(expected.as_str()) {
            violations.push(Violation::HeaderMismatch {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.map(str::to_string),
            });
        }
    }

    if !expectation.required_keys.is_empty() {
        let body = response.json()?;
        for key in &expectation.required_keys {
            if !has_key(body, key) {
                violations.push(Violation::MissingKey { key: key.clone() });
            }
        }
    }

    if violations.is_empty() {
        Ok(ValidationResult::Valid)
    } else {
        Ok(ValidationResult::Invalid(violations))
    }
}

fn has_key(body: &Value, key: &str) -> bool {
    body.as_object().is_some_and(|object| object.contains_key(key))
}
