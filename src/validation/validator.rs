use std::{collections::HashMap, sync::Arc};

use serde_json::Value;

use crate::config::resource::{BodyExpectation, Resource};

use super::{
    deep_equal::diff_values,
    problem::{Problem, ProblemType, ValidationResult, ROOT},
    schema::SchemaStore,
};

/// A response received from the server under test.
#[derive(Debug, Clone)]
pub struct ActualResponse {
    pub status: u16,
    /// Header names are stored lower-cased; repeated headers keep every value in order.
    pub headers: HashMap<String, Vec<String>>,
    pub body: Value,
}

impl ActualResponse {
    pub fn new(status: u16, headers: impl IntoIterator<Item = (String, String)>, body: Value) -> Self {
        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            grouped.entry(name.to_ascii_lowercase()).or_default().push(value);
        }
        ActualResponse {
            status,
            headers: grouped,
            body,
        }
    }

    /// Parses a raw body: JSON when possible, otherwise the text itself. Empty is `null`.
    pub fn parse_body(text: &str) -> Value {
        if text.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    }

    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All values of a header joined with ", ", as a single header line would carry them.
    pub fn header(&self, name: &str) -> Option<String> {
        let values = self.header_values(name);
        (!values.is_empty()).then(|| values.join(", "))
    }
}

#[derive(Clone)]
pub struct ResponseValidator {
    schemas: Arc<SchemaStore>,
}

impl ResponseValidator {
    pub fn new(schemas: Arc<SchemaStore>) -> Self {
        ResponseValidator { schemas }
    }

    pub fn validate(&self, resource: &Resource, actual: &ActualResponse) -> ValidationResult {
        let mut problems = check_status(resource, actual);
        problems.extend(check_headers(resource, actual));
        problems.extend(self.check_body(resource, actual));
        ValidationResult::from_problems(problems)
    }

    fn check_body(&self, resource: &Resource, actual: &ActualResponse) -> Vec<Problem> {
        match resource.body() {
            None => Vec::new(),
            Some(BodyExpectation::Literal(expected)) => diff_values(expected, &actual.body),
            Some(BodyExpectation::Schema(name)) => match self.schemas.get(name) {
                Ok(schema) => schema.problems(&actual.body),
                Err(err) => vec![Problem::new(ProblemType::Schema, ROOT, err.to_string())],
            },
        }
    }
}

fn check_status(resource: &Resource, actual: &ActualResponse) -> Vec<Problem> {
    if resource.code() == actual.status {
        return Vec::new();
    }
    vec![Problem::new(
        ProblemType::StatusCode,
        ROOT,
        format!(
            "Expected status code {} but received {}",
            resource.code(),
            actual.status
        ),
    )]
}

fn check_headers(resource: &Resource, actual: &ActualResponse) -> Vec<Problem> {
    resource
        .headers()
        .iter()
        .filter_map(|(name, expected)| {
            let values = actual.header_values(name);
            if values.is_empty() {
                return Some(Problem::new(
                    ProblemType::Header,
                    name.as_str(),
                    format!("Expected header \"{name}\" with value \"{expected}\" but it is missing"),
                ));
            }
            let joined = values.join(", ");
            if values.iter().any(|value| value == expected) || joined == *expected {
                return None;
            }
            Some(Problem::new(
                ProblemType::Header,
                name.as_str(),
                format!("Expected \"{expected}\" but received \"{joined}\""),
            ))
        })
        .collect()
}
