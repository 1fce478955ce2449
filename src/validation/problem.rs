use std::fmt;

use serde::Serialize;

/// Path used for the top level of a compared structure.
pub const ROOT: &str = "<root>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemType {
    Body,
    Header,
    StatusCode,
    /// The named schema could not be loaded or compiled.
    Schema,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProblemType::Body => "BODY",
            ProblemType::Header => "HEADER",
            ProblemType::StatusCode => "STATUS_CODE",
            ProblemType::Schema => "SCHEMA",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub problem_type: ProblemType,
    pub path: String,
    pub message: String,
}

impl Problem {
    pub fn new(problem_type: ProblemType, path: impl Into<String>, message: impl Into<String>) -> Self {
        Problem {
            problem_type,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.problem_type, self.path, self.message)
    }
}

/// Outcome of comparing one response to one expectation.
///
/// Only constructible from a problem list, so `success` is always
/// `problems.is_empty()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    success: bool,
    problems: Vec<Problem>,
}

impl ValidationResult {
    pub fn from_problems(problems: Vec<Problem>) -> Self {
        ValidationResult {
            success: problems.is_empty(),
            problems,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

/// Appends `key` to a dot-delimited path.
pub fn child_path(parent: &str, key: impl fmt::Display) -> String {
    format!("{parent}.{key}")
}

/// Converts a JSON pointer (`/items/0/name`) into a dot path (`<root>.items.0.name`).
pub fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
        .fold(ROOT.to_string(), |path, seg| child_path(&path, seg))
}
