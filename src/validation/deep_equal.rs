use std::collections::BTreeSet;

use serde_json::Value;

use super::problem::{child_path, Problem, ProblemType, ROOT};

/// Name of the JSON kind of a value, as reported in problem messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn mismatch(path: &str, expected: &Value, actual: &Value, problems: &mut Vec<Problem>) {
    problems.push(Problem::new(
        ProblemType::Body,
        path,
        format!("Expected {expected} but received {actual}"),
    ));
}

fn diff_at(expected: &Value, actual: &Value, path: &str, problems: &mut Vec<Problem>) {
    match (expected, actual) {
        (Value::Object(exp), Value::Object(act)) => {
            let keys: BTreeSet<&String> = exp.keys().chain(act.keys()).collect();
            for key in keys {
                let key_path = child_path(path, key);
                match (exp.get(key), act.get(key)) {
                    (Some(e), Some(a)) => diff_at(e, a, &key_path, problems),
                    (Some(e), None) => problems.push(Problem::new(
                        ProblemType::Body,
                        key_path,
                        format!("Expected property \"{key}\" with value {e} but it is missing"),
                    )),
                    (None, Some(a)) => problems.push(Problem::new(
                        ProblemType::Body,
                        key_path,
                        format!("Unexpected property \"{key}\" with value {a}"),
                    )),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(exp), Value::Array(act)) => {
            if exp.len() != act.len() {
                problems.push(Problem::new(
                    ProblemType::Body,
                    path,
                    format!(
                        "Expected {} items but received {}",
                        exp.len(),
                        act.len()
                    ),
                ));
            }
            for (idx, (e, a)) in exp.iter().zip(act.iter()).enumerate() {
                diff_at(e, a, &child_path(path, idx), problems);
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            if !numbers_equal(e, a) {
                mismatch(path, expected, actual, problems);
            }
        }
        (e, a) if kind_of(e) != kind_of(a) => problems.push(Problem::new(
            ProblemType::Body,
            path,
            format!(
                "Expected {} {e} but received {} {a}",
                kind_of(e),
                kind_of(a)
            ),
        )),
        (e, a) => {
            if e != a {
                mismatch(path, expected, actual, problems);
            }
        }
    }
}

/// Recursively compares two values and returns one problem per differing leaf.
pub fn diff_values(expected: &Value, actual: &Value) -> Vec<Problem> {
    let mut problems = Vec::new();
    diff_at(expected, actual, ROOT, &mut problems);
    problems
}

pub fn is_deeply_equal(a: &Value, b: &Value) -> bool {
    diff_values(a, b).is_empty()
}
