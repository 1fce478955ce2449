//! Named JSON Schemas and their validation problems.
//!
//! Schemas come either inline from the configuration or from `<dir>/<name>.json`
//! files. They are compiled on first use and cached for the lifetime of the store,
//! which is rebuilt together with the resource set on reload.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::deep_equal::kind_of;
use super::problem::{pointer_to_path, Problem, ProblemType};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema '{name}' is not defined")]
    Unknown { name: String },

    #[error("Schema '{name}' could not be read from '{}': {source}", path.display())]
    Unreadable {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema '{name}' is not valid JSON: {message}")]
    Unparseable { name: String, message: String },

    #[error("Schema '{name}' could not be compiled: {message}")]
    Invalid { name: String, message: String },
}

pub struct CompiledSchema {
    document: Value,
    validator: Validator,
}

impl CompiledSchema {
    pub fn compile(name: &str, document: Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(&document).map_err(|e| SchemaError::Invalid {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(CompiledSchema {
            document,
            validator,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Validates `instance` and maps every validator error to one body problem.
    pub fn problems(&self, instance: &Value) -> Vec<Problem> {
        self.validator
            .iter_errors(instance)
            .map(|error| {
                let instance_pointer = error.instance_path().to_string();
                let schema_pointer = error.schema_path().to_string();
                let message = describe(
                    &self.document,
                    instance,
                    &instance_pointer,
                    &schema_pointer,
                    error.to_string(),
                );
                Problem::new(ProblemType::Body, pointer_to_path(&instance_pointer), message)
            })
            .collect()
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn expected_types(constraint: &Value) -> Option<String> {
    match constraint {
        Value::String(kind) => Some(format!("\"{kind}\"")),
        Value::Array(kinds) if !kinds.is_empty() => Some(
            kinds
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
        ),
        _ => None,
    }
}

/// Builds the message for one validator error. `enum` and `type` violations get
/// dedicated messages, everything else keeps the validator's wording.
fn describe(
    document: &Value,
    instance: &Value,
    instance_pointer: &str,
    schema_pointer: &str,
    fallback: String,
) -> String {
    let keyword = schema_pointer.rsplit('/').next().unwrap_or_default();
    let received = instance.pointer(instance_pointer);
    // The keyword location only points into the root document when no $ref was crossed.
    let constraint = document.pointer(schema_pointer);

    match (keyword, received) {
        ("enum", Some(received)) => match constraint {
            Some(allowed) => format!(
                "Value is not one of the allowed values.\nAllowed:\n{}\nReceived:\n{}",
                pretty(allowed),
                pretty(received)
            ),
            None => format!("{fallback}\nReceived:\n{}", pretty(received)),
        },
        ("type", Some(received)) => match constraint.and_then(expected_types) {
            Some(expected) => format!(
                "Expected type {expected} but received {}",
                kind_of(received)
            ),
            None => format!("{fallback} (received {})", kind_of(received)),
        },
        _ => fallback,
    }
}

/// Name → schema lookup with lazy loading from a directory.
pub struct SchemaStore {
    inline: BTreeMap<String, Value>,
    dir: Option<PathBuf>,
    compiled: Mutex<HashMap<String, Arc<CompiledSchema>>>,
}

impl SchemaStore {
    pub fn new(inline: BTreeMap<String, Value>, dir: Option<PathBuf>) -> Self {
        SchemaStore {
            inline,
            dir,
            compiled: Mutex::new(HashMap::new()),
        }
    }

    pub fn empty() -> Self {
        SchemaStore::new(BTreeMap::new(), None)
    }

    pub fn dir(&self) -> Option<&PathBuf> {
        self.dir.as_ref()
    }

    fn load_document(&self, name: &str) -> Result<Value, SchemaError> {
        if let Some(document) = self.inline.get(name) {
            return Ok(document.clone());
        }
        let Some(dir) = &self.dir else {
            return Err(SchemaError::Unknown {
                name: name.to_string(),
            });
        };

        let path = dir.join(format!("{name}.json"));
        debug!(path = %path.display(), "Loading schema");
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SchemaError::Unknown {
                    name: name.to_string(),
                }
            } else {
                SchemaError::Unreadable {
                    name: name.to_string(),
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        serde_json::from_str(&content).map_err(|e| SchemaError::Unparseable {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Result<Arc<CompiledSchema>, SchemaError> {
        if let Some(schema) = self
            .compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(schema));
        }

        // Compiled outside the lock; a concurrent duplicate compile is harmless.
        let schema = Arc::new(CompiledSchema::compile(name, self.load_document(name)?)?);
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&schema));
        Ok(schema)
    }
}

impl Default for SchemaStore {
    fn default() -> Self {
        SchemaStore::empty()
    }
}
