use std::{collections::BTreeMap, path::PathBuf};

use serde_json::Value;

use super::raw::RawResource;

/// A raw resource together with the directory of the file that declared it.
/// Fixture paths are resolved against `base_dir`.
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    pub raw: RawResource,
    pub base_dir: PathBuf,
}

#[derive(Debug)]
pub struct ResolvedConfig {
    pub host: String,
    pub port: u16,
    pub schemas: BTreeMap<String, Value>,
    pub schemas_dir: Option<PathBuf>,
    pub resources: Vec<ResolvedResource>,
    /// Every file read while resolving, config file first.
    pub sources: Vec<PathBuf>,
}
