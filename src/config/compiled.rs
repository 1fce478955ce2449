use std::{collections::HashSet, path::PathBuf, sync::Arc};

use tracing::debug;

use crate::validation::SchemaStore;

use super::{errors::ConfigError, resolved::ResolvedConfig, resource::Resource};

/// A fully validated configuration, ready for serving or testing.
pub struct CompiledConfig {
    pub host: String,
    pub port: u16,
    pub resources: Vec<Arc<Resource>>,
    pub schemas: Arc<SchemaStore>,
    pub sources: Vec<PathBuf>,
}

impl CompiledConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn testable(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.iter().filter(|r| !r.serve_only())
    }
}

pub fn compile_config(resolved: ResolvedConfig) -> Result<CompiledConfig, ConfigError> {
    let mut seen = HashSet::new();
    let mut resources = Vec::with_capacity(resolved.resources.len());
    for entry in resolved.resources {
        let resource = Resource::from_raw(entry.raw, &entry.base_dir)?;
        if !seen.insert(resource.name().to_string()) {
            debug!(name = %resource.name(), "Resource name is not unique, reports may be ambiguous");
        }
        resources.push(Arc::new(resource));
    }

    Ok(CompiledConfig {
        host: resolved.host,
        port: resolved.port,
        resources,
        schemas: Arc::new(SchemaStore::new(resolved.schemas, resolved.schemas_dir)),
        sources: resolved.sources,
    })
}
