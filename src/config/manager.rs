use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use tracing::info;

use super::compiled::{compile_config, CompiledConfig};
use super::errors::ConfigError;
use super::resolver::load_resolved_config;
use super::resource::ServeBody;
use crate::http::router::{RouteTable, SharedRoutes};
use crate::metrics::report_metric;

/// Owns the live configuration of a serving process and rebuilds it on demand.
#[derive(Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    root_folder: PathBuf,
    base_url: String,
    host: String,
    port: u16,
    routes: SharedRoutes,
    current: Arc<RwLock<Arc<CompiledConfig>>>,
    reload_lock: Arc<Mutex<()>>,
}

impl ConfigManager {
    /// Initial load + compile. `host`/`port` override the values from the file.
    pub fn new(
        config_path: PathBuf,
        host: Option<String>,
        port: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let root_folder = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let compiled = compile_config(load_resolved_config(&config_path)?)?;
        let host = host.unwrap_or_else(|| compiled.host.clone());
        let port = port.unwrap_or(compiled.port);
        let base_url = format!("http://{host}:{port}");

        let routes = SharedRoutes::new(RouteTable::build(&compiled.resources, &base_url));

        Ok(ConfigManager {
            config_path,
            root_folder,
            base_url,
            host,
            port,
            routes,
            current: Arc::new(RwLock::new(Arc::new(compiled))),
            reload_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Rebuilds resources and routes from disk and swaps them in. On error the
    /// previous table stays active.
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let _serialized = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let metric = report_metric("reload configuration");

        let compiled = match load_resolved_config(&self.config_path).and_then(compile_config) {
            Ok(compiled) => compiled,
            Err(err) => {
                metric.fail();
                return Err(err);
            }
        };
        let table = RouteTable::build(&compiled.resources, &self.base_url);
        let route_count = table.len();

        self.routes.replace(table);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(compiled);
        metric.success();
        info!(routes = route_count, "Configuration reloaded");
        Ok(route_count)
    }

    pub fn routes_handle(&self) -> SharedRoutes {
        self.routes.clone()
    }

    pub fn current(&self) -> Arc<CompiledConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Files and folders whose changes should trigger a reload.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        let current = self.current();
        let mut paths = vec![self.root_folder.clone()];
        let outside_root = |p: &Path| !p.starts_with(&self.root_folder);

        for source in &current.sources {
            if outside_root(source) {
                paths.push(source.clone());
            }
        }
        if let Some(dir) = current.schemas.dir() {
            if outside_root(dir) {
                paths.push(dir.clone());
            }
        }
        for resource in &current.resources {
            if let ServeBody::Fixture(path) = resource.serve_body() {
                if outside_root(path) {
                    paths.push(path.clone());
                }
            }
        }
        paths.sort();
        paths.dedup();
        paths
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn root_folder(&self) -> &PathBuf {
        &self.root_folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(path: &Path, body: &str) {
        fs::write(
            path,
            format!(
                r#"{{ "resources": [ {{ "name": "greeting",
                    "request": {{ "method": "GET", "endpoints": ["/greeting"] }},
                    "response": {{ "code": 200, "serveBody": {body} }} }} ] }}"#
            ),
        )
        .unwrap();
    }

    #[test]
    fn failed_reload_keeps_previous_routes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, r#""hello""#);
        let manager = ConfigManager::new(path.clone(), None, Some(0)).unwrap();
        let routes = manager.routes_handle();
        assert_eq!(routes.snapshot().len(), 1);

        fs::write(&path, "{ not json").unwrap();
        assert!(manager.reload().is_err());
        let route = routes.snapshot();
        assert_eq!(route.find("GET", "/greeting").unwrap().body.bytes, b"hello");

        write_config(&path, r#""bonjour""#);
        assert_eq!(manager.reload().unwrap(), 1);
        let route = routes.snapshot();
        assert_eq!(route.find("GET", "/greeting").unwrap().body.bytes, b"bonjour");
    }

    #[test]
    fn overrides_host_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        write_config(&path, "null");
        let manager = ConfigManager::new(path, Some("0.0.0.0".into()), Some(4000)).unwrap();
        assert_eq!(manager.address(), "0.0.0.0:4000");
        assert_eq!(manager.base_url(), "http://0.0.0.0:4000");
        assert_eq!(manager.watch_paths(), vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn watch_paths_follow_the_reloaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let fixture = outside.path().join("greeting.json");
        fs::write(&fixture, r#"{"greeting": "hola"}"#).unwrap();

        let path = dir.path().join("config.json");
        write_config(&path, r#""hello""#);
        let manager = ConfigManager::new(path.clone(), None, Some(0)).unwrap();
        assert_eq!(manager.watch_paths(), vec![dir.path().to_path_buf()]);

        fs::write(
            &path,
            format!(
                r#"{{ "resources": [ {{ "name": "greeting",
                    "request": {{ "method": "GET", "endpoints": ["/greeting"] }},
                    "response": {{ "code": 200, "serveBodyPath": {} }} }} ] }}"#,
                serde_json::to_string(&fixture).unwrap()
            ),
        )
        .unwrap();
        manager.reload().unwrap();
        assert!(manager.watch_paths().contains(&fixture));
    }
}
