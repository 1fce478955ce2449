use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::{
    errors::{ConfigError, FixtureError},
    raw::{RawConfig, RawReferencedResources, RawResourceEntry},
    resolved::{ResolvedConfig, ResolvedResource},
};

pub fn get_config_path_cwd(config_arg: &Path) -> PathBuf {
    if config_arg.is_absolute() {
        return config_arg.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(config_arg),
        Err(_) => config_arg.to_path_buf(),
    }
}

/// Resolves a reference (fref, fixture, schema dir) relative to the provided base directory.
pub fn resolve_path(reference: &str, base: &Path) -> PathBuf {
    let ref_path = Path::new(reference.trim());
    if ref_path.is_absolute() {
        ref_path.to_path_buf()
    } else {
        base.join(ref_path)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parses a document as YAML or JSON depending on the file extension.
pub fn parse_document<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, ConfigError> {
    let parsed = if is_yaml(path) {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

pub fn load_config(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = read_file(path)?;
    parse_document(path, &content)
}

fn inline_entries(
    entries: Vec<RawResourceEntry>,
    base_dir: &Path,
    stack: &mut Vec<PathBuf>,
    sources: &mut Vec<PathBuf>,
    out: &mut Vec<ResolvedResource>,
) -> Result<(), ConfigError> {
    for entry in entries {
        match entry {
            RawResourceEntry::Inline(raw) => out.push(ResolvedResource {
                raw,
                base_dir: base_dir.to_path_buf(),
            }),
            RawResourceEntry::Reference { fref } => {
                let ref_path = resolve_path(&fref, base_dir);
                if stack.contains(&ref_path) {
                    return Err(ConfigError::ReferenceCycle { path: ref_path });
                }
                debug!(path = %ref_path.display(), "Inlining referenced resources");

                let content = read_file(&ref_path)?;
                let referenced: RawReferencedResources = parse_document(&ref_path, &content)?;
                sources.push(ref_path.clone());

                // Nested references resolve relative to the referenced file.
                let new_base = ref_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base_dir.to_path_buf());
                stack.push(ref_path);
                inline_entries(referenced.into_entries(), &new_base, stack, sources, out)?;
                stack.pop();
            }
        }
    }
    Ok(())
}

/// Inlines external references throughout the configuration.
pub fn resolve_config_references(
    config: RawConfig,
    config_path: &Path,
) -> Result<ResolvedConfig, ConfigError> {
    let root_folder = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut sources = vec![config_path.to_path_buf()];
    let mut stack = vec![config_path.to_path_buf()];
    let mut resources = Vec::new();
    inline_entries(
        config.resources,
        &root_folder,
        &mut stack,
        &mut sources,
        &mut resources,
    )?;

    Ok(ResolvedConfig {
        host: config.host,
        port: config.port,
        schemas: config.schemas,
        schemas_dir: config.schemas_dir.map(|dir| resolve_path(&dir, &root_folder)),
        resources,
        sources,
    })
}

/// Loads and resolves a configuration file in one step.
pub fn load_resolved_config(config_path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let raw = load_config(config_path)?;
    resolve_config_references(raw, config_path)
}

/// Loads a `serveBodyPath` fixture. JSON and YAML files are parsed, anything else is
/// served verbatim as a string.
pub fn load_fixture(path: &Path) -> Result<Value, FixtureError> {
    let content = fs::read_to_string(path).map_err(|e| FixtureError::Unreadable {
        path: path.to_path_buf(),
        source: e,
    })?;

    let unparseable = |message: String| FixtureError::Unparseable {
        path: path.to_path_buf(),
        message,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| unparseable(e.to_string())),
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|e| unparseable(e.to_string()))
        }
        _ => Ok(Value::String(content)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_nested_references_relative_to_their_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("books")).unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{ "port": 9000, "resources": [ { "fref": "books/index.yaml" } ] }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("books/index.yaml"),
            "- fref: single.json\n- name: List books\n  request:\n    method: GET\n    endpoints: [/api/books]\n  response:\n    code: 200\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("books/single.json"),
            r#"{ "name": "Get book", "request": { "method": "GET", "endpoints": ["/api/books/1"] }, "response": { "code": 200 } }"#,
        )
        .unwrap();

        let resolved = load_resolved_config(&dir.path().join("config.json")).unwrap();
        assert_eq!(resolved.port, 9000);
        assert_eq!(resolved.host, "127.0.0.1");
        let names: Vec<_> = resolved.resources.iter().map(|r| r.raw.name.as_str()).collect();
        assert_eq!(names, vec!["Get book", "List books"]);
        assert_eq!(resolved.resources[0].base_dir, dir.path().join("books"));
        assert_eq!(resolved.sources.len(), 3);
    }

    #[test]
    fn detects_reference_cycles() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{ "resources": [ { "fref": "a.json" } ] }"#,
        )
        .unwrap();
        fs::write(dir.path().join("a.json"), r#"[ { "fref": "a.json" } ]"#).unwrap();

        let err = load_resolved_config(&dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReferenceCycle { .. }));
    }

    #[test]
    fn missing_config_is_reported_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn fixtures_are_parsed_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), r#"{"x": 1}"#).unwrap();
        fs::write(dir.path().join("b.txt"), "plain").unwrap();
        fs::write(dir.path().join("c.json"), "{broken").unwrap();

        assert_eq!(
            load_fixture(&dir.path().join("a.json")).unwrap(),
            serde_json::json!({"x": 1})
        );
        assert_eq!(
            load_fixture(&dir.path().join("b.txt")).unwrap(),
            Value::String("plain".into())
        );
        assert!(matches!(
            load_fixture(&dir.path().join("c.json")),
            Err(FixtureError::Unparseable { .. })
        ));
        assert!(matches!(
            load_fixture(&dir.path().join("missing.json")),
            Err(FixtureError::Unreadable { .. })
        ));
    }
}
