use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A resource violates one of the construction invariants.
    #[error("Invalid resource '{name}': {reason}")]
    InvalidResource { name: String, reason: String },

    #[error("Reference cycle detected at '{}'", path.display())]
    ReferenceCycle { path: PathBuf },
}

impl ConfigError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidResource {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure to load a `serveBodyPath` fixture. Only the owning resource stops serving.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Fixture '{}' is unreadable: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fixture '{}' is not parseable: {message}", path.display())]
    Unparseable { path: PathBuf, message: String },
}
