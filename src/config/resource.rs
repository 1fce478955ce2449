use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::debug;

use super::{errors::ConfigError, raw::RawResource, resolver::resolve_path};

pub const WILDCARD: &str = "*";

/// How the body of an actual response is checked.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyExpectation {
    /// Deep equality against a literal value.
    Literal(Value),
    /// Validation against the named JSON Schema.
    Schema(String),
}

/// What the mock server returns as the body.
#[derive(Debug, Clone, PartialEq)]
pub enum ServeBody {
    Empty,
    Literal(Value),
    Fixture(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    serve_only: bool,
    method: String,
    test_endpoints: Vec<String>,
    serve_endpoint: Option<String>,
    request_headers: BTreeMap<String, String>,
    request_body: Option<Value>,
    code: u16,
    headers: BTreeMap<String, String>,
    body: Option<BodyExpectation>,
    serve_body: ServeBody,
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn check_endpoint(name: &str, endpoint: &str, allow_wildcard: bool) -> Result<(), ConfigError> {
    if !endpoint.starts_with('/') {
        return Err(ConfigError::invalid(
            name,
            format!("endpoint '{endpoint}' must start with '/'"),
        ));
    }
    if endpoint.contains('?') {
        return Err(ConfigError::invalid(
            name,
            format!("endpoint pattern '{endpoint}' must not contain a query string"),
        ));
    }
    if !allow_wildcard && endpoint.split('/').any(|seg| seg == WILDCARD) {
        return Err(ConfigError::invalid(
            name,
            format!("test endpoint '{endpoint}' must be a concrete path, found a '*' segment"),
        ));
    }
    Ok(())
}

impl Resource {
    /// Validates a raw configuration record and builds the immutable resource.
    /// `base_dir` is the directory of the file that declared the record.
    pub fn from_raw(raw: RawResource, base_dir: &Path) -> Result<Resource, ConfigError> {
        let RawResource {
            name,
            serve_only,
            request,
            response,
        } = raw;
        debug!(%name, "Building resource");

        let method = request.method.trim().to_ascii_uppercase();
        if method.is_empty() || !method.chars().all(is_token_char) {
            return Err(ConfigError::invalid(
                &name,
                format!("'{}' is not a valid HTTP method", request.method),
            ));
        }

        if !(100..=599).contains(&response.code) {
            return Err(ConfigError::invalid(
                &name,
                format!("{} is not a valid HTTP status code", response.code),
            ));
        }

        if serve_only {
            if request.endpoints.is_empty() && request.serve_endpoint.is_none() {
                return Err(ConfigError::invalid(
                    &name,
                    "a serve-only resource needs a serve endpoint or at least one endpoint",
                ));
            }
        } else if request.endpoints.is_empty() {
            return Err(ConfigError::invalid(
                &name,
                "at least one test endpoint is required",
            ));
        }
        for endpoint in &request.endpoints {
            check_endpoint(&name, endpoint, serve_only)?;
        }
        if let Some(pattern) = &request.serve_endpoint {
            check_endpoint(&name, pattern, true)?;
        }

        let body = match (response.body, response.schema_type) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    &name,
                    "'body' and 'type' are mutually exclusive",
                ))
            }
            (Some(literal), None) => Some(BodyExpectation::Literal(literal)),
            (None, Some(schema)) if schema.trim().is_empty() => {
                return Err(ConfigError::invalid(&name, "'type' must not be empty"))
            }
            (None, Some(schema)) => Some(BodyExpectation::Schema(schema)),
            (None, None) => None,
        };

        let serve_body = match (response.serve_body, response.serve_body_path) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    &name,
                    "'serveBody' and 'serveBodyPath' are mutually exclusive",
                ))
            }
            (Some(literal), None) => ServeBody::Literal(literal),
            (None, Some(path)) => ServeBody::Fixture(resolve_path(&path, base_dir)),
            (None, None) => ServeBody::Empty,
        };

        Ok(Resource {
            name,
            serve_only,
            method,
            test_endpoints: request.endpoints,
            serve_endpoint: request.serve_endpoint,
            request_headers: request.headers,
            request_body: request.body,
            code: response.code,
            headers: response.headers,
            body,
            serve_body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serve_only(&self) -> bool {
        self.serve_only
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn test_endpoints(&self) -> &[String] {
        &self.test_endpoints
    }

    pub fn serve_endpoint(&self) -> Option<&str> {
        self.serve_endpoint.as_deref()
    }

    /// Patterns this resource is served under: the serve endpoint, or every test endpoint.
    pub fn serve_patterns(&self) -> Vec<&str> {
        match &self.serve_endpoint {
            Some(pattern) => vec![pattern.as_str()],
            None => self.test_endpoints.iter().map(String::as_str).collect(),
        }
    }

    pub fn request_headers(&self) -> &BTreeMap<String, String> {
        &self.request_headers
    }

    pub fn request_body(&self) -> Option<&Value> {
        self.request_body.as_ref()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&BodyExpectation> {
        self.body.as_ref()
    }

    pub fn serve_body(&self) -> &ServeBody {
        &self.serve_body
    }
}

/// Builds a resource from a JSON record, for tests across the crate.
#[cfg(test)]
pub(crate) fn resource_from_json(record: Value) -> Resource {
    let raw: RawResource = serde_json::from_value(record).unwrap();
    Resource::from_raw(raw, Path::new(".")).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::raw::{RawRequest, RawResponse};
    use serde_json::json;

    fn raw(name: &str) -> RawResource {
        RawResource {
            name: name.to_string(),
            serve_only: false,
            request: RawRequest {
                method: "get".to_string(),
                endpoints: vec!["/api/books/1".to_string()],
                serve_endpoint: None,
                headers: BTreeMap::new(),
                body: None,
            },
            response: RawResponse {
                code: 200,
                headers: BTreeMap::new(),
                body: None,
                schema_type: None,
                serve_body: None,
                serve_body_path: None,
            },
        }
    }

    fn reason(err: ConfigError) -> String {
        match err {
            ConfigError::InvalidResource { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn normalizes_method_and_falls_back_to_test_endpoints() {
        let resource = Resource::from_raw(raw("books"), Path::new(".")).unwrap();
        assert_eq!(resource.method(), "GET");
        assert_eq!(resource.serve_patterns(), vec!["/api/books/1"]);
        assert_eq!(resource.serve_body(), &ServeBody::Empty);
        assert!(resource.body().is_none());
    }

    #[test]
    fn rejects_body_and_type_together() {
        let mut r = raw("both");
        r.response.body = Some(json!({"a": 1}));
        r.response.schema_type = Some("Book".into());
        let err = Resource::from_raw(r, Path::new(".")).unwrap_err();
        assert!(reason(err).contains("mutually exclusive"));
    }

    #[test]
    fn rejects_serve_body_and_serve_body_path_together() {
        let mut r = raw("both");
        r.response.serve_body = Some(json!({}));
        r.response.serve_body_path = Some("book.json".into());
        let err = Resource::from_raw(r, Path::new(".")).unwrap_err();
        assert!(reason(err).contains("serveBodyPath"));
    }

    #[test]
    fn requires_test_endpoints_unless_serve_only() {
        let mut r = raw("empty");
        r.request.endpoints.clear();
        assert!(Resource::from_raw(r.clone(), Path::new(".")).is_err());

        r.serve_only = true;
        assert!(Resource::from_raw(r.clone(), Path::new(".")).is_err());

        r.request.serve_endpoint = Some("/api/books/*".into());
        let resource = Resource::from_raw(r, Path::new(".")).unwrap();
        assert_eq!(resource.serve_patterns(), vec!["/api/books/*"]);
    }

    #[test]
    fn rejects_wildcards_in_test_endpoints() {
        let mut r = raw("wild");
        r.request.endpoints = vec!["/api/books/*".into()];
        assert!(Resource::from_raw(r.clone(), Path::new(".")).is_err());

        r.serve_only = true;
        assert!(Resource::from_raw(r, Path::new(".")).is_ok());
    }

    #[test]
    fn rejects_invalid_status_and_method() {
        let mut r = raw("bad code");
        r.response.code = 42;
        assert!(reason(Resource::from_raw(r, Path::new(".")).unwrap_err()).contains("status"));

        let mut r = raw("bad method");
        r.request.method = "GE T".into();
        assert!(reason(Resource::from_raw(r, Path::new(".")).unwrap_err()).contains("method"));
    }

    #[test]
    fn fixture_paths_resolve_against_declaring_file() {
        let mut r = raw("fixture");
        r.response.serve_body_path = Some("fixtures/book.json".into());
        let resource = Resource::from_raw(r, Path::new("/srv/config")).unwrap();
        assert_eq!(
            resource.serve_body(),
            &ServeBody::Fixture(PathBuf::from("/srv/config/fixtures/book.json"))
        );
    }

    #[test]
    fn explicit_null_body_is_a_literal_expectation() {
        let record = |response: Value| {
            resource_from_json(json!({
                "name": "No content",
                "request": { "method": "DELETE", "endpoints": ["/api/books/1"] },
                "response": response
            }))
        };
        let null_body = record(json!({ "code": 204, "body": null }));
        assert_eq!(null_body.body(), Some(&BodyExpectation::Literal(Value::Null)));

        let unchecked = record(json!({ "code": 204 }));
        assert!(unchecked.body().is_none());

        let yaml: RawResource = serde_yaml::from_str(
            "name: yaml\nrequest: { method: GET, endpoints: [/a] }\nresponse: { code: 200, body: ~ }\n",
        )
        .unwrap();
        assert_eq!(yaml.response.body, Some(Value::Null));
    }
}
