use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{
    resolver::load_fixture,
    resource::{Resource, ServeBody, WILDCARD},
};
use crate::metrics::report_metric;

#[derive(Debug, Error, PartialEq)]
#[error("No mock configured for {method} {path}")]
pub struct NotFoundError {
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// A path template where a `*` segment matches any single non-empty segment.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl EndpointPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .map(|seg| {
                if seg == WILDCARD {
                    Segment::Wildcard
                } else {
                    Segment::Literal(seg.to_string())
                }
            })
            .collect();
        EndpointPattern {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut path_segments = path.split('/');
        for segment in &self.segments {
            let Some(actual) = path_segments.next() else {
                return false;
            };
            let ok = match segment {
                Segment::Wildcard => !actual.is_empty(),
                Segment::Literal(expected) => expected == actual,
            };
            if !ok {
                return false;
            }
        }
        path_segments.next().is_none()
    }
}

pub fn matches(pattern: &str, path: &str) -> bool {
    EndpointPattern::parse(pattern).matches(path)
}

/// Body bytes rendered once when the table is built.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBody {
    pub content_type: Option<&'static str>,
    pub bytes: Vec<u8>,
}

impl RenderedBody {
    pub fn empty() -> Self {
        RenderedBody {
            content_type: None,
            bytes: Vec::new(),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(text) => RenderedBody {
                content_type: Some("text/plain; charset=utf-8"),
                bytes: text.clone().into_bytes(),
            },
            other => RenderedBody {
                content_type: Some("application/json"),
                bytes: other.to_string().into_bytes(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub method: String,
    pub pattern: EndpointPattern,
    pub resource: Arc<Resource>,
    pub body: Arc<RenderedBody>,
}

/// Immutable route snapshot. Registration order decides which route serves a request.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

fn render_serve_body(resource: &Resource) -> Option<RenderedBody> {
    match resource.serve_body() {
        ServeBody::Empty => Some(RenderedBody::empty()),
        ServeBody::Literal(value) => Some(RenderedBody::from_value(value)),
        ServeBody::Fixture(path) => match load_fixture(path) {
            Ok(value) => Some(RenderedBody::from_value(&value)),
            Err(err) => {
                error!(resource = %resource.name(), error = %err, "Fixture load failed, resource will not be served");
                None
            }
        },
    }
}

impl RouteTable {
    /// Builds the table from resources in configuration order. `base_url` is only
    /// used for the registration log lines.
    pub fn build(resources: &[Arc<Resource>], base_url: &str) -> RouteTable {
        let mut routes: Vec<Route> = Vec::new();

        for resource in resources {
            let Some(body) = render_serve_body(resource) else {
                continue;
            };
            let body = Arc::new(body);

            for pattern in resource.serve_patterns() {
                let metric = report_metric(format!("register {} {}", resource.method(), pattern));
                let pattern = EndpointPattern::parse(pattern);

                if let Some(existing) = routes
                    .iter()
                    .find(|r| r.method == resource.method() && r.pattern == pattern)
                {
                    warn!(
                        method = %resource.method(),
                        pattern = %pattern.as_str(),
                        registered_by = %existing.resource.name(),
                        shadowed = %resource.name(),
                        "Route collision, the later resource is unreachable"
                    );
                    metric.fail();
                    continue;
                }

                info!(
                    "Registered {}{} from config: {}",
                    base_url,
                    pattern.as_str(),
                    resource.name()
                );
                routes.push(Route {
                    method: resource.method().to_string(),
                    pattern,
                    resource: Arc::clone(resource),
                    body: Arc::clone(&body),
                });
                metric.success();
            }
        }

        RouteTable { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn find(&self, method: &str, path: &str) -> Result<&Route, NotFoundError> {
        self.routes
            .iter()
            .filter(|route| route.method.eq_ignore_ascii_case(method))
            .find(|route| route.pattern.matches(path))
            .ok_or_else(|| NotFoundError {
                method: method.to_string(),
                path: path.to_string(),
            })
    }
}

/// Shared handle to the live route table. Readers take a snapshot; a reload swaps
/// in a complete new table.
#[derive(Clone, Default)]
pub struct SharedRoutes {
    current: Arc<RwLock<Arc<RouteTable>>>,
}

impl SharedRoutes {
    pub fn new(table: RouteTable) -> Self {
        SharedRoutes {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    pub fn snapshot(&self) -> Arc<RouteTable> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn replace(&self, table: RouteTable) {
        let table = Arc::new(table);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = table;
    }
}
