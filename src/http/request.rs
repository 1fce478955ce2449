use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Empty request")]
    Empty,
    #[error("Malformed request line '{0}'")]
    MalformedRequestLine(String),
}

/// The parts of a request that select a mock: its method and path.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    /// Path without the query string.
    pub path: String,
}

pub fn parse_http_request(buffer: &[u8]) -> Result<Request, RequestError> {
    let request_str = String::from_utf8_lossy(buffer);
    if request_str.trim().is_empty() {
        return Err(RequestError::Empty);
    }

    // Request line, e.g. "GET /path?query=val HTTP/1.1"
    let request_line = request_str.lines().next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) if target.starts_with('/') => (method, target),
        _ => {
            return Err(RequestError::MalformedRequestLine(
                request_line.to_string(),
            ))
        }
    };

    let path = target.split_once('?').map_or(target, |(path, _)| path);
    debug!(%method, %path, "Parsed request");

    Ok(Request {
        method: method.to_ascii_uppercase(),
        path: path.to_string(),
    })
}
