use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::request::parse_http_request;
use super::router::{RenderedBody, RouteTable};

const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Methods",
        "GET, POST, PUT, PATCH, DELETE, OPTIONS",
    ),
    ("Access-Control-Allow-Headers", "*"),
    ("Access-Control-Allow-Credentials", "true"),
];

/// Upper bound for a request head, to keep a misbehaving client from growing the buffer.
const MAX_HEAD_BYTES: usize = 64 * 1024;
/// Largest request body the mock accepts; bigger declared lengths get a 413.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub fn reason_phrase(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

/// Serializes a complete HTTP/1.1 response. Declared headers win over defaults.
pub fn build_response(status: u16, declared: &[(&str, &str)], body: &RenderedBody) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason_phrase(status));
    let declares = |name: &str| declared.iter().any(|(k, _)| k.eq_ignore_ascii_case(name));

    for (name, value) in declared {
        if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection") {
            continue;
        }
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    for (name, value) in CORS_HEADERS {
        if !declares(name) {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
    }
    if let Some(content_type) = body.content_type {
        if !declares("content-type") {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
    }
    head.push_str(&format!("Content-Length: {}\r\n", body.bytes.len()));
    head.push_str("Connection: close\r\n\r\n");

    let mut out = head.into_bytes();
    out.extend_from_slice(&body.bytes);
    out
}

fn plain_text(status: u16, message: String) -> Vec<u8> {
    build_response(status, &[], &RenderedBody::from_value(&Value::String(message)))
}

enum Incoming {
    Closed,
    Request(Vec<u8>),
    TooLarge(usize),
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0)
}

async fn read_http_request<S>(stream: &mut S) -> io::Result<Incoming>
where
    S: AsyncRead + Unpin,
{
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];

    // Read until we find the header terminator.
    let header_end = loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(end) = data.windows(4).position(|window| window == b"\r\n\r\n") {
            break Some(end);
        }
        if data.len() > MAX_HEAD_BYTES {
            break None;
        }
    };
    if data.is_empty() {
        return Ok(Incoming::Closed);
    }

    if let Some(header_end) = header_end {
        let length = content_length(&data[..header_end]);
        if length > MAX_BODY_BYTES {
            return Ok(Incoming::TooLarge(length));
        }
        let received = data.len().saturating_sub(header_end + 4);
        if received < length {
            let remaining = (length - received) as u64;
            (&mut *stream).take(remaining).read_to_end(&mut data).await?;
        }
    }
    Ok(Incoming::Request(data))
}

/// Produces the response bytes for one raw request against a route snapshot.
pub fn respond(routes: &RouteTable, raw_request: &[u8]) -> Vec<u8> {
    let req = match parse_http_request(raw_request) {
        Ok(req) => req,
        Err(err) => {
            warn!(error = %err, "Rejecting malformed request");
            return plain_text(400, format!("Bad request: {err}"));
        }
    };

    match routes.find(&req.method, &req.path) {
        Ok(route) => {
            debug!(method = %req.method, path = %req.path, resource = %route.resource.name(), "Serving mock");
            let declared: Vec<(&str, &str)> = route
                .resource
                .headers()
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            build_response(route.resource.code(), &declared, &route.body)
        }
        // Permissive CORS preflight for easier testing from browsers.
        Err(_) if req.method == "OPTIONS" => {
            build_response(204, &[("Access-Control-Max-Age", "86400")], &RenderedBody::empty())
        }
        Err(not_found) => {
            debug!(method = %req.method, path = %req.path, "No matching resource");
            plain_text(404, not_found.to_string())
        }
    }
}

pub async fn handle_client(
    stream: TcpStream,
    routes: Arc<RouteTable>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    serve_connection(stream, routes, READ_TIMEOUT).await
}

/// Answers a single request on `stream`, giving the client `read_timeout` to send it.
pub(crate) async fn serve_connection<S>(
    mut stream: S,
    routes: Arc<RouteTable>,
    read_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = match tokio::time::timeout(read_timeout, read_http_request(&mut stream)).await {
        Err(_) => {
            warn!(?read_timeout, "Client did not send a complete request in time");
            plain_text(408, "Request timed out".to_string())
        }
        Ok(read) => match read? {
            Incoming::Closed => return Ok(()),
            Incoming::TooLarge(length) => {
                warn!(length, limit = MAX_BODY_BYTES, "Rejecting oversized request body");
                plain_text(
                    413,
                    format!("Request body of {length} bytes exceeds the {MAX_BODY_BYTES} byte limit"),
                )
            }
            Incoming::Request(data) => respond(&routes, &data),
        },
    };
    stream.write_all(&response).await?;
    stream.shutdown().await?;
    Ok(())
}
