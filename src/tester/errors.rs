use std::{error::Error as _, time::Duration};

use thiserror::Error;

/// The HTTP exchange itself failed, so no comparison took place.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Formats an error with its whole source chain, since reqwest keeps the useful
/// detail (e.g. "Connection refused") in the sources.
pub fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl ExchangeError {
    pub fn from_send(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(timeout)
        } else if err.is_connect() {
            ExchangeError::Connect(error_chain(&err))
        } else {
            ExchangeError::Request(error_chain(&err))
        }
    }
}
