use std::time::Duration;
use thiserror::Error;

/// Why an outbound call produced no usable response.
///
/// Never propagated past a single branch: the engine renders it as an error
/// leaf in place of the call's result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} timed out after {}ms", timeout.as_millis())]
    Timeout { url: String, timeout: Duration },

    #[error("unable to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{0}")]
    Other(String),
}
