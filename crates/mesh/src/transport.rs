use crate::error::TransportError;
use apisim_graph::{HttpCall, Method};
use async_trait::async_trait;
use std::time::Duration;

/// One outbound call, fully prepared by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub target: HttpCall,
    pub url: String,
    /// Sent in order; repeated names become repeated header values.
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
}

impl OutboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries requests between nodes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`, honouring its timeout.
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError>;
}

/// Real HTTP, one shared connection pool per process.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        // Nodes are dialed directly, never through a system proxy.
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|err| TransportError::Other(format!("unable to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
    }
}

fn classify(url: &str, timeout: Duration, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else if err.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            message: err.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        let OutboundRequest {
            target,
            url,
            headers,
            timeout,
        } = request;

        let mut builder = self
            .client
            .request(reqwest_method(target.method), &url)
            .timeout(timeout);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        log::debug!("{} {} (timeout {}ms)", target.method, url, timeout.as_millis());
        let response = builder
            .send()
            .await
            .map_err(|err| classify(&url, timeout, err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| classify(&url, timeout, err))?;

        Ok(OutboundResponse { status, body })
    }
}
