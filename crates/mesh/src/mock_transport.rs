//! In-process transports for tests.
//!
//! [`MockTransport`] answers from a table of canned replies.
//! [`LoopbackTransport`] answers by running a [`MeshEngine`] for the target
//! node over the same tree, so a whole mesh can be traversed without sockets.

use crate::config::MeshConfig;
use crate::engine::MeshEngine;
use crate::error::TransportError;
use crate::transport::{OutboundRequest, OutboundResponse, Transport};
use apisim_graph::{FunctionTree, HttpCall};
use apisim_protocol::RequestMeta;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Canned behaviour for one target.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond 200 with this body.
    Body(String),
    /// Respond with this status and an empty body.
    Status(u16),
    /// Fail without responding.
    Fail(TransportError),
    /// Wait, then behave like the inner reply. Subject to the request timeout.
    Delayed(Duration, Box<MockReply>),
}

/// Records every request and answers from a per-target table.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: HashMap<HttpCall, MockReply>,
    fallback: Option<MockReply>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, target: HttpCall, reply: MockReply) -> Self {
        self.replies.insert(target, reply);
        self
    }

    /// Reply used for targets without an entry. Without one, such targets
    /// fail to connect.
    pub fn otherwise(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Requests seen so far, in the order they were sent.
    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    async fn play(mut reply: MockReply) -> Result<OutboundResponse, TransportError> {
        loop {
            match reply {
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                MockReply::Body(body) => return Ok(OutboundResponse { status: 200, body }),
                MockReply::Status(status) => {
                    return Ok(OutboundResponse {
                        status,
                        body: String::new(),
                    })
                }
                MockReply::Fail(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(request.clone());
        }

        let reply = self
            .replies
            .get(&request.target)
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or_else(|| {
                MockReply::Fail(TransportError::Connect {
                    url: request.url.clone(),
                    message: "connection refused".to_string(),
                })
            });

        tokio::time::timeout(request.timeout, Self::play(reply))
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::Timeout {
                    url: request.url.clone(),
                    timeout: request.timeout,
                })
            })
    }
}

/// Delivers each request to an engine acting as the target node.
pub struct LoopbackTransport {
    tree: Arc<FunctionTree>,
    config: MeshConfig,
    this: Weak<LoopbackTransport>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl LoopbackTransport {
    pub fn new(tree: Arc<FunctionTree>, config: MeshConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            tree,
            config,
            this: this.clone(),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Engine for a node of this mesh.
    pub fn engine(self: &Arc<Self>) -> MeshEngine {
        let transport: Arc<dyn Transport> = Arc::clone(self) as Arc<dyn Transport>;
        MeshEngine::new(Arc::clone(&self.tree), transport, self.config)
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(request.clone());
        }
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| TransportError::Other("loopback transport dropped".to_string()))?;

        let meta = RequestMeta::from_header_pairs(
            request
                .headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        let target = &request.target;
        let host = format!("{}:{}", target.host, target.port);
        let body = this
            .engine()
            .handle(target.method.as_str(), &host, &target.path, &meta)
            .await
            .unwrap_or_default();

        Ok(OutboundResponse { status: 200, body })
    }
}
