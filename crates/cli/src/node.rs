use anyhow::{Context as AnyhowContext, Result};
use apisim_mesh::MeshEngine;
use apisim_protocol::RequestMeta;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Response, StatusCode, Uri},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared state of one node server.
pub struct NodeState {
    pub engine: MeshEngine,
    /// `<name>:<port>` when the node was started with `--name`.
    pub host: Option<String>,
}

impl NodeState {
    pub fn new(engine: MeshEngine, name: Option<&str>, port: u16) -> Self {
        Self {
            engine,
            host: name.map(|name| format!("{name}:{port}")),
        }
    }
}

/// Every method and path goes to the same handler.
pub fn router(state: Arc<NodeState>) -> Router {
    Router::new().fallback(handle).with_state(state)
}

async fn handle(
    State(state): State<Arc<NodeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response<Body> {
    let host = state
        .host
        .clone()
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let meta = RequestMeta::from_header_pairs(headers.iter().filter_map(|(name, value)| {
        value.to_str().ok().map(|value| (name.as_str(), value))
    }));
    log::debug!(
        "{method} {host}{} intent={} stack={}",
        uri.path(),
        meta.intent.as_str(),
        meta.stack.len()
    );

    let body = state
        .engine
        .handle(method.as_str(), &host, uri.path(), &meta)
        .await;

    let builder = Response::builder().status(StatusCode::OK);
    let response = match body {
        None => builder.body(Body::empty()),
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body)),
    };
    response.unwrap_or_else(|err| {
        log::error!("Failed to build response: {err}");
        let mut fallback = Response::new(Body::empty());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr().context("Failed to read listener address")?;
    log::info!("Listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;
    log::info!("Shut down {addr}");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("Unable to listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down...");
}
