//! Status server: asks every node of the mesh to run its connectivity sweep.

use apisim_graph::{FunctionDefinition, HttpCall};
use apisim_mesh::{join, CallKind, Fragment, MeshEngine};
use apisim_protocol::RequestMeta;
use axum::{
    body::Body,
    extract::State,
    http::{header, Response, StatusCode},
    Router,
};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Name the status server uses as its own identity in the mesh.
pub const STATUS_NAME: &str = "status";

pub fn router(engine: Arc<MeshEngine>) -> Router {
    Router::new().fallback(handle).with_state(engine)
}

async fn handle(State(engine): State<Arc<MeshEngine>>) -> Response<Body> {
    log::info!("Status requested");
    let body = sweep(&engine).await;
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|err| {
            log::error!("Failed to build response: {err}");
            let mut fallback = Response::new(Body::empty());
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

/// One probe per served host:port, aimed at the first function it serves.
pub fn probe_targets(engine: &MeshEngine) -> Vec<(String, HttpCall)> {
    let mut targets = Vec::new();
    for (host, ports) in engine.tree().external_call_graph() {
        for (port, endpoints) in ports {
            let Some(endpoint) = endpoints.keys().next() else {
                continue;
            };
            targets.push((
                format!("{host}:{port}"),
                HttpCall {
                    method: endpoint.method,
                    host: host.clone(),
                    port,
                    path: endpoint.path.clone(),
                },
            ));
        }
    }
    targets
}

/// Probe every node concurrently and render `[{"<host>:<port>": [...]}, ...]`
/// in host order.
pub async fn sweep(engine: &MeshEngine) -> String {
    let targets = probe_targets(engine);
    let mut tasks = JoinSet::new();
    for (index, (label, target)) in targets.into_iter().enumerate() {
        let engine = engine.clone();
        tasks.spawn(async move {
            let own = FunctionDefinition::Literal {
                data: STATUS_NAME.to_string(),
            };
            let meta = RequestMeta::default();
            let children = engine
                .fan_out(std::iter::once(&target), &own, &meta, CallKind::NeighborProbe)
                .await;
            (index, Fragment::node(&label, &children))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(err) => log::warn!("Status probe failed: {err}"),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    let fragments: Vec<Fragment> = results.into_iter().map(|(_, fragment)| fragment).collect();

    format!("[{}]", join(&fragments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apisim_graph::TreeLoader;
    use apisim_mesh::mock_transport::{MockReply, MockTransport};
    use apisim_mesh::{MeshConfig, Transport};
    use std::time::Duration;

    fn engine(transport: Arc<dyn Transport>) -> MeshEngine {
        let tree = TreeLoader::new(8080)
            .load_str(
                "defs.json",
                r#"{"Functions": {
                    "GET a:8080/x": ["GET b:9000/y"],
                    "GET a:8080/w": [],
                    "GET b:9000/y": []
                }}"#,
            )
            .unwrap();
        MeshEngine::new(
            Arc::new(tree),
            transport,
            MeshConfig::with_timeout(Duration::from_millis(50)),
        )
    }

    #[test]
    fn one_probe_per_host_port() {
        let engine = engine(Arc::new(MockTransport::new()));
        let targets: Vec<String> = probe_targets(&engine)
            .into_iter()
            .map(|(label, target)| format!("{label} {target}"))
            .collect();
        assert_eq!(
            targets,
            vec!["a:8080 GET a:8080/w".to_string(), "b:9000 GET b:9000/y".to_string()]
        );
    }

    #[tokio::test]
    async fn sweep_renders_bodies_and_errors() {
        let probe = HttpCall::parse(apisim_graph::Method::Get, "a:8080/w", 8080).unwrap();
        let transport = Arc::new(
            MockTransport::new().reply(probe, MockReply::Body(r#"{"GET RESP a:8080/w":[]}"#.into())),
        );
        let engine = engine(transport.clone());

        let body = sweep(&engine).await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0]["a:8080"][0]["GET a:8080/w"],
            serde_json::json!({"GET RESP a:8080/w": []})
        );
        let failure = items[1]["b:9000"][0]["GET b:9000/y"].as_str().unwrap();
        assert!(failure.contains("unable to connect"), "{failure}");

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|request| request
            .headers
            .iter()
            .any(|(name, _)| name == apisim_protocol::NEIGHBOR_CONNECTIVITY_HEADER)));
    }
}
