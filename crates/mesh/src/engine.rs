use crate::config::MeshConfig;
use crate::fragment::Fragment;
use crate::transport::{OutboundRequest, Transport};
use apisim_graph::{FunctionDefinition, FunctionTree, HttpCall};
use apisim_protocol::{
    RequestMeta, EXPLOIT_HEADER, FLAG_VALUE, FUNCTION_STACK_HEADER, NEIGHBOR_CONNECTIVITY_HEADER,
    NO_OPERATION_HEADER,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Leaf value rendered instead of dialing the evaluating node itself.
pub const NOP: &str = "NOP";
/// Ping answer for a target the caller declares a call to.
pub const EXPECTED: &str = "OK";
/// Ping answer for a target the caller can reach without declaring it.
pub const UNEXPECTED: &str = "VULN";

/// How one outbound call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Evaluate the target and splice its result. Carries the call stack
    /// and the exploit flag onward.
    Full,
    /// Reachability only; the target answers with an empty body.
    Ping,
    /// Ask the target to run its own connectivity sweep.
    NeighborProbe,
}

impl CallKind {
    pub fn timeout(self, config: &MeshConfig) -> std::time::Duration {
        match self {
            CallKind::Ping => config.base_timeout,
            CallKind::Full | CallKind::NeighborProbe => config.base_timeout * 4,
        }
    }

    pub fn headers(self, target: &HttpCall, meta: &RequestMeta) -> Vec<(String, String)> {
        match self {
            CallKind::Full => {
                let mut headers = Vec::with_capacity(meta.stack.len() + 2);
                if meta.forwards_exploit() {
                    headers.push((EXPLOIT_HEADER.to_string(), FLAG_VALUE.to_string()));
                }
                let stack = meta.stack.extended(target.to_string());
                headers.extend(
                    stack
                        .iter()
                        .map(|entry| (FUNCTION_STACK_HEADER.to_string(), entry.to_string())),
                );
                headers
            }
            CallKind::Ping => vec![(NO_OPERATION_HEADER.to_string(), FLAG_VALUE.to_string())],
            CallKind::NeighborProbe => vec![(
                NEIGHBOR_CONNECTIVITY_HEADER.to_string(),
                FLAG_VALUE.to_string(),
            )],
        }
    }
}

/// Evaluates function calls against a shared, immutable tree.
///
/// Cheap to clone; one engine serves every inbound request of a node.
#[derive(Clone)]
pub struct MeshEngine {
    pub(crate) tree: Arc<FunctionTree>,
    transport: Arc<dyn Transport>,
    config: MeshConfig,
}

impl MeshEngine {
    pub fn new(tree: Arc<FunctionTree>, transport: Arc<dyn Transport>, config: MeshConfig) -> Self {
        Self {
            tree,
            transport,
            config,
        }
    }

    pub fn tree(&self) -> &FunctionTree {
        &self.tree
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn request_for(&self, target: &HttpCall, meta: &RequestMeta, kind: CallKind) -> OutboundRequest {
        OutboundRequest {
            target: target.clone(),
            url: target.url(),
            headers: kind.headers(target, meta),
            timeout: kind.timeout(&self.config),
        }
    }

    /// Call every target concurrently and collect one fragment per call.
    ///
    /// A target equal to `own` yields a `"NOP"` leaf without dialing. A
    /// target already present in `meta.stack` is skipped and yields nothing.
    /// Every other target runs on its own task with its own timeout; a
    /// failure becomes an error leaf for that target only.
    ///
    /// Fragments come back in completion order, not in the order of
    /// `targets`. Each one is keyed by its target, so callers must not rely
    /// on position.
    pub async fn fan_out<'t>(
        &self,
        targets: impl IntoIterator<Item = &'t HttpCall>,
        own: &FunctionDefinition,
        meta: &RequestMeta,
        kind: CallKind,
    ) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        let mut pending = Vec::new();

        for target in targets {
            let canonical = target.to_string();
            if own.as_http() == Some(target) {
                fragments.push(Fragment::leaf(&canonical, NOP));
                continue;
            }
            if meta.stack.contains(&canonical) {
                log::debug!("Skipping {canonical}: already on the call stack");
                continue;
            }
            let declared = self
                .tree
                .is_caller(own, &FunctionDefinition::Http(target.clone()));
            pending.push((self.request_for(target, meta, kind), declared));
        }

        if pending.is_empty() {
            return fragments;
        }

        let (tx, mut rx) = mpsc::channel(pending.len());
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut tasks = JoinSet::new();

        for (request, declared) in pending {
            let transport = Arc::clone(&self.transport);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            tasks.spawn(async move {
                let key = request.target.to_string();
                let fragment = match permits.acquire_owned().await {
                    Ok(permit) => {
                        let fragment = dispatch(transport.as_ref(), request, kind, declared).await;
                        drop(permit);
                        fragment
                    }
                    Err(_) => Fragment::leaf(&key, "dispatch cancelled"),
                };
                // The buffer holds one slot per task, so this never waits.
                if tx.send(fragment).await.is_err() {
                    log::warn!("Result buffer closed before {key} finished");
                }
            });
        }
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                log::warn!("Fan-out task failed: {err}");
            }
        }
        while let Ok(fragment) = rx.try_recv() {
            fragments.push(fragment);
        }

        fragments
    }

    /// Invoke every HTTP function of the tree, as an attacker pivoting
    /// through the mesh from `own` would.
    pub async fn exploit(&self, own: &FunctionDefinition, meta: &RequestMeta) -> Vec<Fragment> {
        let targets = self.tree.all_http_calls();
        self.fan_out(targets, own, meta, CallKind::Full).await
    }

    /// Ping every HTTP function of the tree without evaluating it.
    pub async fn neighbor_connectivity(
        &self,
        own: &FunctionDefinition,
        meta: &RequestMeta,
    ) -> Vec<Fragment> {
        let targets = self.tree.all_http_calls();
        self.fan_out(targets, own, meta, CallKind::Ping).await
    }
}

async fn dispatch(
    transport: &dyn Transport,
    request: OutboundRequest,
    kind: CallKind,
    declared: bool,
) -> Fragment {
    let key = request.target.to_string();
    match transport.send(request).await {
        Err(err) => {
            log::debug!("{key} failed: {err}");
            Fragment::leaf(&key, &err.to_string())
        }
        Ok(_) if kind == CallKind::Ping => {
            Fragment::leaf(&key, if declared { EXPECTED } else { UNEXPECTED })
        }
        Ok(response) if !response.is_success() => {
            Fragment::leaf(&key, &format!("unexpected status {}", response.status))
        }
        Ok(response) => Fragment::embed(&key, &response.body),
    }
}
