use crate::engine::{CallKind, MeshEngine};
use crate::fragment::Fragment;
use apisim_graph::{FunctionDefinition, TreeError};
use apisim_protocol::{Intent, RequestMeta};
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const NOT_FOUND: &str = "Function not found";

impl MeshEngine {
    /// Render one call made by `own`.
    ///
    /// `None` means the call was skipped: an HTTP target already on the call
    /// stack, or a reference already being expanded further up this branch.
    pub fn evaluate<'a>(
        &'a self,
        def: &'a FunctionDefinition,
        own: &'a FunctionDefinition,
        meta: &'a RequestMeta,
    ) -> BoxFuture<'a, Option<Fragment>> {
        self.evaluate_within(def, own, meta, Vec::new())
    }

    /// `trail` holds the references expanded between the top-level call and
    /// `def`. Sibling branches get their own copy.
    fn evaluate_within<'a>(
        &'a self,
        def: &'a FunctionDefinition,
        own: &'a FunctionDefinition,
        meta: &'a RequestMeta,
        mut trail: Vec<&'a FunctionDefinition>,
    ) -> BoxFuture<'a, Option<Fragment>> {
        Box::pin(async move {
            match def {
                FunctionDefinition::Literal { data } => Some(Fragment::leaf("DATA", data)),
                FunctionDefinition::Reference { .. } => {
                    if trail.contains(&def) {
                        log::debug!("Skipping {def}: already expanded on this branch");
                        return None;
                    }
                    let key = def.to_string();
                    let Some(calls) = self.tree.calls(def) else {
                        return Some(Fragment::node(&key, &[Fragment::text(NOT_FOUND)]));
                    };
                    trail.push(def);
                    let mut children = Vec::with_capacity(calls.len());
                    for call in calls {
                        if let Some(fragment) =
                            self.evaluate_within(call, own, meta, trail.clone()).await
                        {
                            children.push(fragment);
                        }
                    }
                    Some(Fragment::node(&key, &children))
                }
                FunctionDefinition::Http(call) => self
                    .fan_out(std::iter::once(call), own, meta, CallKind::Full)
                    .await
                    .into_iter()
                    .next(),
            }
        })
    }

    /// Render the local (literal and reference) calls, left to right.
    pub async fn render_local(
        &self,
        own: &FunctionDefinition,
        calls: &[FunctionDefinition],
        meta: &RequestMeta,
    ) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        for call in calls.iter().filter(|call| call.as_http().is_none()) {
            if let Some(fragment) = self.evaluate(call, own, meta).await {
                fragments.push(fragment);
            }
        }
        fragments
    }

    /// Render a whole call list: HTTP calls concurrently, then local calls
    /// in declared order.
    pub async fn render_calls(
        &self,
        own: &FunctionDefinition,
        calls: &[FunctionDefinition],
        meta: &RequestMeta,
    ) -> Vec<Fragment> {
        let http = calls.iter().filter_map(FunctionDefinition::as_http);
        let mut fragments = self.fan_out(http, own, meta, CallKind::Full).await;
        fragments.extend(self.render_local(own, calls, meta).await);
        fragments
    }

    /// Find the function a node serves for `method` on `host` + `path`.
    ///
    /// Falls back to the host-less key (`"<method> :<port><path>"`) so one
    /// configuration can describe functions without naming the node.
    pub fn resolve(
        &self,
        method: &str,
        host: &str,
        path: &str,
    ) -> Result<(&FunctionDefinition, &[FunctionDefinition]), TreeError> {
        let key = format!("{method} {host}{path}");
        match self.tree.lookup(&key) {
            Err(TreeError::NotFound(_)) => {
                let port = host
                    .rsplit_once(':')
                    .and_then(|(_, port)| port.parse::<u16>().ok())
                    .unwrap_or_else(|| self.tree.default_port());
                let fallback = format!("{method} :{port}{path}");
                if fallback == key {
                    return Err(TreeError::NotFound(key));
                }
                self.tree
                    .lookup(&fallback)
                    .map_err(|_| TreeError::NotFound(key))
            }
            other => other,
        }
    }

    /// Produce the response body for an inbound request.
    ///
    /// Returns `None` for no-op probes, which are answered with an empty
    /// body. Otherwise the body is `{"<METHOD> RESP <host><path>": [...]}`.
    pub async fn handle(
        &self,
        method: &str,
        host: &str,
        path: &str,
        meta: &RequestMeta,
    ) -> Option<String> {
        let fragments = match (meta.intent, self.resolve(method, host, path)) {
            (Intent::NoOperation, _) => return None,
            (_, Err(err)) => {
                log::info!("{method} {host}{path}: {err}");
                vec![Fragment::text(&err.to_string())]
            }
            (Intent::NeighborConnectivity, Ok((def, _))) => {
                log::info!("Function {def} neighbor connectivity");
                self.neighbor_connectivity(def, meta).await
            }
            (Intent::Exploit, Ok((def, calls))) => {
                log::info!("Function {def} being exploited");
                let mut fragments = self.exploit(def, meta).await;
                fragments.extend(self.render_local(def, calls, meta).await);
                fragments
            }
            (Intent::Evaluate, Ok((def, calls))) => {
                log::info!("Function {def} calls: {}", calls.len());
                self.render_calls(def, calls, meta).await
            }
        };

        Some(Fragment::node(&format!("{method} RESP {host}{path}"), &fragments).into_string())
    }
}
