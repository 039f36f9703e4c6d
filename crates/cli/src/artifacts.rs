//! Kubernetes manifests and L7 policies derived from the external call graph.
//!
//! Functions defined without a host have no pod to describe and are skipped.

use anyhow::{Context as AnyhowContext, Result};
use apisim_graph::{FunctionDefinition, FunctionTree};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Label every generated object selects on.
pub const APP_LABEL: &str = "apisim";
/// Container image the replication controllers run.
pub const IMAGE: &str = "apisim";
const STATUS_HOST: &str = crate::status::STATUS_NAME;

/// One generated document and the file it goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub kind: &'static str,
    pub document: Value,
}

fn port_name(port: u16) -> String {
    format!("apisim-{port}")
}

fn served_hosts(tree: &FunctionTree) -> Vec<(String, Vec<u16>)> {
    tree.external_call_graph()
        .into_iter()
        .filter_map(|(host, ports)| {
            if host.is_empty() {
                log::warn!("Skipping functions defined without a host");
                return None;
            }
            Some((host, ports.into_keys().collect()))
        })
        .collect()
}

/// `<host>_rc.spec` and `<host>_svc.spec` for every served host.
pub fn k8s_specs(tree: &FunctionTree) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    for (host, ports) in served_hosts(tree) {
        // A node server listens on a single port, so each port gets its own
        // container.
        let containers: Vec<Value> = ports
            .iter()
            .map(|port| {
                json!({
                    "name": format!("{host}-{port}"),
                    "image": IMAGE,
                    "command": [
                        "apisim", "node-server", "--name", host, "--port", port.to_string()
                    ],
                    "ports": [{"containerPort": port, "name": port_name(*port)}],
                })
            })
            .collect();
        let service_ports: Vec<Value> = ports
            .iter()
            .map(|port| json!({"port": port, "targetPort": port_name(*port)}))
            .collect();

        artifacts.push(Artifact {
            file_name: format!("{host}_rc.spec"),
            kind: "ReplicationController",
            document: json!({
                "apiVersion": "v1",
                "kind": "ReplicationController",
                "metadata": {"name": host, "labels": {APP_LABEL: host}},
                "spec": {
                    "replicas": 1,
                    "selector": {APP_LABEL: host},
                    "template": {
                        "metadata": {"labels": {APP_LABEL: host}},
                        "spec": {"containers": containers}
                    }
                }
            }),
        });
        artifacts.push(Artifact {
            file_name: format!("{host}_svc.spec"),
            kind: "Service",
            document: json!({
                "apiVersion": "v1",
                "kind": "Service",
                "metadata": {"name": host, "labels": {APP_LABEL: host}},
                "spec": {
                    "selector": {APP_LABEL: host},
                    "ports": service_ports,
                }
            }),
        });
    }
    artifacts
}

/// `<host>_netpolicy.spec`: ingress from the status server and from every
/// host that declares a call into this one.
pub fn net_policies(tree: &FunctionTree) -> Vec<Artifact> {
    served_hosts(tree)
        .into_iter()
        .map(|(host, ports)| {
            let mut peers = BTreeSet::new();
            for port in ports {
                peers.extend(
                    tree.caller_hosts(&host, port)
                        .into_iter()
                        .filter(|caller| !caller.is_empty()),
                );
            }
            let from: Vec<Value> = std::iter::once(STATUS_HOST)
                .chain(peers.into_iter().filter(|peer| *peer != STATUS_HOST))
                .map(|peer| json!({"podSelector": {"matchLabels": {APP_LABEL: peer}}}))
                .collect();

            Artifact {
                file_name: format!("{host}_netpolicy.spec"),
                kind: "NetworkPolicy",
                document: json!({
                    "apiVersion": "networking.k8s.io/v1",
                    "kind": "NetworkPolicy",
                    "metadata": {"name": host},
                    "spec": {
                        "podSelector": {"matchLabels": {APP_LABEL: host}},
                        "ingress": [{"from": from}],
                    }
                }),
            }
        })
        .collect()
}

/// `<host>_<port>_l7policy.spec`: the HTTP calls the functions served at
/// host:port are allowed to make.
pub fn l7_policies(tree: &FunctionTree) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    for (host, ports) in tree.external_call_graph() {
        if host.is_empty() {
            continue;
        }
        for (port, endpoints) in ports {
            let rules: BTreeSet<(&str, &str)> = endpoints
                .values()
                .flatten()
                .filter_map(FunctionDefinition::as_http)
                .map(|call| (call.method.as_str(), call.path.as_str()))
                .collect();
            let http: Vec<Value> = rules
                .into_iter()
                .map(|(method, path)| json!({"method": method, "path": path}))
                .collect();

            artifacts.push(Artifact {
                file_name: format!("{host}_{port}_l7policy.spec"),
                kind: "L7Policy",
                document: json!({
                    "apiVersion": "cilium.io/v2",
                    "kind": "CiliumNetworkPolicy",
                    "metadata": {"name": format!("{host}-{port}")},
                    "spec": {
                        "endpointSelector": {"matchLabels": {APP_LABEL: host}},
                        "egress": [{"toPorts": [{"rules": {"http": http}}]}],
                    }
                }),
            });
        }
    }
    artifacts
}

/// Write every artifact as pretty JSON under `out_dir`.
pub fn write_all(artifacts: &[Artifact], out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = out_dir.join(&artifact.file_name);
        log::info!("Generating {} {}...", artifact.kind, path.display());
        let text = serde_json::to_string_pretty(&artifact.document)
            .context("Failed to serialize artifact")?;
        fs::write(&path, text + "\n")
            .with_context(|| format!("Unable to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
