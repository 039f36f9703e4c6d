use crate::definition::{FunctionDefinition, HttpCall, Method};
use crate::error::{Result, TreeError};
use crate::tree::FunctionTree;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Method and path of a function served at some host:port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
}

/// Declared calls grouped by the network endpoint that serves them:
/// host -> port -> endpoint -> calls.
pub type ExternalCallGraph =
    BTreeMap<String, BTreeMap<u16, BTreeMap<Endpoint, Vec<FunctionDefinition>>>>;

impl FunctionTree {
    /// Re-key the HTTP entries of the tree by host and port.
    pub fn external_call_graph(&self) -> ExternalCallGraph {
        let mut graph = ExternalCallGraph::new();
        for (def, calls) in self.iter() {
            let Some(call) = def.as_http() else {
                continue;
            };
            graph
                .entry(call.host.clone())
                .or_default()
                .entry(call.port)
                .or_default()
                .insert(
                    Endpoint {
                        method: call.method,
                        path: call.path.clone(),
                    },
                    calls.to_vec(),
                );
        }
        graph
    }

    /// Top-level HTTP functions that declare a call into `host:port`.
    pub fn callers_of(&self, host: &str, port: u16) -> Vec<&HttpCall> {
        self.iter()
            .filter_map(|(def, calls)| {
                let caller = def.as_http()?;
                calls
                    .iter()
                    .filter_map(FunctionDefinition::as_http)
                    .any(|call| call.targets(host, port))
                    .then_some(caller)
            })
            .collect()
    }

    /// Distinct hosts of [`Self::callers_of`].
    pub fn caller_hosts(&self, host: &str, port: u16) -> BTreeSet<&str> {
        self.callers_of(host, port)
            .into_iter()
            .map(|caller| caller.host.as_str())
            .collect()
    }

    /// The single port each host serves on.
    pub fn host_ports(&self) -> Result<BTreeMap<&str, u16>> {
        let mut ports = BTreeMap::new();
        for call in self.all_http_calls() {
            match ports.insert(call.host.as_str(), call.port) {
                Some(previous) if previous != call.port => {
                    return Err(TreeError::MultiplePorts {
                        host: call.host.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(ports)
    }

    /// Groups of functions that can reach each other through declared
    /// calls. Evaluation of these relies on the call-stack marker to stop.
    pub fn call_cycles(&self) -> Vec<Vec<FunctionDefinition>> {
        let mut graph: DiGraph<&FunctionDefinition, ()> = DiGraph::new();
        let mut index: HashMap<&FunctionDefinition, NodeIndex> = HashMap::new();

        for (def, _) in self.iter() {
            index.insert(def, graph.add_node(def));
        }

        for (def, calls) in self.iter() {
            let from = index[def];
            for call in calls {
                if let Some(&to) = index.get(call) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => graph.contains_edge(*single, *single),
                _ => true,
            })
            .map(|component| {
                let mut members: Vec<FunctionDefinition> =
                    component.into_iter().map(|idx| graph[idx].clone()).collect();
                members.sort();
                members
            })
            .collect()
    }
}
