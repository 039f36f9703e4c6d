use apisim_graph::{FunctionTree, TreeError};
use serde::Serialize;

/// What `apisim check` reports about a loaded tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub functions: usize,
    pub calls: usize,
    pub http_functions: usize,
    pub hosts: Vec<String>,
    pub cycles: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CheckSummary {
    pub fn of(tree: &FunctionTree) -> Self {
        let graph = tree.external_call_graph();
        let hosts = graph
            .iter()
            .flat_map(|(host, ports)| ports.keys().map(move |port| format!("{host}:{port}")))
            .collect();

        let cycles = tree
            .call_cycles()
            .into_iter()
            .map(|cycle| cycle.iter().map(ToString::to_string).collect())
            .collect();

        let mut warnings = Vec::new();
        if let Err(err @ TreeError::MultiplePorts { .. }) = tree.host_ports() {
            warnings.push(format!("{err}; run one node-server per port"));
        }

        Self {
            functions: tree.len(),
            calls: tree.call_count(),
            http_functions: tree.all_http_calls().len(),
            hosts,
            cycles,
            warnings,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{} functions, {} calls, {} served over HTTP\n",
            self.functions, self.calls, self.http_functions
        );
        for host in &self.hosts {
            out.push_str(&format!("  node {host}\n"));
        }
        for cycle in &self.cycles {
            out.push_str(&format!("  cycle {}\n", cycle.join(" -> ")));
        }
        for warning in &self.warnings {
            out.push_str(&format!("  warning: {warning}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apisim_graph::TreeLoader;
    use pretty_assertions::assert_eq;

    #[test]
    fn summarizes_nodes_and_cycles() {
        let tree = TreeLoader::new(8080)
            .load_str(
                "defs.json",
                r#"{"Functions": {
                    "GET a/x": ["GET b:9000/y"],
                    "GET b:9000/y": ["GET a/x", "DATA hi"],
                    "GET b:9001/z": []
                }}"#,
            )
            .unwrap();

        let summary = CheckSummary::of(&tree);
        assert_eq!(summary.functions, 3);
        assert_eq!(summary.calls, 3);
        assert_eq!(summary.http_functions, 3);
        assert_eq!(summary.hosts, vec!["a:8080", "b:9000", "b:9001"]);
        assert_eq!(summary.cycles.len(), 1);
        assert_eq!(summary.warnings.len(), 1);

        let text = summary.render_text();
        assert!(text.starts_with("3 functions, 3 calls"), "{text}");
        assert!(text.contains("cycle GET a:8080/x -> GET b:9000/y"), "{text}");
    }
}
