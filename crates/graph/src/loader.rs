use crate::definition::FunctionDefinition;
use crate::diagnostics;
use crate::error::{Result, TreeError};
use crate::tree::FunctionTree;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// On-disk shape: `{"Functions": {"<key>": ["<key>", ...]}}`.
#[derive(Debug, Deserialize)]
struct Document {
    #[serde(rename = "Functions", default)]
    functions: BTreeMap<String, Vec<String>>,
}

/// Builds a validated [`FunctionTree`] from a configuration document.
#[derive(Debug, Clone, Copy)]
pub struct TreeLoader {
    default_port: u16,
}

impl TreeLoader {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }

    pub fn load_file(&self, path: &Path) -> Result<FunctionTree> {
        log::info!("Loading configuration file {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| TreeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_str(&file, &content)
    }

    /// Parse and validate `content`. `file` only labels diagnostics.
    ///
    /// Nothing is returned unless every key parses and every forwarding call
    /// resolves to a top-level key; there is no partial tree.
    pub fn load_str(&self, file: &str, content: &str) -> Result<FunctionTree> {
        if content.trim().is_empty() {
            return Err(TreeError::EmptyDefinition);
        }

        let document: Document = serde_json::from_str(content)
            .map_err(|err| diagnostics::describe(file, content, &err))?;
        if document.functions.is_empty() {
            return Err(TreeError::EmptyDefinition);
        }

        let mut entries = Vec::with_capacity(document.functions.len());
        let mut declared = HashSet::with_capacity(document.functions.len());
        for (key, calls) in &document.functions {
            let def = FunctionDefinition::parse_key(key, self.default_port)?;
            if !declared.insert(def.clone()) {
                return Err(TreeError::DuplicateDefinition { key: key.clone() });
            }
            entries.push((def, calls));
        }

        let mut tree = FunctionTree::new(self.default_port);
        for (def, raw_calls) in entries {
            let mut calls = Vec::with_capacity(raw_calls.len());
            for raw in raw_calls {
                let call = FunctionDefinition::parse_key(raw, self.default_port)?;
                if call.is_reference() && !declared.contains(&call) {
                    return Err(TreeError::UnresolvedReference {
                        name: call.reference_name(),
                    });
                }
                calls.push(call);
            }
            tree.insert(def, calls);
        }

        log::info!(
            "Loaded function tree: {} functions, {} calls",
            tree.len(),
            tree.call_count()
        );
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DefinitionError;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn load(doc: &str) -> Result<FunctionTree> {
        TreeLoader::new(8080).load_str("defs.json", doc)
    }

    #[test]
    fn loads_literals_and_references() {
        let tree = load(
            r#"{"Functions": {"GET /a": ["DATA hello", "CALL ref1"], "CALL ref1": ["DATA world"]}}"#,
        )
        .unwrap();

        assert_eq!(tree.len(), 2);
        let (_, calls) = tree.lookup("GET :8080/a").unwrap();
        let rendered: Vec<String> = calls.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["DATA hello", "CALL ref1"]);
    }

    #[test]
    fn call_order_is_preserved() {
        let tree = load(
            r#"{"Functions": {"CALL r": ["DATA 3", "DATA 1", "DATA 2"]}}"#,
        )
        .unwrap();
        let (_, calls) = tree.lookup("CALL r").unwrap();
        let rendered: Vec<String> = calls.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["DATA 3", "DATA 1", "DATA 2"]);
    }

    #[test]
    fn missing_reference_is_named() {
        let err = load(r#"{"Functions": {"GET /a": ["CALL missing"]}}"#).unwrap_err();
        match err {
            TreeError::UnresolvedReference { name } => assert_eq!(name, "missing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_http_target_is_unresolved() {
        let err = load(r#"{"Functions": {"GET a/x": ["GET b/y"]}}"#).unwrap_err();
        match err {
            TreeError::UnresolvedReference { name } => assert_eq!(name, "GET b:8080/y"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn http_target_resolves_after_normalization() {
        load(r#"{"Functions": {"GET a/x": ["GET b:8080/y"], "GET b/y": []}}"#).unwrap();
    }

    #[test]
    fn literals_need_no_backing_entry() {
        load(r#"{"Functions": {"GET a/x": ["DATA free"]}}"#).unwrap();
    }

    #[test]
    fn empty_documents_are_rejected() {
        for doc in ["", "   \n", "{}", r#"{"Functions": {}}"#] {
            assert!(
                matches!(load(doc), Err(TreeError::EmptyDefinition)),
                "{doc:?}"
            );
        }
    }

    #[test]
    fn bad_key_aborts_the_load() {
        let err = load(r#"{"Functions": {"FETCH a/x": []}}"#).unwrap_err();
        assert!(matches!(
            err,
            TreeError::Definition(DefinitionError::UnknownType { .. })
        ));
    }

    #[test]
    fn normalized_duplicates_are_rejected() {
        let err = load(r#"{"Functions": {"GET a/x": [], "GET a:8080/x": []}}"#).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateDefinition { .. }));
    }

    #[test]
    fn syntax_errors_are_positioned() {
        let err = load("{\"Functions\": {\n  \"GET a/x\": [,]\n}}").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("defs.json:2: syntax error at offset"), "{message}");
        assert!(message.contains("\"GET a/x\": [,]"), "{message}");
    }

    #[test]
    fn load_file_reports_the_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{{\"Functions\": {{").unwrap();
        writeln!(file, "  \"GET a/x\": [\"DATA 1\"] \"oops\"").unwrap();
        writeln!(file, "}}}}").unwrap();

        let err = TreeLoader::new(8080).load_file(&path).unwrap_err();
        assert!(err.to_string().starts_with("mesh.json:2:"), "{err}");
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = TreeLoader::new(8080)
            .load_file(&dir.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, TreeError::Io { .. }));
    }
}
