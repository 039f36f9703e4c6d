use std::fmt;

/// A piece of JSON text produced by evaluating one call.
///
/// Fragments are assembled as text rather than as a value tree so that a
/// remote node's response can be spliced in verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(String);

impl Fragment {
    /// A bare JSON string.
    pub fn text(value: &str) -> Self {
        Self(quote(value))
    }

    /// `{"<key>": "<value>"}`
    pub fn leaf(key: &str, value: &str) -> Self {
        Self(format!("{{{}: {}}}", quote(key), quote(value)))
    }

    /// `{"<key>": [<children>]}`
    pub fn node(key: &str, children: &[Fragment]) -> Self {
        Self(format!("{{{}: [{}]}}", quote(key), join(children)))
    }

    /// `{"<key>": <body>}` where `body` is already JSON.
    ///
    /// A body that does not parse is embedded as a string leaf instead, so
    /// one misbehaving node cannot corrupt the whole result.
    pub fn embed(key: &str, body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(_) => Self(format!("{{{}: {}}}", quote(key), body.trim())),
            Err(err) => Self::leaf(key, &format!("invalid response body: {err}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Comma-separated concatenation, the body of a JSON array.
pub fn join(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for (idx, fragment) in fragments.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(fragment.as_str());
    }
    out
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keys_and_values_are_escaped() {
        let leaf = Fragment::leaf("DATA", "say \"hi\"");
        assert_eq!(leaf.as_str(), r#"{"DATA": "say \"hi\""}"#);
        serde_json::from_str::<serde_json::Value>(leaf.as_str()).unwrap();
    }

    #[test]
    fn nodes_nest_children_in_order() {
        let node = Fragment::node(
            "CALL r",
            &[Fragment::leaf("DATA", "1"), Fragment::text("two")],
        );
        assert_eq!(node.as_str(), r#"{"CALL r": [{"DATA": "1"},"two"]}"#);
        assert_eq!(Fragment::node("CALL e", &[]).as_str(), r#"{"CALL e": []}"#);
    }

    #[test]
    fn embed_splices_valid_json() {
        let fragment = Fragment::embed("GET b:8080/y", "{\"GET RESP b:8080/y\": []}\n");
        assert_eq!(
            fragment.as_str(),
            r#"{"GET b:8080/y": {"GET RESP b:8080/y": []}}"#
        );
    }

    #[test]
    fn embed_degrades_invalid_json() {
        let fragment = Fragment::embed("GET b:8080/y", "<html>");
        let value: serde_json::Value = serde_json::from_str(fragment.as_str()).unwrap();
        let message = value["GET b:8080/y"].as_str().unwrap();
        assert!(message.starts_with("invalid response body"), "{message}");
    }
}
