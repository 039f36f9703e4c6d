use serde::{Deserialize, Serialize};

/// Canonical definition strings already visited by the current request.
///
/// The stack only grows. A hop that forwards a call hands the callee a copy
/// with one more entry; the caller's own stack is left untouched, so sibling
/// branches never observe each other's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallStack(Vec<String>);

impl CallStack {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Rebuild the stack from the values of the repeated header, in order.
    pub fn from_header_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            values
                .into_iter()
                .map(Into::into)
                .filter(|entry: &String| !entry.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.0.iter().any(|entry| entry == canonical)
    }

    /// Copy of this stack with `canonical` appended.
    pub fn extended(&self, canonical: impl Into<String>) -> Self {
        let mut entries = Vec::with_capacity(self.0.len() + 1);
        entries.extend(self.0.iter().cloned());
        entries.push(canonical.into());
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extended_leaves_original_untouched() {
        let base = CallStack::from_header_values(["GET a:8080/x"]);
        let next = base.extended("GET b:8080/y");

        assert_eq!(base.len(), 1);
        assert_eq!(
            next.iter().collect::<Vec<_>>(),
            vec!["GET a:8080/x", "GET b:8080/y"]
        );
        assert!(next.contains("GET b:8080/y"));
        assert!(!base.contains("GET b:8080/y"));
    }

    #[test]
    fn empty_header_values_are_dropped() {
        let stack = CallStack::from_header_values(["", "GET a:8080/x", ""]);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn serializes_as_plain_list() {
        let stack = CallStack::new().extended("CALL ref");
        let json = serde_json::to_string(&stack).unwrap();
        assert_eq!(json, r#"["CALL ref"]"#);
    }
}
