use crate::definition::{FunctionDefinition, HttpCall};
use crate::error::{Result, TreeError};
use std::collections::BTreeMap;

/// Every declared function with its ordered call list.
///
/// Built once by [`crate::TreeLoader`] and read-only afterwards; share it
/// behind an `Arc` instead of cloning.
#[derive(Debug, Clone, Default)]
pub struct FunctionTree {
    functions: BTreeMap<FunctionDefinition, Vec<FunctionDefinition>>,
    default_port: u16,
}

impl FunctionTree {
    pub fn new(default_port: u16) -> Self {
        Self {
            functions: BTreeMap::new(),
            default_port,
        }
    }

    pub(crate) fn insert(
        &mut self,
        def: FunctionDefinition,
        calls: Vec<FunctionDefinition>,
    ) -> Option<Vec<FunctionDefinition>> {
        self.functions.insert(def, calls)
    }

    /// Port appended to HTTP definitions written without one.
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn call_count(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    /// Declared calls of `def`, if it is a top-level entry.
    pub fn calls(&self, def: &FunctionDefinition) -> Option<&[FunctionDefinition]> {
        self.functions.get(def).map(Vec::as_slice)
    }

    pub fn contains(&self, def: &FunctionDefinition) -> bool {
        self.functions.contains_key(def)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FunctionDefinition, &[FunctionDefinition])> {
        self.functions
            .iter()
            .map(|(def, calls)| (def, calls.as_slice()))
    }

    /// Parse `key` and find its entry.
    pub fn lookup(&self, key: &str) -> Result<(&FunctionDefinition, &[FunctionDefinition])> {
        let def = FunctionDefinition::parse_key(key, self.default_port)?;
        self.functions
            .get_key_value(&def)
            .map(|(def, calls)| (def, calls.as_slice()))
            .ok_or_else(|| TreeError::NotFound(key.to_string()))
    }

    /// Every HTTP function declared as a top-level key.
    pub fn all_http_calls(&self) -> Vec<&HttpCall> {
        self.functions.keys().filter_map(FunctionDefinition::as_http).collect()
    }

    /// Whether `own` declares a call to `target`.
    pub fn is_caller(&self, own: &FunctionDefinition, target: &FunctionDefinition) -> bool {
        self.calls(own)
            .is_some_and(|calls| calls.iter().any(|call| call == target))
    }
}
