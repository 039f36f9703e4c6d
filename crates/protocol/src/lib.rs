//! # apisim protocol
//!
//! Metadata exchanged between simulation nodes on every hop.
//!
//! A node learns what the caller wants from a handful of flag headers and
//! learns where the request has already been from the repeated
//! [`FUNCTION_STACK_HEADER`]. Neither carries a body; everything a node needs
//! to avoid loops travels in the headers.
//!
//! ```text
//! entry node            node B                      node C
//!   stack = []  ──GET──> stack = [B]  ──GET──────> stack = [B, C]
//!                                     (skips any call already in the stack)
//! ```

mod call_stack;

pub use call_stack::CallStack;

use serde::{Deserialize, Serialize};

/// Acknowledge only; the receiving node returns an empty body.
pub const NO_OPERATION_HEADER: &str = "NoOperation";

/// Sweep every other known HTTP function from the receiving node.
pub const EXPLOIT_HEADER: &str = "Exploit";

/// Probe the reachability of every other known HTTP function.
pub const NEIGHBOR_CONNECTIVITY_HEADER: &str = "NeighborConnectivity";

/// Repeated header, one canonical definition string per value.
pub const FUNCTION_STACK_HEADER: &str = "FunctionStack";

/// Value written for the flag headers. Receivers only test for presence.
pub const FLAG_VALUE: &str = "True";

/// What an inbound request asks the node to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Do nothing, just acknowledge.
    NoOperation,
    /// Probe every other known HTTP function, without evaluating them.
    NeighborConnectivity,
    /// Invoke every other known HTTP function, then render own local calls.
    Exploit,
    /// Render the node's own declared call list.
    Evaluate,
}

impl Intent {
    /// Resolve the intent from header presence.
    ///
    /// `header` returns the first value of a header by name. Empty values
    /// count as absent. When several flags are set, `NoOperation` wins over
    /// `NeighborConnectivity`, which wins over `Exploit`.
    pub fn from_headers<'a>(header: impl Fn(&str) -> Option<&'a str>) -> Self {
        let present = |name: &str| header(name).is_some_and(|value| !value.is_empty());

        if present(NO_OPERATION_HEADER) {
            Intent::NoOperation
        } else if present(NEIGHBOR_CONNECTIVITY_HEADER) {
            Intent::NeighborConnectivity
        } else if present(EXPLOIT_HEADER) {
            Intent::Exploit
        } else {
            Intent::Evaluate
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Intent::NoOperation => "no_operation",
            Intent::NeighborConnectivity => "neighbor_connectivity",
            Intent::Exploit => "exploit",
            Intent::Evaluate => "evaluate",
        }
    }
}

/// Per-request metadata threaded through evaluation as an ordinary value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub intent: Intent,
    pub stack: CallStack,
}

impl RequestMeta {
    pub fn new(intent: Intent, stack: CallStack) -> Self {
        Self { intent, stack }
    }

    /// Decode metadata from `(name, value)` header pairs. Names compare
    /// case-insensitively; stack entries keep their arrival order.
    pub fn from_header_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let pairs: Vec<(&str, &str)> = pairs.into_iter().collect();
        let intent = Intent::from_headers(|name| {
            pairs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| *value)
        });
        let stack = CallStack::from_header_values(
            pairs
                .iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case(FUNCTION_STACK_HEADER))
                .map(|(_, value)| *value),
        );
        Self::new(intent, stack)
    }

    /// Metadata for a request that originates at this node.
    pub fn entry() -> Self {
        Self::new(Intent::Evaluate, CallStack::new())
    }

    /// Whether outbound full calls should carry the exploit flag onward.
    pub fn forwards_exploit(&self) -> bool {
        self.intent == Intent::Exploit
    }
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self::entry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(headers: &'a HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<&'static str> + 'a {
        move |name| headers.get(name).copied()
    }

    #[test]
    fn no_headers_means_evaluate() {
        let headers = HashMap::new();
        assert_eq!(Intent::from_headers(lookup(&headers)), Intent::Evaluate);
    }

    #[test]
    fn no_operation_takes_precedence() {
        let headers = HashMap::from([
            (NO_OPERATION_HEADER, FLAG_VALUE),
            (EXPLOIT_HEADER, FLAG_VALUE),
            (NEIGHBOR_CONNECTIVITY_HEADER, FLAG_VALUE),
        ]);
        assert_eq!(Intent::from_headers(lookup(&headers)), Intent::NoOperation);
    }

    #[test]
    fn neighbor_connectivity_wins_over_exploit() {
        let headers = HashMap::from([
            (EXPLOIT_HEADER, FLAG_VALUE),
            (NEIGHBOR_CONNECTIVITY_HEADER, FLAG_VALUE),
        ]);
        assert_eq!(
            Intent::from_headers(lookup(&headers)),
            Intent::NeighborConnectivity
        );
    }

    #[test]
    fn empty_flag_value_is_ignored() {
        let headers = HashMap::from([(EXPLOIT_HEADER, "")]);
        assert_eq!(Intent::from_headers(lookup(&headers)), Intent::Evaluate);
    }

    #[test]
    fn header_pairs_decode_intent_and_stack() {
        let meta = RequestMeta::from_header_pairs([
            ("exploit", "True"),
            ("functionstack", "GET a:8080/x"),
            ("accept", "*/*"),
            ("FunctionStack", "GET b:8080/y"),
        ]);
        assert_eq!(meta.intent, Intent::Exploit);
        assert_eq!(
            meta.stack.iter().collect::<Vec<_>>(),
            vec!["GET a:8080/x", "GET b:8080/y"]
        );
    }

    #[test]
    fn only_exploit_is_forwarded() {
        assert!(RequestMeta::new(Intent::Exploit, CallStack::new()).forwards_exploit());
        assert!(!RequestMeta::entry().forwards_exploit());
    }
}
