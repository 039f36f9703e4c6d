//! # apisim graph
//!
//! The call graph of a simulated function mesh.
//!
//! ## Features
//!
//! - **Definition model** - HTTP functions, internal references and literal data
//! - **Validated loading** - every forwarding call must resolve to a declared key
//! - **Positioned diagnostics** - malformed documents point at line and column
//! - **Query API** - lookups, HTTP enumeration, endpoint grouping, reverse callers
//!
//! ## Architecture
//!
//! ```text
//! {"Functions": {...}}
//!     │
//!     ├──> TreeLoader
//!     │      ├─ Parse every key into a FunctionDefinition
//!     │      ├─ Resolve CALL / HTTP entries against declared keys
//!     │      └─ Report syntax and type errors with source context
//!     │
//!     └──> FunctionTree (immutable after load)
//!            ├─ lookup / all_http_calls / is_caller
//!            ├─ external_call_graph / callers_of / host_ports
//!            └─ call_cycles (petgraph)
//! ```

mod definition;
pub mod diagnostics;
mod error;
mod graph;
mod loader;
mod tree;

pub use definition::{FunctionDefinition, HttpCall, Method};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{DefinitionError, Result, TreeError};
pub use graph::{Endpoint, ExternalCallGraph};
pub use loader::TreeLoader;
pub use tree::FunctionTree;
