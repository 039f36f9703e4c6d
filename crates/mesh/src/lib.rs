//! # apisim mesh
//!
//! Evaluates the call graph of one node, dialing other nodes over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! inbound request (method, host, path, RequestMeta)
//!     │
//!     ├──> MeshEngine::handle
//!     │      ├─ NoOperation          → empty body
//!     │      ├─ NeighborConnectivity → ping every HTTP function (OK / VULN)
//!     │      ├─ Exploit              → full call to every HTTP function + local calls
//!     │      └─ Evaluate             → declared calls
//!     │
//!     ├──> fan_out (one task per target, bounded buffer, join)
//!     │      ├─ own definition       → "NOP"
//!     │      ├─ already on the stack → skipped
//!     │      └─ otherwise            → Transport::send with its own timeout
//!     │
//!     └──> evaluate (literal / reference, left to right)
//! ```
//!
//! Results are JSON text [`Fragment`]s; remote bodies are spliced in as-is so
//! results nest across process boundaries.

mod config;
mod engine;
mod error;
mod evaluator;
mod fragment;
pub mod mock_transport;
mod transport;

pub use config::{MeshConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_TIMEOUT};
pub use engine::{CallKind, MeshEngine, EXPECTED, NOP, UNEXPECTED};
pub use error::TransportError;
pub use evaluator::BoxFuture;
pub use fragment::{join, Fragment};
pub use transport::{HttpTransport, OutboundRequest, OutboundResponse, Transport};
