use crate::diagnostics::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TreeError>;

/// A definition key or call entry that cannot be turned into a definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("invalid key \"{key}\": expected \"<TYPE> <data>\"")]
    InvalidKey { key: String },

    #[error("unknown type \"{tag}\"")]
    UnknownType { tag: String },

    #[error("unable to derive host and port from \"{address}\"")]
    InvalidAddress { address: String },
}

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("empty json definition")]
    EmptyDefinition,

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("unresolved reference \"{name}\"")]
    UnresolvedReference { name: String },

    #[error("duplicate definition \"{key}\"")]
    DuplicateDefinition { key: String },

    #[error("{0}")]
    Malformed(Diagnostic),

    #[error("function {0} not found")]
    NotFound(String),

    #[error("multiple ports on host \"{host}\"")]
    MultiplePorts { host: String },

    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
