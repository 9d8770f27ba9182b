use std::fmt::Debug;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read IR input: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("failed to decode IR unit {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize IR unit {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("declaration `{fq_name}` reached code generation without a body")]
    MissingBody { fq_name: String },
    #[error("unsupported construct: {message}\n{dump}")]
    UnsupportedConstruct { message: String, dump: String },
    #[error("unresolved {kind} reference: {name}")]
    UnresolvedSymbol { kind: &'static str, name: String },
    #[error("no declaration ids left to allocate")]
    IdSpaceExhausted,
    #[error("unknown wasm intrinsic `{0}`")]
    UnknownIntrinsic(String),
}

impl CoreError {
    /// An `UnsupportedConstruct` carrying a dump of the offending node.
    pub fn unsupported(message: impl Into<String>, node: &impl Debug) -> Self {
        CoreError::UnsupportedConstruct {
            message: message.into(),
            dump: format!("{node:#?}"),
        }
    }

    pub fn unresolved(kind: &'static str, name: impl ToString) -> Self {
        CoreError::UnresolvedSymbol {
            kind,
            name: name.to_string(),
        }
    }
}
