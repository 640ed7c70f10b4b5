//! Error types for idlgen
//!
//! Every fatal condition of a translation run has its own variant so callers
//! can tell a broken installation apart from a broken IDL file.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::{BackendKind, Feature};

/// Result type alias for idlgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scheduling or running IDL translations
#[derive(Error, Debug)]
pub enum Error {
    /// Walking the source tree failed part way through
    #[error("Error scanning source root: '{}' for stale CORBA IDL files to reprocess.", root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An include or exclude pattern did not compile
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The configuration asks for something the selected compiler cannot express
    #[error("{backend} compiler does not support {feature}")]
    UnsupportedFeature { backend: BackendKind, feature: Feature },

    /// The configured compiler name is not one of the known backends
    #[error("Compiler not supported: {0}")]
    UnsupportedBackend(String),

    /// The compiler implementation could not be located
    #[error("{message}")]
    BackendUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The compiler ran and reported errors
    #[error("IDL compilation failed ({entry_point} exited with {exit_code})")]
    CompilationFailure { entry_point: String, exit_code: i32 },

    /// The compiler could not be run at all
    #[error("{0}")]
    Infrastructure(String),

    /// The generated sources directory refuses writes
    #[error("Cannot write in : {}", .0.display())]
    NotWritable(PathBuf),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
