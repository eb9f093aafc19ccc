//! Top-level error type the CLI converts into a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Every way a `dircache` subcommand can fail.
#[derive(Debug, Error)]
pub enum CliError {
    /// Repository layout creation failed (`init`).
    #[error(transparent)]
    Layout(#[from] dircache_core::layout::LayoutError),
    /// Object store read/write failed.
    #[error(transparent)]
    Store(#[from] object_store::Error),
    /// Tree/commit codec failed.
    #[error(transparent)]
    Codec(#[from] object_store::codec::Error),
    /// Staging index operation failed.
    #[error(transparent)]
    Index(#[from] index_store::IndexError),
    /// An argv digest argument was not valid hex.
    #[error("{0}: not a valid object id ({1})")]
    BadHex(String, dircache_core::digest::HexError),
    /// `read-tree` (or similar) was pointed at the wrong object kind.
    #[error("expected a 'tree' node, got {0:?}")]
    NotATree(String),
    /// Generic I/O failure not already wrapped by a sub-crate error.
    #[error("{path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The `diff` child process could not be spawned or did not exit cleanly.
    #[error("diff: {0}")]
    Diff(std::io::Error),
}
