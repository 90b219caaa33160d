//! Store error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the document stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No document under this key.
    #[error("{kind} \"{key}\" not found")]
    NotFound {
        /// Document kind, e.g. `"ticket"`.
        kind: &'static str,
        /// The missing key.
        key: String,
    },

    /// A write lost a race or would overwrite an existing document.
    #[error("conflict on \"{key}\": {reason}")]
    Conflict {
        /// The contested key.
        key: String,
        /// What the writer expected.
        reason: String,
    },

    /// Filesystem failure while loading or persisting a snapshot.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Snapshot file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file exists but is not valid JSON for this store.
    #[error("corrupt snapshot {}: {source}", path.display())]
    Corrupt {
        /// Snapshot file.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing a snapshot failed.
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
