use std::path::PathBuf;

use thiserror::Error;

use crate::traits::RecordId;

/// Library-level failures callers may want to match on.
///
/// The reconciliation pass itself never fails; these cover the I/O and
/// lifecycle surfaces around it.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("malformed dump line {line}: {source}")]
    MalformedLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate node id {id} at node {line}")]
    DuplicateId { id: RecordId, line: usize },

    #[error("unsupported config format: {}", .0.display())]
    UnsupportedConfig(PathBuf),

    #[error("hierarchy module is already started")]
    AlreadyStarted,

    #[error("hierarchy module is not started")]
    NotStarted,
}
