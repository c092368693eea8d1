use std::path::PathBuf;

use thiserror::Error;

/// Error surface of the tailer task. Almost everything inside the tail loop
/// is logged and retried; only watcher setup failures propagate.
#[derive(Debug, Error)]
pub enum TailerError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> TailerError {
    TailerError::Io {
        path: path.into(),
        source,
    }
}
