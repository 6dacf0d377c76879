use std::path::PathBuf;

/// Base error type for rgit-utils operations.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error("lock file error: {0}")]
    Lock(#[from] LockError),

    #[error("date parse error: {0}")]
    DateParse(String),

    #[error("signature parse error: {0}")]
    SignatureParse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lock file specific errors.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Another writer holds the lock (or a stale lock file was left
    /// behind by a crashed one).
    #[error("'{path}' is locked by another process")]
    Held { path: PathBuf },

    /// An I/O step of the locking protocol failed.
    #[error("lock {op} failed for '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
