use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure inside a single discovery source. Never escapes the discovery pass.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("io error while scanning {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` failed: {reason}")]
    Subprocess { program: String, reason: String },
    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("malformed data from {origin}: {reason}")]
    Malformed { origin: String, reason: String },
    #[error("source not supported on this platform")]
    Unsupported,
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache is not valid json: {0}")]
    Format(#[from] serde_json::Error),
    #[error("no cache location available")]
    NoLocation,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("launch command is empty")]
    EmptyCommand,
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process {0} no longer exists")]
    NoSuchProcess(u32),
    #[error("access denied for process {0}")]
    AccessDenied(u32),
    #[error("process {pid} still running after {waited:?}")]
    StillRunning { pid: u32, waited: Duration },
    #[error("could not list processes: {0}")]
    Enumerate(String),
    #[error("{0}")]
    Other(String),
}
