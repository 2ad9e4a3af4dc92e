//! Error types for vsbuild-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A command failed to execute.
    #[error("cannot execute command: {source}")]
    CommandExec { source: std::io::Error },

    /// Waiting for a spawned command to exit failed.
    #[error("cannot wait for command to exit: {source}")]
    CommandWait { source: std::io::Error },

    /// Forwarding command output to its consumer failed.
    #[error("cannot forward command output: {source}")]
    OutputForward { source: std::io::Error },

    /// A thread reading command output died.
    #[error("output reader for {stream} panicked")]
    OutputReaderPanicked { stream: String },
}
