//! Error types for the dump pipeline.

/// Errors that abort a dump.
///
/// Transport faults during the chunked transfer are not listed here: they end the transfer
/// and are reported through [`crate::transfer::Termination::Fault`].
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// The 4-byte length prefix could not be read completely.
    #[error("header truncated: got {got} of {expected} bytes{}", .cause.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Framing {
        got: usize,
        expected: usize,
        cause: Option<std::io::Error>,
    },

    /// Writing or flushing the output failed.
    #[error("output write failed after {written} bytes: {source}")]
    Sink {
        written: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DumpError>;
