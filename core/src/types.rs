use std::io;
use thiserror::Error;

/// Unified stream error covering capability, protocol, cancellation and source failures.
/// - Ergonomic `From<T>` impls enable `?` across the adapters.
/// - Converts into `io::Error` so adapters can sit behind `std::io` traits.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Failure reported by the wrapped source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation the stream does not support at all (e.g. write on a read-only stream).
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Backward seek further than the buffered history.
    #[error("cannot seek back {requested} bytes: only {available} bytes of history buffered")]
    BacktrackExhausted { requested: u64, available: u64 },

    /// Forward or end-relative seek beyond the data the source holds.
    #[error("source ended at position {end} before reaching {target}")]
    PastEndOfSource { target: u64, end: u64 },

    /// Seek target is negative or overflows.
    #[error("invalid seek to a negative or overflowing position")]
    InvalidSeek,

    /// Caller broke the single-slot handoff protocol.
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    /// Stream was closed under the caller.
    #[error("stream closed: {0}")]
    Closed(&'static str),

    /// Operation observed its cancellation signal before completing.
    #[error("operation cancelled")]
    Cancelled,

    /// Generic high-level validation with a descriptive message.
    #[error("validation error: {0}")]
    Validation(String),

    /// Fatal error raised by a chunk producer.
    #[error("producer failed: {0}")]
    Producer(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse error taxonomy used by callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    UnsupportedCapability,
    ProtocolViolation,
    Cancelled,
    Source,
    Invalid,
}

impl StreamError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StreamError::Unsupported(_)
            | StreamError::BacktrackExhausted { .. }
            | StreamError::PastEndOfSource { .. } => ErrorClass::UnsupportedCapability,
            StreamError::Protocol(_) | StreamError::Closed(_) => ErrorClass::ProtocolViolation,
            StreamError::Cancelled => ErrorClass::Cancelled,
            StreamError::Io(_) | StreamError::Producer(_) => ErrorClass::Source,
            StreamError::InvalidSeek | StreamError::Validation(_) => ErrorClass::Invalid,
        }
    }

    /// Recover a `StreamError` that was wrapped by the `From<StreamError> for io::Error` impl.
    pub fn from_io(e: io::Error) -> Self {
        let kind = e.kind();
        match e.into_inner() {
            Some(inner) => match inner.downcast::<StreamError>() {
                Ok(stream_err) => *stream_err,
                Err(other) => StreamError::Io(io::Error::new(kind, other)),
            },
            None => StreamError::Io(io::Error::from(kind)),
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        // Hand source errors back untouched.
        let e = match e {
            StreamError::Io(inner) => return inner,
            other => other,
        };
        let kind = match &e {
            StreamError::Unsupported(_)
            | StreamError::BacktrackExhausted { .. }
            | StreamError::PastEndOfSource { .. } => io::ErrorKind::Unsupported,
            StreamError::InvalidSeek | StreamError::Validation(_) => io::ErrorKind::InvalidInput,
            StreamError::Protocol(_) | StreamError::Closed(_) => io::ErrorKind::BrokenPipe,
            // Not `Interrupted`: std helpers would silently retry it.
            StreamError::Io(_) | StreamError::Cancelled | StreamError::Producer(_) => {
                io::ErrorKind::Other
            }
        };
        io::Error::new(kind, e)
    }
}
