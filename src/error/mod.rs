use crate::model::Endpoint;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// The unified error type for distsort
#[derive(Error, Debug)]
pub enum DistSortError {
    #[error("[E{code:04}] Unable to reach {endpoint}", code = ErrorCode::CONNECT_FAILED)]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("[E{code:04}] Connection to {endpoint} failed mid-exchange", code = ErrorCode::CONNECT_IO)]
    Io {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    #[error("[E{code:04}] {operation} with {endpoint} timed out after {timeout:?}", code = ErrorCode::CONNECT_TIMEOUT)]
    Timeout {
        endpoint: Endpoint,
        operation: String,
        timeout: Duration,
    },

    #[error("[E{code:04}] Protocol violation: {message}")]
    Protocol { code: u16, message: String },

    #[error("[E{code:04}] {endpoint} returned no result", code = ErrorCode::NO_RESULT)]
    NoResult { endpoint: Endpoint },

    #[error("[E{code:04}] No workers available", code = ErrorCode::NO_WORKERS)]
    NoWorkers,

    #[error("[E{code:04}] {remaining} partition(s) unsorted after {sweeps} sweep(s) of the registry", code = ErrorCode::MAP_PHASE_INCOMPLETE)]
    MapPhaseIncomplete { remaining: usize, sweeps: u32 },

    #[error("[E{code:04}] Reduce at {endpoint} rejected: {reason}", code = ErrorCode::REDUCE_REJECTED)]
    ReduceRejected { endpoint: Endpoint, reason: String },

    #[error("[E{code:04}] Unable to map/reduce after {attempts} attempt(s)", code = ErrorCode::RETRIES_EXHAUSTED)]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Option<Box<DistSortError>>,
    },

    #[error("[E{code:04}] Line {line}: '{text}' is not a valid key", code = ErrorCode::RECORD_PARSE)]
    RecordParse {
        line: usize,
        text: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("[E{code:04}] Configuration error: {message}")]
    Config { code: u16, message: String },

    #[error("[E{code:04}] Storage error at {}", .path.display(), code = ErrorCode::STORAGE_IO)]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DistSortError {
    /// Create a generic protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            code: ErrorCode::PROTOCOL_GENERIC,
            message: message.into(),
        }
    }

    /// Create a protocol error with a specific code
    pub fn protocol_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Create a configuration error for an out-of-range value
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_INVALID_VALUE,
            message: message.into(),
        }
    }

    /// Create a configuration error for text that could not be parsed
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_PARSE_ERROR,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Connect { .. } => ErrorCode::CONNECT_FAILED,
            Self::Io { .. } => ErrorCode::CONNECT_IO,
            Self::Timeout { .. } => ErrorCode::CONNECT_TIMEOUT,
            Self::Protocol { code, .. } | Self::Config { code, .. } => *code,
            Self::NoResult { .. } => ErrorCode::NO_RESULT,
            Self::NoWorkers => ErrorCode::NO_WORKERS,
            Self::MapPhaseIncomplete { .. } => ErrorCode::MAP_PHASE_INCOMPLETE,
            Self::ReduceRejected { .. } => ErrorCode::REDUCE_REJECTED,
            Self::RetriesExhausted { .. } => ErrorCode::RETRIES_EXHAUSTED,
            Self::RecordParse { .. } => ErrorCode::RECORD_PARSE,
            Self::Storage { .. } => ErrorCode::STORAGE_IO,
        }
    }

    /// Peer unreachable, connection dropped, or deadline expired
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Io { .. } | Self::Timeout { .. }
        )
    }

    /// Whether the caller may recover by choosing another peer or retrying
    pub fn is_recoverable(&self) -> bool {
        self.is_connectivity()
            || matches!(
                self,
                Self::NoResult { .. }
                    | Self::NoWorkers
                    | Self::MapPhaseIncomplete { .. }
                    | Self::ReduceRejected { .. }
            )
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Connect { .. } | Self::Io { .. } | Self::Timeout { .. } => 3,
            Self::Protocol { .. } => 4,
            Self::NoResult { .. }
            | Self::NoWorkers
            | Self::MapPhaseIncomplete { .. }
            | Self::ReduceRejected { .. }
            | Self::RetriesExhausted { .. } => 5,
            Self::RecordParse { .. } => 6,
            Self::Storage { .. } => 7,
        }
    }
}

/// Type alias for Results using DistSortError
pub type Result<T> = std::result::Result<T, DistSortError>;
