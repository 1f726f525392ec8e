use thiserror::Error;

/// Main error type for the hopt bridge
#[derive(Error, Debug)]
pub enum HbError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Storage-area errors. All of these are fatal to a run.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("cannot create storage area {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write record {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read record {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("record for job {job_id} already exists at {path}")]
    RecordExists { job_id: u64, path: String },
}

/// Errors in the content of a record that exists on disk.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("malformed result for job {job_id} at {path}: {content:?}")]
    MalformedResult {
        job_id: u64,
        path: String,
        content: String,
    },

    #[error("malformed parameters for job {job_id} at {path}: {message}")]
    MalformedParameters {
        job_id: u64,
        path: String,
        message: String,
    },
}

/// Errors raised while blocking on a result record.
#[derive(Error, Debug)]
pub enum WaitError {
    #[error("no result for job {job_id} after {waited_ms} ms")]
    TimedOut { job_id: u64, waited_ms: u128 },

    #[error("wait for job {job_id} cancelled")]
    Cancelled { job_id: u64 },
}

/// Result type alias for bridge operations
pub type HbResult<T> = Result<T, HbError>;

impl HbError {
    /// Raw content of a malformed result record, if that is what failed.
    pub fn malformed_content(&self) -> Option<&str> {
        match self {
            HbError::Record(RecordError::MalformedResult { content, .. }) => Some(content),
            _ => None,
        }
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::HbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::HbError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HbError::Config(format!($($arg)*))
    };
}
