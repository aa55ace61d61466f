use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors produced by the job tracker.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV payload could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// A JSON document (config or credentials) could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Required columns are absent from the table header.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The table contains no usable rows.
    #[error("Table contains no application rows")]
    NoRows,

    /// A row carried a date that is not in day/month/year form.
    #[error("Unparsable date {value:?} on line {line}")]
    DateParse { line: usize, value: String },

    /// A percentage was demanded from a window with no records.
    #[error("Window \"{0}\" contains no records")]
    EmptyWindow(String),

    /// A status column name is not one of the four known flags.
    #[error("Unknown status flag: {0}")]
    UnknownStatus(String),

    /// A time-window definition is malformed.
    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    /// Neither the local credentials file nor the secret store held credentials.
    #[error("No credentials found (checked {path} and ${env_var})")]
    CredentialsNotFound { path: PathBuf, env_var: String },

    /// The remote source could not be reached.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The remote source did not answer within the configured timeout.
    #[error("Fetch timed out after {0:?}")]
    FetchTimeout(Duration),

    /// The remote source answered with a non-success status.
    #[error("Source returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// `true` for failures worth one more fetch attempt: timeouts,
    /// connection problems, throttling and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            TrackerError::FetchTimeout(_) | TrackerError::Fetch(_) => true,
            TrackerError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Convenience alias used throughout the tracker crates.
pub type Result<T> = std::result::Result<T, TrackerError>;
