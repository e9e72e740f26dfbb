use std::path::PathBuf;
use thiserror::Error;

/// Error type for invalid inputs and failed ensemble members.
#[derive(Error, Debug)]
pub enum EnsembleError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not read table {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Column {column:?} not found in {table}")]
    MissingColumn { table: String, column: String },
    #[error("No row for model={model:?} scenario={scenario:?} variable={variable:?}")]
    MissingRow {
        model: String,
        scenario: String,
        variable: String,
    },
    #[error("Malformed row {row} in {table}: {reason}")]
    MalformedRow {
        table: String,
        row: usize,
        reason: String,
    },
    #[error("No data in {table} for {window}")]
    NoData { table: String, window: String },
    #[error("Could not parse {value:?} in {table}")]
    Parse { table: String, value: String },
    #[error("Checksum mismatch for dataset {name}. Expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("Calibration parameter {0:?} is required but was not provided")]
    MissingParameter(String),
    #[error("Model did not produce output {0:?}")]
    MissingOutput(String),
    #[error("Model run failed: {reason}")]
    Model { reason: String },
    #[error("Shape mismatch: {0}")]
    Shape(String),
    #[error("Could not (de)serialise result archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("Could not (de)serialise {path} as JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EnsembleError {
    /// Wrap an I/O error with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EnsembleError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience type for `Result<T, EnsembleError>`.
pub type EnsembleResult<T> = Result<T, EnsembleError>;
