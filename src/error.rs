use thiserror::Error;

use crate::conversion::TargetType;

/// Convenience result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Convenience result type for conversion operations.
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Convenience result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience result type for workbench operations.
pub type WorkbenchResult<T> = Result<T, WorkbenchError>;

/// Errors that escape the loader.
///
/// Malformed or empty content is *not* an error: it is reported as a
/// [`crate::ingestion::LoadOutcome`] so the next candidate format can be tried.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error outside the recoverable classes.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet error outside the recoverable classes.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Fetching the source from object storage failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Per-column conversion failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The requested column is not part of the table.
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// The target type token is not one of `int|float|bool|datetime|string|no_change`.
    #[error("unknown target type '{0}'")]
    UnknownTarget(String),

    /// The column's values cannot be coerced to the target type at all.
    #[error("cannot convert {raw:?} to {target}: {message}")]
    Incompatible {
        target: TargetType,
        raw: String,
        message: String,
    },
}

/// Errors reading or writing the persisted configuration document.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON or does not match the settings layout.
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the configuration store and settings submissions.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Persisting or loading failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A range setting was submitted with a non-numeric value.
    #[error("invalid value {raw:?} for range setting '{key}'")]
    InvalidRangeValue { key: String, raw: String },
}

/// Errors from the object-storage interface.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The locator is not of the form `scheme://bucket/key`.
    #[error("invalid remote locator '{0}': expected scheme://bucket/key")]
    InvalidLocator(String),

    /// No object exists at the locator.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Transport failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors writing an exported table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet encoding failed.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Uploading to object storage failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The export format token is not `csv` or `parquet`.
    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),
}

/// Errors surfaced by [`crate::workbench::Workbench`] operations.
#[derive(Debug, Error)]
pub enum WorkbenchError {
    /// The operation needs a loaded dataset and none is present.
    #[error("no file loaded; upload a file or provide a remote locator first")]
    NoDataset,

    /// Loading hit an unrecoverable error.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The content could not be read as any accepted format. Carries the user-facing messages.
    #[error("{}", .0.join(" "))]
    LoadFailure(Vec<String>),

    /// A single-column conversion request was invalid.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A settings submission was rejected or could not be saved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The settings document could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Export failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// The remote locator was rejected.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
