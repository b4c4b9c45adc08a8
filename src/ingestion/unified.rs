//! Unified load entrypoint.
//!
//! Most callers should use [`load_bytes`], which turns a byte stream plus an optional name hint
//! (upload file name or object key) into a [`LoadOutcome`].
//!
//! - If the hint carries a recognized extension, exactly that format is attempted.
//! - Otherwise the candidates in [`PROBE_ORDER`] are tried in turn and the first table wins.
//! - Each attempt ends in one [`LoadEvent`] delivered to the configured observers.

use std::error::Error as StdError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{LoadError, LoadResult};
use crate::remote::{ObjectStorage, RemoteLocator};
use crate::types::DataSet;

use super::observability::{LoadEvent, LoadObserver, LoadSeverity};
use super::{csv, parquet};

/// Supported tabular formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Comma-separated values.
    Csv,
    /// Apache Parquet.
    Parquet,
}

/// Probe order used when no extension selects a format.
///
/// Parquet goes first: a valid Parquet file would otherwise be reported as malformed text.
pub const PROBE_ORDER: [TableFormat; 2] = [TableFormat::Parquet, TableFormat::Csv];

impl TableFormat {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }

    /// Parse a format from the extension of a file name or object key.
    ///
    /// Only the last path segment is considered, so `bucket.v2/data` has no extension.
    pub fn from_name_hint(hint: &str) -> Option<Self> {
        let file_name = hint.rsplit('/').next().unwrap_or(hint);
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Canonical file extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }

    fn read(self, bytes: &Bytes) -> LoadResult<LoadOutcome> {
        match self {
            Self::Csv => csv::read_csv_bytes(bytes),
            Self::Parquet => parquet::read_parquet_bytes(bytes.clone()),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Result of a load attempt that did not hit an unrecoverable error.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// A table was read.
    Parsed(DataSet),
    /// No candidate format could read the content.
    UnsupportedFormat,
    /// The format selected by the name hint rejected the content.
    Malformed {
        /// Format that was attempted.
        format: TableFormat,
        /// Parser message.
        reason: String,
    },
}

impl LoadOutcome {
    /// The parsed table, or `None` for the "could not load" outcomes.
    pub fn into_table(self) -> Option<DataSet> {
        match self {
            Self::Parsed(ds) => Some(ds),
            _ => None,
        }
    }

    /// Returns `true` if a table was read.
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    fn describe(&self) -> String {
        match self {
            Self::Parsed(ds) => format!("parsed {} rows", ds.row_count()),
            Self::UnsupportedFormat => "no candidate format could read the content".to_string(),
            Self::Malformed { format, reason } => format!("malformed {format}: {reason}"),
        }
    }
}

/// Options controlling load behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct LoadOptions {
    /// Receivers of the [`LoadEvent`] each load produces.
    pub observers: Vec<Arc<dyn LoadObserver>>,
    /// Events at or above this severity are delivered with `alert` set.
    pub alert_at_or_above: LoadSeverity,
}

impl LoadOptions {
    /// Add an observer.
    pub fn observe(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("observers", &self.observers.len())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
            alert_at_or_above: LoadSeverity::Critical,
        }
    }
}

/// Load a table from raw bytes.
///
/// `name_hint` is an uploaded file name or object key. When its extension is `csv` or
/// `parquet`, only that parser runs and a rejection is reported as [`LoadOutcome::Malformed`].
/// Without a usable extension every format in [`PROBE_ORDER`] is tried, and
/// [`LoadOutcome::UnsupportedFormat`] is returned if none succeeds.
///
/// Errors outside the recoverable classes (I/O, unexpected parser failures) are returned as `Err`.
///
/// # Examples
///
/// ```
/// use dtype_workbench::ingestion::{load_bytes, LoadOptions};
///
/// # fn main() -> Result<(), dtype_workbench::LoadError> {
/// let outcome = load_bytes(b"id,name\n1,Ada\n".to_vec(), Some("people.csv"), &LoadOptions::default())?;
/// let table = outcome.into_table().expect("csv parses");
/// assert_eq!(table.row_count(), 1);
/// # Ok(())
/// # }
/// ```
pub fn load_bytes(
    bytes: impl Into<Bytes>,
    name_hint: Option<&str>,
    options: &LoadOptions,
) -> LoadResult<LoadOutcome> {
    let bytes = bytes.into();
    let directed = name_hint.and_then(TableFormat::from_name_hint);
    let candidates: Vec<TableFormat> = match directed {
        Some(format) => vec![format],
        None => PROBE_ORDER.to_vec(),
    };

    let source = name_hint.unwrap_or("<unnamed>");
    let mut format = directed;
    let result = probe(&bytes, &candidates, source, &mut format);
    report(options, source, format, &result);
    result
}

/// Read a local file and load it, using its file name as the hint.
pub fn load_from_path(path: impl AsRef<Path>, options: &LoadOptions) -> LoadResult<LoadOutcome> {
    let path = path.as_ref();
    let hint = path.file_name().and_then(|s| s.to_str());
    match std::fs::read(path) {
        Ok(bytes) => load_bytes(bytes, hint, options),
        Err(e) => {
            let result = Err(LoadError::Io(e));
            let format = hint.and_then(TableFormat::from_name_hint);
            report(options, &path.display().to_string(), format, &result);
            result
        }
    }
}

/// Fetch an object and load it, using its key as the hint.
pub fn load_from_remote(
    storage: &dyn ObjectStorage,
    locator: &RemoteLocator,
    options: &LoadOptions,
) -> LoadResult<LoadOutcome> {
    match storage.get(locator) {
        Ok(bytes) => load_bytes(bytes, Some(&locator.key), options),
        Err(e) => {
            let result = Err(LoadError::Remote(e));
            let format = TableFormat::from_name_hint(&locator.key);
            report(options, &locator.to_string(), format, &result);
            result
        }
    }
}

/// Try `candidates` in order. `attempted` ends as the format that produced the result, or `None`
/// when probing found no match.
fn probe(
    bytes: &Bytes,
    candidates: &[TableFormat],
    source: &str,
    attempted: &mut Option<TableFormat>,
) -> LoadResult<LoadOutcome> {
    let mut last = LoadOutcome::UnsupportedFormat;
    for &format in candidates {
        *attempted = Some(format);
        match format.read(bytes)? {
            LoadOutcome::Parsed(ds) => {
                info!(source, %format, rows = ds.row_count(), "loaded table");
                return Ok(LoadOutcome::Parsed(ds));
            }
            rejected => {
                debug!(source, %format, outcome = %rejected.describe(), "format rejected content");
                last = rejected;
            }
        }
    }

    if candidates.len() == 1 {
        Ok(last)
    } else {
        *attempted = None;
        Ok(LoadOutcome::UnsupportedFormat)
    }
}

fn report(options: &LoadOptions, source: &str, format: Option<TableFormat>, result: &LoadResult<LoadOutcome>) {
    if options.observers.is_empty() {
        return;
    }

    let source = source.to_string();
    let event = match (result, format) {
        (Ok(LoadOutcome::Parsed(ds)), Some(format)) => LoadEvent::Loaded {
            source,
            format,
            rows: ds.row_count(),
            columns: ds.column_count(),
        },
        (Ok(LoadOutcome::Malformed { format, reason }), _) => LoadEvent::Rejected {
            source,
            format: Some(*format),
            reason: reason.clone(),
        },
        (Ok(other), format) => LoadEvent::Rejected {
            source,
            format,
            reason: other.describe(),
        },
        (Err(e), format) => LoadEvent::Failed {
            source,
            format,
            severity: severity_for_error(e),
            error: e.to_string(),
        },
    };

    let alert = event.severity().is_some_and(|s| s >= options.alert_at_or_above);
    for observer in &options.observers {
        observer.on_event(&event, alert);
    }
}

fn severity_for_error(e: &LoadError) -> LoadSeverity {
    match e {
        LoadError::Io(_) | LoadError::Remote(_) => LoadSeverity::Critical,
        LoadError::Parquet(err) => {
            // Parquet errors wrap IO only through `External`; look down the source chain.
            if error_chain_contains_io(err) {
                LoadSeverity::Critical
            } else {
                LoadSeverity::Error
            }
        }
        LoadError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => LoadSeverity::Critical,
            _ => LoadSeverity::Error,
        },
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hint_uses_last_segment_extension() {
        assert_eq!(TableFormat::from_name_hint("data.CSV"), Some(TableFormat::Csv));
        assert_eq!(
            TableFormat::from_name_hint("exports/2024/part-0.parquet"),
            Some(TableFormat::Parquet)
        );
        assert_eq!(TableFormat::from_name_hint("bucket.v2/data"), None);
        assert_eq!(TableFormat::from_name_hint("notes.txt"), None);
        assert_eq!(TableFormat::from_name_hint("noext"), None);
    }

    #[test]
    fn probing_falls_back_to_csv_without_hint() {
        let outcome = load_bytes(b"a,b\n1,2\n".to_vec(), None, &LoadOptions::default()).unwrap();
        assert!(outcome.is_parsed());

        let outcome = load_bytes(b"a,b\n1,2\n".to_vec(), Some("upload.bin"), &LoadOptions::default()).unwrap();
        assert!(outcome.is_parsed());
    }

    #[test]
    fn probing_reports_unsupported_when_every_candidate_rejects() {
        let outcome = load_bytes(Vec::new(), None, &LoadOptions::default()).unwrap();
        assert_eq!(outcome, LoadOutcome::UnsupportedFormat);
    }

    #[test]
    fn directed_format_does_not_fall_back() {
        let outcome = load_bytes(b"a,b\n1,2\n".to_vec(), Some("data.parquet"), &LoadOptions::default()).unwrap();
        assert!(matches!(
            outcome,
            LoadOutcome::Malformed { format: TableFormat::Parquet, .. }
        ));
    }
}
