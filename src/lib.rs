//! `dtype-workbench` loads a tabular file (CSV or Parquet) into an in-memory
//! [`types::DataSet`], lets you re-coerce its columns to other types behind a missing-value guard,
//! exports the result, and keeps a small versioned settings document.
//!
//! ## Loading
//!
//! [`ingestion::load_bytes`] picks the parser from the name hint's extension (`.csv`,
//! `.parquet`/`.pq`). Without a usable extension it probes Parquet, then CSV. Content no parser
//! accepts is reported as a [`ingestion::LoadOutcome`], not an error:
//!
//! ```rust
//! use dtype_workbench::ingestion::{load_bytes, LoadOptions, LoadOutcome};
//!
//! # fn main() -> Result<(), dtype_workbench::LoadError> {
//! let outcome = load_bytes(b"id,score\n1,0.5\n2,\n".to_vec(), None, &LoadOptions::default())?;
//! let LoadOutcome::Parsed(table) = outcome else { panic!("csv probe succeeds") };
//! assert_eq!(table.dtypes(), vec![("id".to_string(), "int64"), ("score".to_string(), "float64")]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Converting
//!
//! [`conversion::apply_conversion`] coerces one column; values that cannot be represented become
//! [`types::Value::Null`], and a warning is returned when the share of nulls exceeds the
//! configured threshold (see [`config::ConfigurationDocument::null_ratio_alert_threshold`]).
//!
//! ```rust
//! use dtype_workbench::conversion::{apply_conversion, TargetType};
//! use dtype_workbench::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let mut ds = DataSet::new(
//!     Schema::new(vec![Field::new("qty", DataType::Utf8)]),
//!     vec![
//!         vec![Value::Utf8("1".to_string())],
//!         vec![Value::Utf8("two".to_string())],
//!     ],
//! );
//! let warning = apply_conversion(&mut ds, "qty", TargetType::Int, 0.05).unwrap();
//! assert_eq!(
//!     warning.as_deref(),
//!     Some("Column 'qty' conversion to int will result in 50.00% nulls.")
//! );
//! assert_eq!(ds.schema.fields[0].data_type, DataType::Int8);
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: format detection, CSV/Parquet readers, load observers
//! - [`conversion`]: target types, coercion, threshold warnings, bulk mode
//! - [`config`]: settings document, schema merge, form submission, persistence, sessions
//! - [`export`]: CSV/Parquet writers and remote upload
//! - [`remote`]: object-storage locators and the storage interface
//! - [`workbench`]: one live dataset plus settings, as a front end drives them
//! - [`types`]: schema + in-memory dataset types
//! - [`error`]: error types

pub mod config;
pub mod conversion;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod remote;
pub mod types;
pub mod workbench;

pub use error::{
    ConfigError, ConversionError, ExportError, LoadError, LoadResult, RemoteError, StorageError, WorkbenchError,
    WorkbenchResult,
};
pub use workbench::Workbench;
