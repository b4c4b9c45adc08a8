//! Load entrypoints and implementations.
//!
//! Most callers should use [`load_bytes`] (from [`unified`]) which:
//!
//! - picks the format from the name hint's extension, or probes Parquet then CSV
//! - reads the content into an in-memory [`crate::types::DataSet`] with inferred column types
//! - reports one [`LoadEvent`] per attempt to the configured [`LoadObserver`]s
//!
//! Format-specific readers are also available under:
//! - [`csv`]
//! - [`parquet`]

pub mod csv;
pub mod observability;
pub mod parquet;
pub mod unified;

pub use observability::{JsonLinesObserver, LoadEvent, LoadObserver, LoadSeverity, TracingObserver};
pub use unified::{
    load_bytes, load_from_path, load_from_remote, LoadOptions, LoadOutcome, TableFormat, PROBE_ORDER,
};
