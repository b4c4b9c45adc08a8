//! Load events and the sinks that receive them.
//!
//! Every call to the unified entrypoints produces exactly one [`LoadEvent`], delivered to each
//! observer in [`super::LoadOptions::observers`]. The `alert` flag is set when the event's
//! severity reaches [`super::LoadOptions::alert_at_or_above`].

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

use super::unified::TableFormat;

/// How bad a load that produced no table was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSeverity {
    /// The content was rejected; the caller gets a "could not load" outcome.
    Warning,
    /// Parser failure outside the recoverable classes.
    Error,
    /// I/O or object-storage failure.
    Critical,
}

/// One load attempt as seen by observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoadEvent {
    /// A table was read.
    Loaded {
        /// File name, object key or locator the bytes came from.
        source: String,
        format: TableFormat,
        rows: usize,
        columns: usize,
    },
    /// Every attempted format rejected the content.
    Rejected {
        source: String,
        /// The directed format, or `None` when probing found no match.
        format: Option<TableFormat>,
        reason: String,
    },
    /// The load returned an error.
    Failed {
        source: String,
        format: Option<TableFormat>,
        severity: LoadSeverity,
        error: String,
    },
}

impl LoadEvent {
    /// Where the bytes came from.
    pub fn source(&self) -> &str {
        match self {
            Self::Loaded { source, .. } | Self::Rejected { source, .. } | Self::Failed { source, .. } => source,
        }
    }

    /// `None` for a successful load.
    pub fn severity(&self) -> Option<LoadSeverity> {
        match self {
            Self::Loaded { .. } => None,
            Self::Rejected { .. } => Some(LoadSeverity::Warning),
            Self::Failed { severity, .. } => Some(*severity),
        }
    }
}

/// Receives load events.
pub trait LoadObserver: Send + Sync {
    /// Called once per load attempt.
    fn on_event(&self, event: &LoadEvent, alert: bool);
}

/// Forwards load events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_event(&self, event: &LoadEvent, alert: bool) {
        if alert {
            tracing::error!(source = event.source(), severity = ?event.severity(), "load alert");
        }
        match event {
            LoadEvent::Loaded { source, format, rows, columns } => {
                tracing::info!(%source, %format, rows, columns, "load ok");
            }
            LoadEvent::Rejected { source, format, reason } => {
                tracing::warn!(%source, ?format, %reason, "load rejected");
            }
            LoadEvent::Failed { source, format, severity, error } => {
                tracing::warn!(%source, ?format, ?severity, %error, "load failed");
            }
        }
    }
}

/// Appends every event as one JSON object per line.
///
/// Lines carry an RFC 3339 `ts` and an `alert` flag next to the event fields. A failed write is
/// logged with `tracing` and does not affect the load.
#[derive(Debug)]
pub struct JsonLinesObserver {
    path: PathBuf,
    file: Mutex<File>,
}

#[derive(Serialize)]
struct Line<'a> {
    ts: String,
    alert: bool,
    #[serde(flatten)]
    event: &'a LoadEvent,
}

impl JsonLinesObserver {
    /// Open (or create) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// The log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &LoadEvent, alert: bool) {
        let line = Line {
            ts: Utc::now().to_rfc3339(),
            alert,
            event,
        };
        let result = serde_json::to_vec(&line).map_err(io::Error::from).and_then(|mut buf| {
            buf.push(b'\n');
            let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            file.write_all(&buf)
        });
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "could not append load event");
        }
    }
}

impl LoadObserver for JsonLinesObserver {
    fn on_event(&self, event: &LoadEvent, alert: bool) {
        self.append(event, alert);
    }
}
