//! Column type conversion with a missing-value guard.
//!
//! A conversion never blocks on missingness: it computes the coerced column and its
//! *null ratio* (missing entries / total entries), and the caller decides what to do with the
//! advisory warning produced when the ratio exceeds the configured threshold.
//!
//! - [`plan_conversion`]: coerce one column's values without touching any table
//! - [`check_conversion`]: dry-run preview against a table, returning the warning text
//! - [`apply_conversion`]: convert one table column in place
//! - [`apply_bulk`]: convert many columns, isolating per-column failures
//!
//! ## Example
//!
//! ```rust
//! use dtype_workbench::conversion::{plan_conversion, TargetType};
//! use dtype_workbench::types::Value;
//!
//! let values = vec![
//!     Value::Utf8("1".to_string()),
//!     Value::Utf8("two".to_string()),
//!     Value::Utf8("3".to_string()),
//!     Value::Utf8("4".to_string()),
//! ];
//! let plan = plan_conversion("qty", &values, TargetType::Int).unwrap();
//! assert_eq!(plan.null_ratio, 0.25);
//! assert!(plan.threshold_warning(0.05).is_some());
//! assert!(plan.threshold_warning(0.25).is_none());
//! ```

mod bulk;
mod coerce;

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{ConversionError, ConversionResult};
use crate::types::{DataSet, DataType, Value};

pub use bulk::{apply_bulk, BulkReport};

/// Semantic type a column can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    /// Smallest signed integer width holding the values.
    Int,
    /// Reduced-precision float.
    Float,
    /// Nullable boolean.
    Bool,
    /// Timestamp.
    Datetime,
    /// Text.
    String,
}

/// Token that leaves a column untouched.
pub const NO_CHANGE: &str = "no_change";

impl TargetType {
    /// Parse a request token.
    ///
    /// Returns `Ok(None)` for [`NO_CHANGE`].
    pub fn parse(token: &str) -> ConversionResult<Option<Self>> {
        match token {
            NO_CHANGE => Ok(None),
            other => other.parse().map(Some),
        }
    }

    /// Request token for this target.
    pub fn token(&self) -> &'static str {
        match self {
            TargetType::Int => "int",
            TargetType::Float => "float",
            TargetType::Bool => "bool",
            TargetType::Datetime => "datetime",
            TargetType::String => "string",
        }
    }
}

impl FromStr for TargetType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(TargetType::Int),
            "float" => Ok(TargetType::Float),
            "bool" => Ok(TargetType::Bool),
            "datetime" => Ok(TargetType::Datetime),
            "string" => Ok(TargetType::String),
            other => Err(ConversionError::UnknownTarget(other.to_string())),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A coerced column, ready to be written back into a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    /// Column the plan was computed for.
    pub column: String,
    /// Requested target.
    pub target: TargetType,
    /// Concrete column type after coercion.
    pub data_type: DataType,
    /// Coerced values, one per row.
    pub values: Vec<Value>,
    /// Missing entries after coercion divided by total entries (0.0 for an empty column).
    pub null_ratio: f64,
}

impl ConversionPlan {
    /// Number of missing entries after coercion.
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Returns `true` if the null ratio is strictly above `threshold`.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.null_ratio > threshold
    }

    /// Advisory message when the null ratio is strictly above `threshold`.
    pub fn threshold_warning(&self, threshold: f64) -> Option<String> {
        self.exceeds(threshold).then(|| {
            format!(
                "Column '{}' conversion to {} will result in {} nulls.",
                self.column,
                self.target,
                format_percent(self.null_ratio)
            )
        })
    }
}

/// Coerce `values` to `target` and measure the resulting missingness.
///
/// Coercion failures for the whole column are returned as [`ConversionError::Incompatible`].
pub fn plan_conversion(
    column: &str,
    values: &[Value],
    target: TargetType,
) -> ConversionResult<ConversionPlan> {
    let (data_type, values) = coerce::coerce_column(values, target)?;
    let nulls = values.iter().filter(|v| v.is_null()).count();
    let null_ratio = if values.is_empty() {
        0.0
    } else {
        nulls as f64 / values.len() as f64
    };

    debug!(column, %target, %data_type, null_ratio, "planned conversion");
    Ok(ConversionPlan {
        column: column.to_string(),
        target,
        data_type,
        values,
        null_ratio,
    })
}

/// Plan a conversion for a named table column.
pub fn plan_for_table(table: &DataSet, column: &str, target: TargetType) -> ConversionResult<ConversionPlan> {
    let values = table
        .column(column)
        .ok_or_else(|| ConversionError::ColumnNotFound(column.to_string()))?;
    plan_conversion(column, &values, target)
}

/// Preview a conversion without mutating the table.
///
/// Returns the warning to show, if any: the threshold warning when the coerced column would be
/// too sparse, or `Conversion to <type> will fail.` when coercion fails. `no_change` yields `None`.
pub fn check_conversion(
    table: &DataSet,
    column: &str,
    token: &str,
    threshold: f64,
) -> ConversionResult<Option<String>> {
    if table.schema.index_of(column).is_none() {
        return Err(ConversionError::ColumnNotFound(column.to_string()));
    }
    let Some(target) = TargetType::parse(token)? else {
        return Ok(None);
    };

    match plan_for_table(table, column, target) {
        Ok(plan) => Ok(plan.threshold_warning(threshold)),
        Err(ConversionError::Incompatible { .. }) => Ok(Some(format!("Conversion to {target} will fail."))),
        Err(e) => Err(e),
    }
}

/// Convert one column in place.
///
/// The column is replaced even when the threshold is exceeded; the warning is returned for the
/// caller to surface. On error the table is left untouched.
pub fn apply_conversion(
    table: &mut DataSet,
    column: &str,
    target: TargetType,
    threshold: f64,
) -> ConversionResult<Option<String>> {
    let plan = plan_for_table(table, column, target)?;
    let warning = plan.threshold_warning(threshold);
    if let Some(w) = &warning {
        warn!(column, %target, null_ratio = plan.null_ratio, "{w}");
    }
    table.replace_column(&plan.column, plan.data_type, plan.values);
    Ok(warning)
}

fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}
