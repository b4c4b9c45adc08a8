//! Bulk (multi-column) conversion.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::ConversionError;
use crate::types::DataSet;

use super::{plan_for_table, ConversionPlan, TargetType};

/// Outcome of a bulk conversion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    /// Columns that were converted, in table order.
    pub applied: Vec<String>,
    /// One message per column whose coercion failed, in table order.
    pub failures: Vec<String>,
    /// One message per converted column that exceeded the null-ratio threshold, in table order.
    pub threshold_warnings: Vec<String>,
}

impl BulkReport {
    /// All user-facing messages: failures first, then threshold warnings.
    pub fn messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .chain(self.threshold_warnings.iter())
            .cloned()
            .collect()
    }
}

/// Convert several columns of `table` at once.
///
/// `requests` maps column names to target tokens. Columns are visited in table order; columns
/// without a request, with `no_change`, or with an unrecognized token are left alone. Plans are
/// computed in parallel (columns are independent), then every successful plan is written back.
/// A failing column never prevents the others from converting.
pub fn apply_bulk(table: &mut DataSet, requests: &BTreeMap<String, String>, threshold: f64) -> BulkReport {
    let selected: Vec<(String, TargetType)> = table
        .schema
        .field_names()
        .filter_map(|name| {
            let token = requests.get(name)?;
            match TargetType::parse(token) {
                Ok(target) => target.map(|t| (name.to_string(), t)),
                Err(e) => {
                    warn!(column = name, error = %e, "skipping column");
                    None
                }
            }
        })
        .collect();

    let planned: Vec<(String, TargetType, Result<ConversionPlan, ConversionError>)> = {
        let table: &DataSet = table;
        selected
            .into_par_iter()
            .map(|(column, target)| {
                let plan = plan_for_table(table, &column, target);
                (column, target, plan)
            })
            .collect()
    };

    let mut report = BulkReport::default();
    for (column, target, plan) in planned {
        match plan {
            Ok(plan) => {
                if let Some(w) = plan.threshold_warning(threshold) {
                    warn!(column = %column, %target, null_ratio = plan.null_ratio, "{w}");
                    report.threshold_warnings.push(w);
                }
                table.replace_column(&column, plan.data_type, plan.values);
                report.applied.push(column);
            }
            Err(e) => {
                warn!(column = %column, %target, error = %e, "conversion failed");
                report
                    .failures
                    .push(format!("Failed to convert column {column} to {target}: {e}"));
            }
        }
    }

    info!(
        applied = report.applied.len(),
        failed = report.failures.len(),
        "bulk conversion finished"
    );
    report
}
