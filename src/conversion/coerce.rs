//! Per-value coercion rules for each [`TargetType`].
//!
//! Unparseable values become [`Value::Null`]; values that cannot be coerced at all abort the whole
//! column with [`ConversionError::Incompatible`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{ConversionError, ConversionResult};
use crate::types::{DataType, Value};

use super::TargetType;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y%m%d"];

/// Coerce a whole column, returning the resulting column type and values.
pub(crate) fn coerce_column(
    values: &[Value],
    target: TargetType,
) -> ConversionResult<(DataType, Vec<Value>)> {
    match target {
        TargetType::Int => {
            let out = values.iter().map(to_int).collect::<ConversionResult<Vec<_>>>()?;
            Ok((integer_width(&out), out))
        }
        TargetType::Float => {
            let out = values.iter().map(to_float).collect::<ConversionResult<Vec<_>>>()?;
            Ok((DataType::Float32, out))
        }
        TargetType::Bool => Ok((DataType::Bool, values.iter().map(to_bool).collect())),
        TargetType::Datetime => {
            let out = values.iter().map(to_datetime).collect::<ConversionResult<Vec<_>>>()?;
            Ok((DataType::Datetime, out))
        }
        TargetType::String => Ok((DataType::Utf8, values.iter().map(to_text).collect())),
    }
}

fn integer_width(values: &[Value]) -> DataType {
    let mut range: Option<(i64, i64)> = None;
    for v in values {
        if let Value::Int64(i) = v {
            range = Some(match range {
                Some((lo, hi)) => (lo.min(*i), hi.max(*i)),
                None => (*i, *i),
            });
        }
    }
    match range {
        Some((lo, hi)) => DataType::narrowest_integer(lo, hi),
        None => DataType::Int8,
    }
}

fn to_int(value: &Value) -> ConversionResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int64(v) => Ok(Value::Int64(*v)),
        Value::Float32(v) => float_to_int(f64::from(*v)),
        Value::Float64(v) => float_to_int(*v),
        Value::Bool(b) => Ok(Value::Int64(i64::from(*b))),
        Value::Utf8(s) => {
            let trimmed = s.trim();
            if let Ok(v) = trimmed.parse::<i64>() {
                return Ok(Value::Int64(v));
            }
            match trimmed.parse::<f64>() {
                Ok(v) => float_to_int(v),
                Err(_) => Ok(Value::Null),
            }
        }
        Value::Datetime(_) => Err(incompatible(
            TargetType::Int,
            value,
            "datetime values cannot be coerced to integers",
        )),
    }
}

fn float_to_int(v: f64) -> ConversionResult<Value> {
    if v.is_nan() {
        return Ok(Value::Null);
    }
    if !v.is_finite() {
        return Err(incompatible(
            TargetType::Int,
            &Value::Float64(v),
            "cannot convert non-finite values to integer",
        ));
    }
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if v.fract() != 0.0 || v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Err(incompatible(
            TargetType::Int,
            &Value::Float64(v),
            "cannot safely cast non-equivalent float to integer",
        ));
    }
    Ok(Value::Int64(v as i64))
}

fn to_float(value: &Value) -> ConversionResult<Value> {
    let narrowed = |v: f64| {
        if v.is_nan() {
            Value::Null
        } else {
            Value::Float32(v as f32)
        }
    };

    match value {
        Value::Null => Ok(Value::Null),
        Value::Int64(v) => Ok(Value::Float32(*v as f32)),
        Value::Float32(v) => Ok(narrowed(f64::from(*v))),
        Value::Float64(v) => Ok(narrowed(*v)),
        Value::Bool(b) => Ok(Value::Float32(if *b { 1.0 } else { 0.0 })),
        Value::Utf8(s) => Ok(s.trim().parse::<f64>().map(narrowed).unwrap_or(Value::Null)),
        Value::Datetime(_) => Err(incompatible(
            TargetType::Float,
            value,
            "datetime values cannot be coerced to floats",
        )),
    }
}

fn to_bool(value: &Value) -> Value {
    let b = match value {
        Value::Bool(b) => Some(*b),
        Value::Int64(0) => Some(false),
        Value::Int64(1) => Some(true),
        Value::Float32(v) if *v == 0.0 || *v == 1.0 => Some(*v == 1.0),
        Value::Float64(v) if *v == 0.0 || *v == 1.0 => Some(*v == 1.0),
        Value::Utf8(s) => parse_bool(s.trim()),
        _ => None,
    };
    b.map(Value::Bool).unwrap_or(Value::Null)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn to_datetime(value: &Value) -> ConversionResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Datetime(ts) => Ok(Value::Datetime(*ts)),
        Value::Utf8(s) => Ok(parse_datetime(s.trim()).map(Value::Datetime).unwrap_or(Value::Null)),
        // Numbers are nanoseconds since the Unix epoch.
        Value::Int64(ns) => Ok(Value::Datetime(DateTime::from_timestamp_nanos(*ns).naive_utc())),
        Value::Float32(v) => Ok(float_nanos(f64::from(*v))),
        Value::Float64(v) => Ok(float_nanos(*v)),
        Value::Bool(_) => Err(incompatible(
            TargetType::Datetime,
            value,
            "bool values cannot be coerced to datetime",
        )),
    }
}

fn float_nanos(v: f64) -> Value {
    if !v.is_finite() || v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Value::Null;
    }
    Value::Datetime(DateTime::from_timestamp_nanos(v.trunc() as i64).naive_utc())
}

/// Parse the timestamp spellings accepted by `datetime` conversion.
pub(crate) fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn to_text(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Utf8(s) => Value::Utf8(s.clone()),
        other => Value::Utf8(other.to_string()),
    }
}

fn incompatible(target: TargetType, value: &Value, message: &str) -> ConversionError {
    ConversionError::Incompatible {
        target,
        raw: value.to_string(),
        message: message.to_string(),
    }
}
