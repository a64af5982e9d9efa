use std::fmt;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::String(_) => ColumnType::String,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Date(_) => ColumnType::Date,
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Integer(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => parse_float(s),
            Value::Date(d) => bail!("Cannot interpret date {d} as a number"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y", "%Y%m%d",
    ];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = parse_naive_datetime(trimmed) {
        return Ok(parsed.date());
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Parses a date with an explicit strftime pattern, falling back to a datetime
/// read of the same pattern so `%Y-%m-%d %H:%M` style inputs also work.
pub fn parse_date_with_format(value: &str, format: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, format)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, format).map(|dt| dt.date()))
        .with_context(|| format!("Failed to parse '{value}' as date using '{format}'"))
}

pub fn parse_float(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Failed to parse '{value}' as float"))
}

pub fn parse_integer(value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .with_context(|| format!("Failed to parse '{value}' as integer"))
}

pub fn parse_boolean(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => bail!("Failed to parse '{value}' as boolean"),
    }
}

/// Parses a raw CSV field into a typed value. Empty fields are missing values.
pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => Value::Integer(parse_integer(value)?),
        ColumnType::Float => Value::Float(parse_float(value)?),
        ColumnType::Boolean => Value::Boolean(parse_boolean(value)?),
        ColumnType::Date => Value::Date(parse_naive_date(value)?),
    };
    Ok(Some(parsed))
}

/// Casts a value to the given column type, the way a dataframe `astype` would.
pub fn coerce_value(value: Value, ty: &ColumnType) -> Result<Value> {
    let coerced = match (ty, value) {
        (ColumnType::String, other) => Value::String(other.as_display()),
        (ColumnType::Integer, Value::Integer(i)) => Value::Integer(i),
        (ColumnType::Integer, Value::Float(f)) => {
            if !f.is_finite() {
                bail!("Cannot cast non-finite float {f} to integer");
            }
            Value::Integer(f.trunc() as i64)
        }
        (ColumnType::Integer, Value::Boolean(b)) => Value::Integer(i64::from(b)),
        (ColumnType::Integer, Value::String(s)) => Value::Integer(parse_integer(&s)?),
        (ColumnType::Float, other @ (Value::Integer(_) | Value::Float(_) | Value::Boolean(_))) => {
            Value::Float(other.as_f64()?)
        }
        (ColumnType::Float, Value::String(s)) => Value::Float(parse_float(&s)?),
        (ColumnType::Boolean, Value::Boolean(b)) => Value::Boolean(b),
        (ColumnType::Boolean, Value::Integer(i)) => Value::Boolean(i != 0),
        (ColumnType::Boolean, Value::Float(f)) => Value::Boolean(f != 0.0),
        (ColumnType::Boolean, Value::String(s)) => Value::Boolean(parse_boolean(&s)?),
        (ColumnType::Date, Value::Date(d)) => Value::Date(d),
        (ColumnType::Date, Value::String(s)) => Value::Date(parse_naive_date(&s)?),
        (ty, other) => bail!(
            "Cannot cast {} value '{}' to {}",
            other.column_type(),
            other.as_display(),
            ty
        ),
    };
    Ok(coerced)
}
