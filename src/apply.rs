//! Materializes the template from source data using a [`Mapping`].
//!
//! Failures are contained per template column: a column that cannot be
//! filled is left with only missing values and the run continues.

use std::fmt;

use anyhow::Result;
use log::{debug, warn};

use crate::{
    data::{Value, coerce_value},
    dataset::{Column, Table},
    mapping::Mapping,
    schema::ColumnType,
    transform::Transform,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Unmapped,
    UnknownSourceColumn(String),
    UnsupportedTransformation { text: String, detail: String },
    TransformFailed(String),
    CoercionFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unmapped => write!(f, "no mapping entry"),
            SkipReason::UnknownSourceColumn(column) => {
                write!(f, "source column '{column}' does not exist")
            }
            SkipReason::UnsupportedTransformation { text, detail } => {
                write!(f, "unsupported transformation '{text}': {detail}")
            }
            SkipReason::TransformFailed(detail) => write!(f, "transformation failed: {detail}"),
            SkipReason::CoercionFailed(detail) => write!(f, "type coercion failed: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFailure {
    pub field: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub populated: Vec<String>,
    pub skipped: Vec<ColumnFailure>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Builds the output table. Never fails; see [`apply_with_report`] for the
/// per-column outcome.
pub fn apply(source: &Table, template: &Table, mapping: &Mapping) -> Table {
    apply_with_report(source, template, mapping).0
}

pub fn apply_with_report(source: &Table, template: &Table, mapping: &Mapping) -> (Table, ApplyReport) {
    let rows = source.row_count();
    let mut report = ApplyReport::default();
    let mut columns = Vec::with_capacity(template.columns().len());

    for target in template.columns() {
        match populate(source, target, mapping) {
            Ok(column) => {
                debug!(
                    "Populated '{}' as {} from {} row(s)",
                    column.name,
                    column.datatype,
                    column.values.len()
                );
                report.populated.push(target.name.clone());
                columns.push(column);
            }
            Err(reason) => {
                if reason != SkipReason::Unmapped {
                    warn!("Leaving column '{}' empty: {reason}", target.name);
                } else {
                    debug!("No mapping for column '{}'", target.name);
                }
                report.skipped.push(ColumnFailure {
                    field: target.name.clone(),
                    reason,
                });
                columns.push(Column::empty(target.name.clone(), target.datatype, rows));
            }
        }
    }

    (Table::from_uniform(columns, rows), report)
}

fn populate(source: &Table, target: &Column, mapping: &Mapping) -> Result<Column, SkipReason> {
    let entry = mapping.get(&target.name).ok_or(SkipReason::Unmapped)?;
    let origin = source
        .column(&entry.source_column)
        .ok_or_else(|| SkipReason::UnknownSourceColumn(entry.source_column.clone()))?;

    let Some(text) = entry.transformation.as_deref() else {
        return Ok(Column::new(
            target.name.clone(),
            origin.datatype,
            origin.values.clone(),
        ));
    };

    let transform = Transform::parse(text).map_err(|err| SkipReason::UnsupportedTransformation {
        text: text.to_string(),
        detail: format!("{err:#}"),
    })?;
    let transformed = transform
        .apply_column(&origin.values)
        .map_err(|err| SkipReason::TransformFailed(format!("{err:#}")))?;
    let (datatype, values) = coerce_column(transformed, target.datatype)
        .map_err(|err| SkipReason::CoercionFailed(format!("{err:#}")))?;
    Ok(Column::new(target.name.clone(), datatype, values))
}

/// Casts transformed values to the template type.
///
/// Text template columns behave like untyped object columns: values keep the
/// type the transformation produced, and the column takes that type when it
/// is uniform.
fn coerce_column(values: Vec<Option<Value>>, target: ColumnType) -> Result<(ColumnType, Vec<Option<Value>>)> {
    if target == ColumnType::String {
        let datatype = uniform_type(&values).unwrap_or(ColumnType::String);
        return Ok((datatype, values));
    }
    let coerced = values
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value
                .map(|v| {
                    let shown = v.as_display();
                    coerce_value(v, &target).map_err(|err| {
                        err.context(format!("Row {} value '{shown}' as {target}", row + 1))
                    })
                })
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((target, coerced))
}

fn uniform_type(values: &[Option<Value>]) -> Option<ColumnType> {
    let mut types = values.iter().flatten().map(Value::column_type);
    let first = types.next()?;
    types.all(|ty| ty == first).then_some(first)
}
