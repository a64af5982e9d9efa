//! Natural-language table descriptions used to build prompts.
//!
//! Each column renders as `<name> (Examples: v1, v2)`, where the examples are
//! the first two distinct non-missing values in row order. Anonymized
//! descriptions replace names with positional indices so the model has to
//! judge columns on their data alone.

use std::{collections::BTreeMap, fmt::Write as _};

use itertools::Itertools;

use crate::{
    data::Value,
    dataset::{Column, Table},
};

const EXAMPLE_COUNT: usize = 2;

pub fn column_examples(column: &Column) -> Vec<String> {
    column
        .values
        .iter()
        .flatten()
        .map(Value::as_display)
        .unique()
        .take(EXAMPLE_COUNT)
        .collect()
}

pub fn describe_column(column: &Column, label: &str) -> String {
    let examples = column_examples(column);
    if examples.is_empty() {
        label.to_string()
    } else {
        format!("{label} (Examples: {})", examples.join(", "))
    }
}

pub fn describe(table: &Table, anonymize: bool) -> String {
    let mut description = String::new();
    for (idx, column) in table.columns().iter().enumerate() {
        let label = if anonymize {
            idx.to_string()
        } else {
            column.name.clone()
        };
        let _ = writeln!(description, "\t- {}", describe_column(column, &label));
    }
    description
}

pub fn describe_by_index(table: &Table) -> BTreeMap<usize, String> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (idx, describe_column(column, &column.name)))
        .collect()
}

/// Renders [`describe_by_index`] as a JSON object for the association prompt.
pub fn columns_dictionary(table: &Table) -> String {
    let entries = describe_by_index(table)
        .into_iter()
        .map(|(idx, text)| (idx.to_string(), serde_json::Value::String(text)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::to_string_pretty(&serde_json::Value::Object(entries))
        .unwrap_or_else(|_| String::from("{}"))
}
