//! In-memory typed tables.
//!
//! Source and template files are small enough to be read whole. Each column
//! keeps its declared [`ColumnType`] next to its values so the applier can cast
//! mapped data to the template's types.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::{Context, Result, ensure};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    data::{Value, parse_typed_value},
    io_utils,
    schema::{ColumnMeta, ColumnType, Schema, infer_schema},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datatype: ColumnType,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, datatype: ColumnType, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            datatype,
            values,
        }
    }

    /// A column holding only missing values.
    pub fn empty(name: impl Into<String>, datatype: ColumnType, rows: usize) -> Self {
        Self::new(name, datatype, vec![None; rows])
    }

    pub fn is_unpopulated(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub schema: Option<Schema>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            schema: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        for column in &columns {
            ensure!(
                column.values.len() == row_count,
                "Column '{}' has {} value(s) but the table has {} row(s)",
                column.name,
                column.values.len(),
                row_count
            );
        }
        Ok(Self { columns, row_count })
    }

    /// Assembles columns already known to hold `row_count` values each.
    pub(crate) fn from_uniform(columns: Vec<Column>, row_count: usize) -> Self {
        debug_assert!(columns.iter().all(|c| c.values.len() == row_count));
        Self { columns, row_count }
    }

    /// Builds a table from raw text rows. Column types come from `schema` when
    /// it names the column, otherwise they are inferred from the values.
    pub fn from_rows(headers: &[String], rows: &[Vec<String>], schema: Option<&Schema>) -> Result<Self> {
        let headers = dedupe_headers(headers);
        let inferred = infer_schema(&headers, rows);
        let mut columns = Vec::with_capacity(headers.len());
        for (idx, ColumnMeta { name, datatype }) in inferred.columns.into_iter().enumerate() {
            let datatype = schema
                .and_then(|s| s.datatype_of(&name))
                .unwrap_or(datatype);
            let mut values = Vec::with_capacity(rows.len());
            for (row_idx, row) in rows.iter().enumerate() {
                let raw = row.get(idx).map(String::as_str).unwrap_or_default();
                let value = parse_typed_value(raw, &datatype).with_context(|| {
                    format!("Column '{name}' row {} as {datatype}", row_idx + 2)
                })?;
                values.push(value);
            }
            columns.push(Column::new(name, datatype, values));
        }
        Ok(Self {
            columns,
            row_count: rows.len(),
        })
    }

    pub fn read_csv(path: &Path, options: &ReadOptions) -> Result<Self> {
        io_utils::ensure_input_exists(path)?;
        let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
        let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, options.encoding)
            .with_context(|| format!("Reading headers from {path:?}"))?;
        let mut rows = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
            rows.push(io_utils::decode_record(&record, options.encoding)?);
        }
        debug!(
            "Read {} row(s) across {} column(s) from {:?}",
            rows.len(),
            headers.len(),
            path
        );
        Self::from_rows(&headers, &rows, options.schema.as_ref())
            .with_context(|| format!("Typing columns of {path:?}"))
    }

    /// Writes the table without a row-index column; missing values become empty fields.
    pub fn write_csv(&self, path: &Path, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        writer
            .write_record(self.column_names())
            .with_context(|| format!("Writing headers to {path:?}"))?;
        for row in self.display_rows() {
            writer
                .write_record(&row)
                .with_context(|| format!("Writing row to {path:?}"))?;
        }
        writer.flush().with_context(|| format!("Flushing {path:?}"))?;
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn schema(&self) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .map(|c| ColumnMeta {
                    name: c.name.clone(),
                    datatype: c.datatype,
                })
                .collect(),
            schema_version: None,
        }
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        (0..self.row_count)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| {
                        c.values
                            .get(row)
                            .and_then(Option::as_ref)
                            .map(Value::as_display)
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }
}

// Blank headers become `Unnamed: N`; repeats get `.1`, `.2` suffixes.
fn dedupe_headers(headers: &[String]) -> Vec<String> {
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let base = if raw.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                raw.clone()
            };
            let mut name = base.clone();
            if taken.contains(&name) {
                let suffix = next_suffix.entry(base.clone()).or_insert(1);
                // Skip suffixes already used by a literal header.
                while taken.contains(&format!("{base}.{suffix}")) {
                    *suffix += 1;
                }
                name = format!("{base}.{suffix}");
                *suffix += 1;
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}
