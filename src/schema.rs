//! Column types, type inference, and YAML schema persistence.
//!
//! A [`Schema`] lists column names with their declared [`ColumnType`]. Schemas
//! are either inferred from the raw text of a table or loaded from YAML, which
//! lets a template declare types (such as `date`) that inference never picks.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::data::{parse_float, parse_integer};

const CURRENT_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "integer", "float", "boolean", "date"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "str" | "text" | "object" => Ok(ColumnType::String),
            "integer" | "int" | "int64" => Ok(ColumnType::Integer),
            "float" | "double" | "float64" | "number" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub datatype: ColumnType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<ColumnMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

impl Schema {
    pub fn from_headers(headers: &[String]) -> Self {
        let columns = headers
            .iter()
            .map(|name| ColumnMeta {
                name: name.clone(),
                datatype: ColumnType::String,
            })
            .collect();
        Schema {
            columns,
            schema_version: None,
        }
    }

    pub fn datatype_of(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.datatype)
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: Schema = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        Ok(schema)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, &self.versioned()).context("Writing schema YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.versioned()).context("Serializing schema to YAML string")
    }

    fn versioned(&self) -> Schema {
        let mut schema = self.clone();
        if schema.schema_version.is_none() {
            schema.schema_version = Some(CURRENT_SCHEMA_VERSION.to_string());
        }
        schema
    }
}

#[derive(Debug, Default)]
struct TypeCandidate {
    non_empty: usize,
    boolean_matches: usize,
    integer_matches: usize,
    float_matches: usize,
}

impl TypeCandidate {
    fn update(&mut self, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        self.non_empty += 1;
        if is_boolean_literal(value) {
            self.boolean_matches += 1;
        }
        if parse_integer(value).is_ok() {
            self.integer_matches += 1;
        }
        if parse_float(value).is_ok() {
            self.float_matches += 1;
        }
    }

    // Every non-empty value must agree; a single stray token keeps the column textual.
    fn decide(&self) -> ColumnType {
        if self.non_empty == 0 {
            ColumnType::String
        } else if self.boolean_matches == self.non_empty {
            ColumnType::Boolean
        } else if self.integer_matches == self.non_empty {
            ColumnType::Integer
        } else if self.float_matches == self.non_empty {
            ColumnType::Float
        } else {
            ColumnType::String
        }
    }
}

// Only literal words count; 1/0 columns stay integers.
fn is_boolean_literal(value: &str) -> bool {
    matches!(
        value.trim(),
        "True" | "False" | "true" | "false" | "TRUE" | "FALSE"
    )
}

/// Infers one column type from its raw text values.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidate = TypeCandidate::default();
    for value in values {
        candidate.update(value);
    }
    candidate.decide()
}

/// Infers a schema from headers and row-major raw values.
pub fn infer_schema(headers: &[String], rows: &[Vec<String>]) -> Schema {
    let columns = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnMeta {
            name: name.clone(),
            datatype: infer_column_type(
                rows.iter()
                    .map(|row| row.get(idx).map(String::as_str).unwrap_or_default()),
            ),
        })
        .collect();
    Schema {
        columns,
        schema_version: None,
    }
}
