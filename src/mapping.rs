//! Mapping instructions extracted from the model's final response.
//!
//! Two readers exist. [`parse_response`] is the tolerant line scanner: it looks
//! for `"field": "source_column", transformation` triples and silently skips
//! everything else. [`parse_structured`] expects a JSON object and reports the
//! first entry that does not fit. [`ParseMode`] picks between them per run.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::OnceLock};

use anyhow::anyhow;
use clap::ValueEnum;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::Table;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source_column: String,
    #[serde(default)]
    pub transformation: Option<String>,
}

impl MappingEntry {
    pub fn new(source_column: impl Into<String>, transformation: Option<&str>) -> Self {
        Self {
            source_column: source_column.into(),
            transformation: transformation.map(str::to_string),
        }
    }
}

/// Template field name to mapping entry. At most one entry per field.
pub type Mapping = BTreeMap<String, MappingEntry>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Response does not contain a JSON object")]
    MissingJson,

    #[error("Response JSON is malformed: {0}")]
    MalformedJson(String),

    #[error("Mapping for field '{field}' is invalid: {reason}")]
    InvalidEntry { field: String, reason: String },

    #[error("Mapping names unknown template field '{0}'")]
    UnknownField(String),

    #[error("Mapping for field '{field}' names unknown source column '{column}'")]
    UnknownSourceColumn { field: String, column: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ParseMode {
    /// Scan for quoted triples line by line, skipping anything else
    Lenient,
    /// Use the JSON object when the response holds one, otherwise scan lines
    #[default]
    Auto,
    /// Require a well-formed JSON object naming existing fields and columns
    Strict,
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParseMode::Lenient => "lenient",
            ParseMode::Auto => "auto",
            ParseMode::Strict => "strict",
        };
        write!(f, "{label}")
    }
}

impl FromStr for ParseMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        <ParseMode as ValueEnum>::from_str(value, true).map_err(|err| anyhow!(err))
    }
}

fn triple_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""([^"\n]*)": *"([^"\n]*)", *["']?([^\n]*)["']?,?\n"#)
            .expect("triple pattern is a valid regex")
    })
}

fn normalize_transformation(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    text = text.strip_suffix(',').unwrap_or(text).trim_end();
    text = text.trim_matches(|c| c == '"' || c == '\'').trim();
    match text {
        "" | "None" | "none" | "null" | "Null" | "NULL" => None,
        other => Some(other.to_string()),
    }
}

/// Tolerant scan of `"field": "source_column", transformation` lines.
///
/// Never fails. Lines that do not match are skipped, and a field named twice
/// keeps its last occurrence.
pub fn parse_response(response: &str) -> Mapping {
    let mut text = response.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    let mut mapping = Mapping::new();
    for captures in triple_pattern().captures_iter(&text) {
        let field = captures[1].to_string();
        let entry = MappingEntry {
            source_column: captures[2].to_string(),
            transformation: normalize_transformation(&captures[3]),
        };
        if let Some(previous) = mapping.insert(field.clone(), entry) {
            debug!("Field '{field}' restated; dropping earlier entry {previous:?}");
        }
    }
    mapping
}

/// Returns the outermost `{ ... }` span, ignoring markdown fences and prose.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Strict read of a JSON mapping object.
///
/// Accepts `{"field": {"source_column": "...", "transformation": "..."|null}}`
/// and the shorthand `{"field": "source_column"}`.
pub fn parse_structured(response: &str) -> Result<Mapping, MappingError> {
    let json = extract_json_object(response).ok_or(MappingError::MissingJson)?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|err| MappingError::MalformedJson(err.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| MappingError::MalformedJson("top level is not an object".to_string()))?;

    let mut mapping = Mapping::new();
    for (field, entry) in object {
        let invalid = |reason: &str| MappingError::InvalidEntry {
            field: field.clone(),
            reason: reason.to_string(),
        };
        let parsed = match entry {
            serde_json::Value::String(column) => MappingEntry::new(column.as_str(), None),
            serde_json::Value::Object(fields) => {
                let source_column = fields
                    .get("source_column")
                    .ok_or_else(|| invalid("missing 'source_column'"))?
                    .as_str()
                    .ok_or_else(|| invalid("'source_column' must be a string"))?;
                let transformation = match fields.get("transformation") {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(text)) => normalize_transformation(text),
                    Some(_) => return Err(invalid("'transformation' must be a string or null")),
                };
                MappingEntry {
                    source_column: source_column.to_string(),
                    transformation,
                }
            }
            _ => return Err(invalid("expected an object or a column name")),
        };
        ensure_entry_shape(field, &parsed)?;
        mapping.insert(field.clone(), parsed);
    }
    Ok(mapping)
}

fn ensure_entry_shape(field: &str, entry: &MappingEntry) -> Result<(), MappingError> {
    if field.trim().is_empty() {
        return Err(MappingError::InvalidEntry {
            field: field.to_string(),
            reason: "field name is empty".to_string(),
        });
    }
    if entry.source_column.trim().is_empty() {
        return Err(MappingError::InvalidEntry {
            field: field.to_string(),
            reason: "source column is empty".to_string(),
        });
    }
    Ok(())
}

/// Checks that every entry names a template field and a source column.
pub fn validate_against(
    mapping: &Mapping,
    source: &Table,
    template: &Table,
) -> Result<(), MappingError> {
    for (field, entry) in mapping {
        if template.column(field).is_none() {
            return Err(MappingError::UnknownField(field.clone()));
        }
        if source.column(&entry.source_column).is_none() {
            return Err(MappingError::UnknownSourceColumn {
                field: field.clone(),
                column: entry.source_column.clone(),
            });
        }
    }
    Ok(())
}

/// Reads the model response according to `mode`.
pub fn read_mapping(
    response: &str,
    mode: ParseMode,
    source: &Table,
    template: &Table,
) -> Result<Mapping, MappingError> {
    match mode {
        ParseMode::Lenient => Ok(parse_response(response)),
        ParseMode::Strict => {
            let mapping = parse_structured(response)?;
            validate_against(&mapping, source, template)?;
            Ok(mapping)
        }
        ParseMode::Auto => match parse_structured(response) {
            Ok(mapping) => Ok(mapping),
            Err(err) => {
                warn!("Structured mapping unavailable ({err}); falling back to line scan");
                Ok(parse_response(response))
            }
        },
    }
}

/// Pretty JSON form, as written by `map --save-mapping`.
pub fn to_json(mapping: &Mapping) -> String {
    serde_json::to_string_pretty(mapping).unwrap_or_else(|_| String::from("{}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_reads_triples_and_normalizes_none() {
        let response = r#"{
"Date": "order_date", None,
"Amount": "amt", "float",
}"#;
        let mapping = parse_response(response);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["Date"], MappingEntry::new("order_date", None));
        assert_eq!(mapping["Amount"], MappingEntry::new("amt", Some("float")));
    }

    #[test]
    fn parse_response_matches_final_line_without_newline() {
        let mapping = parse_response(r#""Name": "full_name", lambda x: x.strip()"#);
        assert_eq!(
            mapping["Name"],
            MappingEntry::new("full_name", Some("lambda x: x.strip()"))
        );
    }

    #[test]
    fn parse_response_strips_trailing_quote_and_comma() {
        let mapping = parse_response("\"Total\": \"sum\", \"lambda x: float(x)\",\n");
        assert_eq!(
            mapping["Total"].transformation.as_deref(),
            Some("lambda x: float(x)")
        );
    }

    #[test]
    fn parse_structured_accepts_object_and_shorthand_entries() {
        let response = r#"Here you go:
```json
{"Date": {"source_column": "order_date", "transformation": null},
 "Amount": {"source_column": "amt", "transformation": "to_float"},
 "City": "town"}
```"#;
        let mapping = parse_structured(response).unwrap();
        assert_eq!(mapping["Date"], MappingEntry::new("order_date", None));
        assert_eq!(mapping["Amount"], MappingEntry::new("amt", Some("to_float")));
        assert_eq!(mapping["City"], MappingEntry::new("town", None));
    }

    #[test]
    fn parse_structured_names_the_bad_field() {
        let err = parse_structured(r#"{"Amount": {"transformation": "to_float"}}"#).unwrap_err();
        assert_eq!(
            err,
            MappingError::InvalidEntry {
                field: "Amount".into(),
                reason: "missing 'source_column'".into()
            }
        );
        assert_eq!(
            parse_structured("no json here").unwrap_err(),
            MappingError::MissingJson
        );
    }

    #[test]
    fn parse_mode_parses_from_cli_tokens() {
        assert_eq!("strict".parse::<ParseMode>().unwrap(), ParseMode::Strict);
        assert_eq!("LENIENT".parse::<ParseMode>().unwrap(), ParseMode::Lenient);
        assert!("sloppy".parse::<ParseMode>().is_err());
    }
}
