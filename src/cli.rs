use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{config::DEFAULT_CREDENTIALS_FILE, mapping::ParseMode};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Map an arbitrary CSV file onto a template schema with an LLM",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ask the model for a column mapping and write the source under the template's columns
    Map(MapArgs),
    /// Apply a saved model response to the source without contacting the model
    Apply(ApplyArgs),
    /// Print the description of a table as it is sent to the model
    Describe(DescribeArgs),
    /// Infer column types of a CSV file into a YAML schema usable as --template-schema
    Infer(InferArgs),
}

/// Options shared by every command that reads a source and a template.
#[derive(Debug, Args)]
pub struct TableArgs {
    /// Source CSV file whose columns are mapped
    #[arg(long, default_value = "data/table_B.csv")]
    pub source: PathBuf,
    /// Template CSV file defining the output columns and their types
    #[arg(long, default_value = "data/template.csv")]
    pub template: PathBuf,
    /// Destination CSV file for the mapped table
    #[arg(long, default_value = "data/target.csv")]
    pub target: PathBuf,
    /// YAML schema declaring template column types (see `infer`)
    #[arg(long = "template-schema")]
    pub template_schema: Option<PathBuf>,
    /// How strictly to read the model's mapping response
    #[arg(long = "parse-mode", value_enum, default_value_t = ParseMode::Auto)]
    pub parse_mode: ParseMode,
    /// Write the parsed mapping as JSON to this path
    #[arg(long = "save-mapping")]
    pub save_mapping: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Only report errors and warnings
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub tables: TableArgs,
    /// JSON file holding OPENAI_API_KEY and optional model settings
    #[arg(long, default_value = DEFAULT_CREDENTIALS_FILE)]
    pub credentials: PathBuf,
    /// Model name, overriding the credentials file
    #[arg(long)]
    pub model: Option<String>,
    /// Base URL of an OpenAI-compatible API, overriding the credentials file
    #[arg(long = "base-url")]
    pub base_url: Option<String>,
    /// YAML file overriding the stage prompts (`candidates`, `associates`, `mapping`)
    #[arg(long)]
    pub prompts: Option<PathBuf>,
    /// Save the model's final response to this path
    #[arg(long = "save-response")]
    pub save_response: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub tables: TableArgs,
    /// File holding a model response, as written by `map --save-response`
    #[arg(long)]
    pub response: PathBuf,
}

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// CSV file to describe
    #[arg(short, long)]
    pub input: PathBuf,
    /// Replace column names with their positions
    #[arg(long)]
    pub anonymize: bool,
    /// Print the index-to-description dictionary as JSON instead
    #[arg(long = "by-index", conflicts_with = "anonymize")]
    pub by_index: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// CSV file to inspect
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination YAML schema file (printed to stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
