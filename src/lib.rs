pub mod apply;
pub mod chain;
pub mod cli;
pub mod config;
pub mod data;
pub mod dataset;
pub mod describe;
pub mod io_utils;
pub mod llm;
pub mod mapping;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod table;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{ApplyArgs, Cli, Commands, DescribeArgs, InferArgs, MapArgs, TableArgs},
    config::{LlmConfig, LlmOverrides},
    dataset::{ReadOptions, Table},
    llm::OpenAiClient,
    pipeline::{Pipeline, PipelineConfig, PipelineOutcome},
    prompt::PromptSet,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(quiet: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if quiet {
                LevelFilter::Warn
            } else {
                LevelFilter::Info
            };
            builder.filter_module("table_mapper", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let quiet = match &cli.command {
        Commands::Map(args) => args.tables.quiet,
        Commands::Apply(args) => args.tables.quiet,
        Commands::Describe(_) | Commands::Infer(_) => false,
    };
    init_logging(quiet);
    match cli.command {
        Commands::Map(args) => handle_map(&args),
        Commands::Apply(args) => handle_apply(&args),
        Commands::Describe(args) => handle_describe(&args),
        Commands::Infer(args) => handle_infer(&args),
    }
}

fn pipeline_config(args: &TableArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::new(&args.source, &args.template, &args.target);
    config.parse_mode = args.parse_mode;
    config.delimiter = args.delimiter;
    config.encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    config.template_schema = args.template_schema.clone();
    config.save_mapping = args.save_mapping.clone();
    Ok(config)
}

fn handle_map(args: &MapArgs) -> Result<()> {
    let mut config = pipeline_config(&args.tables)?;
    config.save_response = args.save_response.clone();
    let pipeline = Pipeline::load(config)?;

    let prompts = match &args.prompts {
        Some(path) => {
            PromptSet::load(path).with_context(|| format!("Loading prompts from {path:?}"))?
        }
        None => PromptSet::default(),
    };
    let overrides = LlmOverrides {
        model: args.model.clone(),
        base_url: args.base_url.clone(),
    };
    let llm_config = LlmConfig::load(&args.credentials, &overrides)?;
    let client = OpenAiClient::from_config(&llm_config).context("Creating LLM client")?;
    info!(
        "Mapping {:?} onto {:?} with {} in {} mode",
        args.tables.source, args.tables.template, llm_config.model, args.tables.parse_mode
    );

    let outcome = pipeline.run(&client, &prompts)?;
    report_outcome(&pipeline, &outcome, args.tables.quiet);
    Ok(())
}

fn handle_apply(args: &ApplyArgs) -> Result<()> {
    let config = pipeline_config(&args.tables)?;
    io_utils::ensure_input_exists(&args.response)?;
    let pipeline = Pipeline::load(config)?;
    let response = io_utils::read_text(&args.response, encoding_rs::UTF_8)
        .with_context(|| format!("Reading model response {:?}", args.response))?;
    info!("Applying saved response {:?}", args.response);
    let outcome = pipeline.finish(&response)?;
    report_outcome(&pipeline, &outcome, args.tables.quiet);
    Ok(())
}

fn report_outcome(pipeline: &Pipeline, outcome: &PipelineOutcome, quiet: bool) {
    if quiet {
        return;
    }
    let fields = pipeline.template().column_names();
    println!("Mapping instructions:\n");
    print!(
        "{}",
        table::render_mapping(&fields, &outcome.mapping, &outcome.report)
    );
    println!("\nTarget table is saved at {}", outcome.target.display());
}

fn read_table(
    input: &std::path::Path,
    delimiter: Option<u8>,
    encoding: Option<&str>,
) -> Result<Table> {
    let options = ReadOptions {
        delimiter,
        encoding: io_utils::resolve_encoding(encoding)?,
        schema: None,
    };
    Table::read_csv(input, &options).with_context(|| format!("Reading {input:?}"))
}

fn handle_describe(args: &DescribeArgs) -> Result<()> {
    let table = read_table(&args.input, args.delimiter, args.input_encoding.as_deref())?;
    if args.by_index {
        println!("{}", describe::columns_dictionary(&table));
    } else {
        print!("{}", describe::describe(&table, args.anonymize));
    }
    Ok(())
}

fn handle_infer(args: &InferArgs) -> Result<()> {
    let table = read_table(&args.input, args.delimiter, args.input_encoding.as_deref())?;
    let schema = table.schema();
    match &args.output {
        Some(path) => {
            schema
                .save(path)
                .with_context(|| format!("Writing schema to {path:?}"))?;
            info!(
                "Inferred schema for {} column(s) written to {:?}",
                schema.columns.len(),
                path
            );
        }
        None => print!("{}", schema.to_yaml_string()?),
    }
    Ok(())
}
