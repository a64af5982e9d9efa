//! One mapping run: load both tables, ask the model, apply its answer.

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    apply::{ApplyReport, apply_with_report},
    chain::{ChainInputs, PromptChain},
    dataset::{ReadOptions, Table},
    io_utils,
    llm::LlmClient,
    mapping::{self, Mapping, ParseMode},
    prompt::PromptSet,
    schema::Schema,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: PathBuf,
    pub template: PathBuf,
    pub target: PathBuf,
    pub parse_mode: ParseMode,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub template_schema: Option<PathBuf>,
    pub save_response: Option<PathBuf>,
    pub save_mapping: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(source: impl Into<PathBuf>, template: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            template: template.into(),
            target: target.into(),
            parse_mode: ParseMode::default(),
            delimiter: None,
            encoding: encoding_rs::UTF_8,
            template_schema: None,
            save_response: None,
            save_mapping: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub mapping: Mapping,
    pub report: ApplyReport,
    pub rows: usize,
    pub target: PathBuf,
}

pub struct Pipeline {
    config: PipelineConfig,
    source: Table,
    template: Table,
}

impl Pipeline {
    /// Reads both tables. Both paths are checked before either is parsed so a
    /// missing file is reported without side effects.
    pub fn load(config: PipelineConfig) -> Result<Self> {
        io_utils::ensure_input_exists(&config.source)?;
        io_utils::ensure_input_exists(&config.template)?;

        let source = Table::read_csv(
            &config.source,
            &ReadOptions {
                delimiter: config.delimiter,
                encoding: config.encoding,
                schema: None,
            },
        )
        .with_context(|| format!("Loading source table {:?}", config.source))?;

        let template_schema = config
            .template_schema
            .as_deref()
            .map(|path| {
                Schema::load(path).with_context(|| format!("Loading template schema {path:?}"))
            })
            .transpose()?;
        let template = Table::read_csv(
            &config.template,
            &ReadOptions {
                delimiter: config.delimiter,
                encoding: config.encoding,
                schema: template_schema,
            },
        )
        .with_context(|| format!("Loading template table {:?}", config.template))?;

        info!(
            "Loaded source {:?} ({} row(s), {} column(s)) and template {:?} ({} field(s))",
            config.source,
            source.row_count(),
            source.columns().len(),
            config.template,
            template.columns().len()
        );
        Ok(Self {
            config,
            source,
            template,
        })
    }

    pub fn from_tables(config: PipelineConfig, source: Table, template: Table) -> Self {
        Self {
            config,
            source,
            template,
        }
    }

    pub fn source(&self) -> &Table {
        &self.source
    }

    pub fn template(&self) -> &Table {
        &self.template
    }

    /// Builds the prompt variables. An empty source leaves nothing to match.
    pub fn prepare_inputs(&self) -> Result<ChainInputs> {
        ensure!(
            !self.source.is_empty(),
            "Source table {:?} is empty; there is nothing to map",
            self.config.source
        );
        let inputs = ChainInputs::from_tables(&self.source, &self.template);
        debug!(
            "Source columns:\n{}Template fields:\n{}",
            inputs.source, inputs.template
        );
        Ok(inputs)
    }

    /// Runs the prompt chain and applies its final response.
    pub fn run(&self, client: &dyn LlmClient, prompts: &PromptSet) -> Result<PipelineOutcome> {
        let inputs = self.prepare_inputs()?;
        let output = PromptChain::new(prompts, client).run(&inputs)?;
        if let Some(path) = &self.config.save_response {
            std::fs::write(path, &output.mapping)
                .with_context(|| format!("Saving model response to {path:?}"))?;
            info!("Model response saved to {path:?}");
        }
        self.finish(&output.mapping)
    }

    /// Parses `response`, applies it and writes the target file.
    pub fn finish(&self, response: &str) -> Result<PipelineOutcome> {
        ensure!(
            !self.source.is_empty(),
            "Source table {:?} is empty; there is nothing to map",
            self.config.source
        );
        let mapping = mapping::read_mapping(
            response,
            self.config.parse_mode,
            &self.source,
            &self.template,
        )
        .with_context(|| format!("Reading mapping in {} mode", self.config.parse_mode))?;
        info!("Parsed mapping for {} field(s)", mapping.len());
        debug!("Mapping instructions:\n{}", mapping::to_json(&mapping));

        if let Some(path) = &self.config.save_mapping {
            std::fs::write(path, mapping::to_json(&mapping))
                .with_context(|| format!("Saving mapping to {path:?}"))?;
        }

        let (output, report) = apply_with_report(&self.source, &self.template, &mapping);
        ensure!(
            output.row_count() == self.source.row_count(),
            "Output has {} row(s) but the source has {}",
            output.row_count(),
            self.source.row_count()
        );

        let delimiter = io_utils::resolve_output_delimiter(
            &self.config.target,
            self.config.delimiter,
            io_utils::DEFAULT_CSV_DELIMITER,
        );
        output
            .write_csv(&self.config.target, delimiter)
            .with_context(|| format!("Writing target table {:?}", self.config.target))?;
        info!(
            "Wrote {} row(s) with {} of {} field(s) populated to {:?}",
            output.row_count(),
            report.populated.len(),
            self.template.columns().len(),
            self.config.target
        );

        Ok(PipelineOutcome {
            mapping,
            report,
            rows: output.row_count(),
            target: self.config.target.clone(),
        })
    }
}
