//! The three-stage prompt chain.
//!
//! Each stage renders its prompt from the table descriptions and the previous
//! stage's response, then asks the backend for a completion. Only the final
//! `mapping` response is parsed; the intermediate responses are kept for
//! inspection.

use std::{collections::BTreeMap, fmt};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    dataset::Table,
    describe::{columns_dictionary, describe},
    llm::LlmClient,
    prompt::{PromptSet, render},
    transform::Transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Candidates,
    Associates,
    Mapping,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Candidates, Stage::Associates, Stage::Mapping];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Candidates => "candidates",
            Stage::Associates => "associates",
            Stage::Mapping => "mapping",
        }
    }

    fn template<'a>(&self, prompts: &'a PromptSet) -> &'a str {
        match self {
            Stage::Candidates => &prompts.candidates,
            Stage::Associates => &prompts.associates,
            Stage::Mapping => &prompts.mapping,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Prompt variables derived from the two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainInputs {
    pub source_without_column_names: String,
    pub columns_dict: String,
    pub source: String,
    pub template: String,
}

impl ChainInputs {
    pub fn from_tables(source: &Table, template: &Table) -> Self {
        Self {
            source_without_column_names: describe(source, true),
            columns_dict: columns_dictionary(source),
            source: describe(source, false),
            template: describe(template, false),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutput {
    pub candidates: String,
    pub associates: String,
    pub mapping: String,
}

pub struct PromptChain<'a> {
    prompts: &'a PromptSet,
    client: &'a dyn LlmClient,
}

impl<'a> PromptChain<'a> {
    pub fn new(prompts: &'a PromptSet, client: &'a dyn LlmClient) -> Self {
        Self { prompts, client }
    }

    pub fn run(&self, inputs: &ChainInputs) -> Result<ChainOutput> {
        let mut variables: BTreeMap<&str, String> = BTreeMap::new();
        variables.insert("source_without_column_names", inputs.source_without_column_names.clone());
        variables.insert("columns_dict", inputs.columns_dict.clone());
        variables.insert("source", inputs.source.clone());
        variables.insert("template", inputs.template.clone());
        variables.insert("operators", operator_list());

        let mut output = ChainOutput::default();
        for stage in Stage::ALL {
            let response = self.run_stage(stage, &variables)?;
            variables.insert(stage.name(), response.clone());
            match stage {
                Stage::Candidates => output.candidates = response,
                Stage::Associates => output.associates = response,
                Stage::Mapping => output.mapping = response,
            }
        }
        Ok(output)
    }

    fn run_stage(&self, stage: Stage, variables: &BTreeMap<&str, String>) -> Result<String> {
        let prompt = render(stage.template(self.prompts), variables)
            .with_context(|| format!("Rendering '{stage}' prompt"))?;
        info!("Running '{stage}' stage with model {}", self.client.model_name());
        debug!("'{stage}' prompt:\n{prompt}");
        let response = self
            .client
            .complete(&prompt)
            .with_context(|| format!("LLM request for '{stage}' stage failed"))?;
        debug!("'{stage}' response:\n{response}");
        Ok(response)
    }
}

fn operator_list() -> String {
    Transform::catalogue()
        .iter()
        .map(|op| format!("\t- {op}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::llm::LlmError;

    struct Echo {
        prompts: RefCell<Vec<String>>,
    }

    impl LlmClient for Echo {
        fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            let mut seen = self.prompts.borrow_mut();
            seen.push(prompt.to_string());
            Ok(format!("response {}", seen.len()))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[test]
    fn each_stage_sees_the_previous_response() {
        let prompts = PromptSet {
            candidates: "C {template}".into(),
            associates: "A {candidates} {columns_dict}".into(),
            mapping: "M {associates} {source}".into(),
        };
        let client = Echo {
            prompts: RefCell::new(Vec::new()),
        };
        let inputs = ChainInputs {
            source_without_column_names: "anon".into(),
            columns_dict: "dict".into(),
            source: "src".into(),
            template: "tpl".into(),
        };
        let output = PromptChain::new(&prompts, &client).run(&inputs).unwrap();
        assert_eq!(
            *client.prompts.borrow(),
            vec!["C tpl", "A response 1 dict", "M response 2 src"]
        );
        assert_eq!(output.mapping, "response 3");
        assert_eq!(output.candidates, "response 1");
    }
}
