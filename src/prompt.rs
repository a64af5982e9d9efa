//! Prompt templates for the three mapping stages.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` produce literal braces.
//! A [`PromptSet`] is built per run, either from the built-in wording or from
//! a YAML file overriding any subset of the stages.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const CANDIDATES_VARIABLES: &[&str] = &["source_without_column_names", "template"];
pub const ASSOCIATES_VARIABLES: &[&str] = &["candidates", "columns_dict", "template"];
pub const MAPPING_VARIABLES: &[&str] = &["associates", "source", "template", "operators"];

const CANDIDATES_PROMPT: &str = "I need assistance in mapping data from a source table to template columns. \
For each column of the template, select candidate columns from the source. \
Template numeric fields should only match source columns holding numeric data of a similar order. \
Date fields should match columns containing dates. \
Data containing anything other than numbers is not numeric.

Provide a JSON object listing, for every template field, the source columns that could fill it:
\"field_name\": [source_column, ...],
...

Output must contain only JSON.

**Source Table**:
- Columns:
{source_without_column_names}
**Template Table**:
- Template Fields:
{template}";

const ASSOCIATES_PROMPT: &str = "For each field in Output, replace every value in its list using Dictionary.

Then, for each field, select the single most relevant candidate based on the examples, \
data length and column names of the source and template tables.

**Output**:
{candidates}

**Dictionary**:
{columns_dict}

**Template Table**:
- Template Fields:
{template}
The output must be a JSON object in the format:
\"field_name\": \"source_column_name\",
...

Output must contain only JSON.";

const MAPPING_PROMPT: &str = "Output matches each field of the template table with a column of the source table.

For each field in Output choose a transformation that converts the source column into the template field. \
Assume date columns in the source are text and numeric columns are floating point. \
Use only these operators, optionally chained with `|`, or null when the values can be copied as they are:
{operators}

The output must be a JSON object in the format:
{{
  \"field_name\": {{\"source_column\": \"source_column_name\", \"transformation\": \"operator\" or null}},
  ...
}}

Output must contain only JSON.

**Output**:
{associates}

**Source Table**:
- Columns:
{source}
**Template Table**:
- Template Fields:
{template}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptSet {
    pub candidates: String,
    pub associates: String,
    pub mapping: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            candidates: CANDIDATES_PROMPT.to_string(),
            associates: ASSOCIATES_PROMPT.to_string(),
            mapping: MAPPING_PROMPT.to_string(),
        }
    }
}

impl PromptSet {
    /// Loads overrides from YAML; stages missing from the file keep the
    /// built-in wording.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading prompt file {path:?}"))?;
        let prompts: PromptSet = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing prompt YAML {path:?}"))?;
        prompts.validate()?;
        Ok(prompts)
    }

    /// Checks that each stage only references variables available to it.
    pub fn validate(&self) -> Result<()> {
        for (stage, template, allowed) in [
            ("candidates", &self.candidates, CANDIDATES_VARIABLES),
            ("associates", &self.associates, ASSOCIATES_VARIABLES),
            ("mapping", &self.mapping, MAPPING_VARIABLES),
        ] {
            for name in placeholders(template).with_context(|| format!("Prompt '{stage}'"))? {
                if !allowed.contains(&name.as_str()) {
                    bail!(
                        "Prompt '{stage}' references unknown variable '{name}' (available: {})",
                        allowed.join(", ")
                    );
                }
            }
        }
        Ok(())
    }
}

enum Token<'a> {
    Text(&'a str),
    Variable(&'a str),
}

fn tokenize(template: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            tokens.push(Token::Text(&rest[..pos]));
        }
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            tokens.push(Token::Text("{"));
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            tokens.push(Token::Text("}"));
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            bail!("Unmatched '}}' in prompt template");
        } else {
            let close = tail
                .find('}')
                .context("Unclosed '{' in prompt template")?;
            let name = tail[1..close].trim();
            if name.is_empty() || name.contains('{') {
                bail!("Malformed placeholder '{}'", &tail[..=close]);
            }
            tokens.push(Token::Variable(name));
            rest = &tail[close + 1..];
        }
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    Ok(tokens)
}

/// Names of the placeholders used by `template`, in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<String>> {
    Ok(tokenize(template)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Variable(name) => Some(name.to_string()),
            Token::Text(_) => None,
        })
        .collect())
}

/// Substitutes every placeholder. A placeholder without a value is an error.
pub fn render(template: &str, variables: &BTreeMap<&str, String>) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    for token in tokenize(template)? {
        match token {
            Token::Text(text) => rendered.push_str(text),
            Token::Variable(name) => {
                let value = variables
                    .get(name)
                    .with_context(|| format!("No value for prompt variable '{name}'"))?;
                rendered.push_str(value);
            }
        }
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_and_unescapes() {
        let mut vars = BTreeMap::new();
        vars.insert("name", "Amount".to_string());
        let out = render("{{\"{name}\": {name}}}", &vars).unwrap();
        assert_eq!(out, "{\"Amount\": Amount}");
    }

    #[test]
    fn render_reports_missing_variable() {
        let err = render("{missing}", &BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn default_prompts_only_use_stage_variables() {
        PromptSet::default().validate().unwrap();
        assert_eq!(
            placeholders(&PromptSet::default().associates).unwrap(),
            vec!["candidates", "columns_dict", "template"]
        );
    }

    #[test]
    fn validate_rejects_foreign_variables() {
        let prompts = PromptSet {
            candidates: "{source}".into(),
            ..PromptSet::default()
        };
        let err = prompts.validate().unwrap_err();
        assert!(err.to_string().contains("unknown variable 'source'"));
    }

    #[test]
    fn load_keeps_defaults_for_missing_stages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.yaml");
        std::fs::write(&path, "candidates: \"Pick columns for {template}\"\n").unwrap();
        let prompts = PromptSet::load(&path).unwrap();
        assert_eq!(prompts.candidates, "Pick columns for {template}");
        assert_eq!(prompts.mapping, PromptSet::default().mapping);
    }
}
