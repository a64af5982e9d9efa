//! Named, closed-set column transformations.
//!
//! Transformation text from a model response is resolved to a [`Transform`]
//! and never evaluated as code. Accepted forms:
//!
//! - operator tags such as `to_float`, `strip`, `to_date(%d/%m/%Y)`,
//!   `replace(",", "")`, `scale(100)`, `round(2)`;
//! - pipelines of tags separated by `|`, applied left to right;
//! - bare builtin names (`float`, `int`, `str`, `bool`);
//! - single-argument lambdas whose body is one of a handful of recognised
//!   shapes, e.g. `lambda x: float(x)` or
//!   `lambda x: datetime.strptime(x, '%d/%m/%Y').strftime('%Y-%m-%d')`.
//!
//! Anything else is rejected as unsupported.

pub mod string_ops;

use std::{
    fmt::{self, Write as _},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, bail, ensure};
use chrono::format::{Item, StrftimeItems};
use regex::{Captures, Regex};

use crate::data::{Value, parse_boolean, parse_date_with_format, parse_float, parse_naive_date};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

const NUMBER_PATTERN: &str = r"[-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?";

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Identity,
    ToFloat,
    ToInteger,
    ToString,
    ToBool,
    Strip,
    Upper,
    Lower,
    Title,
    SnakeCase,
    ToDate {
        input: Option<String>,
        output: String,
    },
    Scale(f64),
    Round(u32),
    Replace {
        from: String,
        to: String,
    },
    Pipeline(Vec<Transform>),
}

impl Transform {
    /// Operator tags offered to the model in the mapping prompt.
    pub fn catalogue() -> &'static [&'static str] {
        &[
            "identity",
            "to_float",
            "to_int",
            "to_string",
            "to_bool",
            "strip",
            "upper",
            "lower",
            "title",
            "snake_case",
            "to_date(input_format, output_format)",
            "scale(factor)",
            "round(digits)",
            "replace(from, to)",
        ]
    }

    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = unquote(text.trim());
        ensure!(!trimmed.is_empty(), "Transformation text is empty");
        if trimmed.starts_with("lambda") {
            return parse_lambda(trimmed);
        }
        let parts = split_top_level(trimmed, '|');
        if parts.len() > 1 {
            let steps = parts
                .iter()
                .map(|part| parse_operator(part))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Transform::Pipeline(steps));
        }
        parse_operator(trimmed)
    }

    pub fn apply(&self, value: Value) -> Result<Value> {
        let result = match self {
            Transform::Identity => value,
            Transform::ToFloat => Value::Float(value.as_f64()?),
            Transform::ToInteger => Value::Integer(to_integer(&value)?),
            Transform::ToString => Value::String(value.as_display()),
            Transform::ToBool => Value::Boolean(match &value {
                Value::Boolean(b) => *b,
                Value::String(s) => parse_boolean(s)?,
                other => other.as_f64()? != 0.0,
            }),
            Transform::Strip => map_text(&value, string_ops::trim),
            Transform::Upper => map_text(&value, string_ops::uppercase),
            Transform::Lower => map_text(&value, string_ops::lowercase),
            Transform::Title => map_text(&value, string_ops::title_case),
            Transform::SnakeCase => map_text(&value, string_ops::snake_case),
            Transform::ToDate { input, output } => {
                let date = match (&value, input) {
                    (Value::Date(d), _) => *d,
                    (other, Some(format)) => parse_date_with_format(&other.as_display(), format)?,
                    (other, None) => parse_naive_date(&other.as_display())?,
                };
                let mut text = String::new();
                write!(text, "{}", date.format(output))
                    .map_err(|_| anyhow!("Cannot format {date} with '{output}'"))?;
                Value::String(text)
            }
            Transform::Scale(factor) => Value::Float(value.as_f64()? * factor),
            Transform::Round(digits) => {
                let number = value.as_f64()?;
                let factor = i32::try_from(*digits).map_or(f64::INFINITY, |d| 10f64.powi(d));
                let scaled = number * factor;
                // Past f64 precision rounding is a no-op.
                if factor.is_finite() && scaled.is_finite() {
                    Value::Float(scaled.round() / factor)
                } else {
                    Value::Float(number)
                }
            }
            Transform::Replace { from, to } => {
                let text = value.as_display();
                Value::String(string_ops::replace(&text, from, to).into_owned())
            }
            Transform::Pipeline(steps) => {
                let mut current = value;
                for step in steps {
                    current = step.apply(current)?;
                }
                current
            }
        };
        Ok(result)
    }

    /// Applies the transformation element-wise; missing values stay missing.
    pub fn apply_column(&self, values: &[Option<Value>]) -> Result<Vec<Option<Value>>> {
        values
            .iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) => self
                    .apply(v.clone())
                    .map(Some)
                    .with_context(|| format!("Applying '{self}' at row {}", row + 1)),
                None => Ok(None),
            })
            .collect()
    }
}

impl FromStr for Transform {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Transform::parse(value)
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => write!(f, "identity"),
            Transform::ToFloat => write!(f, "to_float"),
            Transform::ToInteger => write!(f, "to_int"),
            Transform::ToString => write!(f, "to_string"),
            Transform::ToBool => write!(f, "to_bool"),
            Transform::Strip => write!(f, "strip"),
            Transform::Upper => write!(f, "upper"),
            Transform::Lower => write!(f, "lower"),
            Transform::Title => write!(f, "title"),
            Transform::SnakeCase => write!(f, "snake_case"),
            Transform::ToDate {
                input: Some(input),
                output,
            } => write!(f, "to_date({input}, {output})"),
            Transform::ToDate { input: None, output } => write!(f, "to_date(auto, {output})"),
            Transform::Scale(factor) => write!(f, "scale({factor})"),
            Transform::Round(digits) => write!(f, "round({digits})"),
            Transform::Replace { from, to } => write!(f, "replace({from:?}, {to:?})"),
            Transform::Pipeline(steps) => {
                for (idx, step) in steps.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{step}")?;
                }
                Ok(())
            }
        }
    }
}

fn map_text<F>(value: &Value, op: F) -> Value
where
    F: for<'a> Fn(&'a str) -> std::borrow::Cow<'a, str>,
{
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.as_display(),
    };
    Value::String(op(&text).into_owned())
}

fn to_integer(value: &Value) -> Result<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Boolean(b) => Ok(i64::from(*b)),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(parsed) => Ok(parsed),
            Err(_) => truncate(parse_float(s)?),
        },
        other => truncate(other.as_f64()?),
    }
}

fn truncate(value: f64) -> Result<i64> {
    ensure!(value.is_finite(), "Cannot convert {value} to integer");
    Ok(value.trunc() as i64)
}

fn parse_operator(token: &str) -> Result<Transform> {
    let token = token.trim();
    let (name, args) = match token.find('(') {
        Some(open) => {
            ensure!(
                token.ends_with(')'),
                "Transformation '{token}' is missing a closing ')'"
            );
            (&token[..open], Some(&token[open + 1..token.len() - 1]))
        }
        None => (token, None),
    };
    let name = name.trim().to_ascii_lowercase();
    let args = args.map(split_args).unwrap_or_default();
    let expect_args = |range: std::ops::RangeInclusive<usize>| -> Result<()> {
        ensure!(
            range.contains(&args.len()),
            "Transformation '{name}' takes {}..={} argument(s), got {}",
            range.start(),
            range.end(),
            args.len()
        );
        Ok(())
    };

    let transform = match name.as_str() {
        "identity" | "copy" | "keep" => {
            expect_args(0..=0)?;
            Transform::Identity
        }
        "to_float" | "float" | "to_number" | "number" => {
            expect_args(0..=0)?;
            Transform::ToFloat
        }
        "to_int" | "to_integer" | "int" | "integer" => {
            expect_args(0..=0)?;
            Transform::ToInteger
        }
        "to_string" | "to_str" | "str" | "string" => {
            expect_args(0..=0)?;
            Transform::ToString
        }
        "to_bool" | "to_boolean" | "bool" => {
            expect_args(0..=0)?;
            Transform::ToBool
        }
        "strip" | "trim" => {
            expect_args(0..=0)?;
            Transform::Strip
        }
        "upper" | "uppercase" => {
            expect_args(0..=0)?;
            Transform::Upper
        }
        "lower" | "lowercase" => {
            expect_args(0..=0)?;
            Transform::Lower
        }
        "title" | "title_case" => {
            expect_args(0..=0)?;
            Transform::Title
        }
        "snake_case" | "snake" => {
            expect_args(0..=0)?;
            Transform::SnakeCase
        }
        "to_date" | "date" => {
            expect_args(0..=2)?;
            let input = args
                .first()
                .filter(|fmt| !fmt.is_empty() && !fmt.eq_ignore_ascii_case("auto"))
                .map(|fmt| date_format(fmt))
                .transpose()?;
            let output = match args.get(1) {
                Some(fmt) => date_format(fmt)?,
                None => DEFAULT_DATE_FORMAT.to_string(),
            };
            Transform::ToDate { input, output }
        }
        "scale" | "multiply" => {
            expect_args(1..=1)?;
            Transform::Scale(parse_number_arg(&args[0])?)
        }
        "divide" => {
            expect_args(1..=1)?;
            let divisor = parse_number_arg(&args[0])?;
            ensure!(divisor != 0.0, "Transformation 'divide' cannot divide by zero");
            Transform::Scale(1.0 / divisor)
        }
        "round" => {
            expect_args(0..=1)?;
            let digits = match args.first() {
                Some(raw) => raw
                    .parse::<u32>()
                    .with_context(|| format!("Invalid round digits '{raw}'"))?,
                None => 0,
            };
            Transform::Round(digits)
        }
        "replace" => {
            expect_args(2..=2)?;
            Transform::Replace {
                from: args[0].clone(),
                to: args[1].clone(),
            }
        }
        _ => bail!(
            "Unsupported transformation '{token}'. Supported operators: {}",
            Transform::catalogue().join(", ")
        ),
    };
    Ok(transform)
}

fn parse_number_arg(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("Invalid numeric argument '{raw}'"))
}

/// Rejects strftime patterns chrono cannot interpret.
fn date_format(raw: &str) -> Result<String> {
    ensure!(
        !StrftimeItems::new(raw).any(|item| matches!(item, Item::Error)),
        "Invalid date format '{raw}'"
    );
    Ok(raw.to_string())
}

fn parse_lambda(text: &str) -> Result<Transform> {
    let header = Regex::new(r"^lambda\s+([A-Za-z_]\w*)\s*:\s*(.+)$")?;
    let captures = header
        .captures(text)
        .ok_or_else(|| anyhow!("Unsupported transformation '{text}'"))?;
    let var = regex::escape(&captures[1]);
    let body = captures[2].trim().trim_end_matches(',').trim();
    recognize_lambda_body(&var, body)
        .with_context(|| format!("Unsupported transformation '{text}'"))
}

fn recognize_lambda_body(var: &str, body: &str) -> Result<Transform> {
    let operand = format!(r"(?:float\(\s*{var}\s*\)|{var})");
    let matches = |pattern: String| capture(&pattern, body);

    if matches(format!(r"^{var}$"))?.is_some() {
        return Ok(Transform::Identity);
    }
    for (func, transform) in [
        ("float", Transform::ToFloat),
        ("int", Transform::ToInteger),
        ("str", Transform::ToString),
        ("bool", Transform::ToBool),
    ] {
        if matches(format!(r"^{func}\(\s*{var}\s*\)$"))?.is_some() {
            return Ok(transform);
        }
    }
    if let Some(caps) = matches(format!(r"^(?:str\(\s*{var}\s*\)|{var})\.(strip|upper|lower|title)\(\)$"))? {
        return parse_operator(&caps[1]);
    }
    if let Some(caps) = matches(format!(r"^{var}\.replace\((.*)\)$"))? {
        return parse_operator(&format!("replace({})", &caps[1]));
    }
    if let Some(caps) = matches(format!(r"^(float|int)\(\s*{var}\.replace\((.*)\)\s*\)$"))? {
        let replace = parse_operator(&format!("replace({})", &caps[2]))?;
        let cast = parse_operator(&caps[1])?;
        return Ok(Transform::Pipeline(vec![replace, cast]));
    }
    if let Some(caps) = matches(format!(
        r"^(?:datetime\.){{0,2}}strptime\(\s*{var}\s*,\s*(.+?)\s*\)(?:\.date\(\))?(?:\.strftime\(\s*(.+?)\s*\))?$"
    ))? {
        let input = date_format(unquote(&caps[1]))?;
        let output = match caps.get(2) {
            Some(m) => date_format(unquote(m.as_str()))?,
            None => DEFAULT_DATE_FORMAT.to_string(),
        };
        return Ok(Transform::ToDate {
            input: Some(input),
            output,
        });
    }
    if matches(format!(r"^(?:pd\.)?to_datetime\(\s*{var}\s*\)(?:\.date\(\))?$"))?.is_some() {
        return Ok(Transform::ToDate {
            input: None,
            output: DEFAULT_DATE_FORMAT.to_string(),
        });
    }
    if let Some(caps) = matches(format!(r"^{operand}\s*\*\s*({NUMBER_PATTERN})$"))?
        .or(matches(format!(r"^({NUMBER_PATTERN})\s*\*\s*{operand}$"))?)
    {
        return Ok(Transform::Scale(parse_number_arg(&caps[1])?));
    }
    if let Some(caps) = matches(format!(r"^{operand}\s*/\s*({NUMBER_PATTERN})$"))? {
        let divisor = parse_number_arg(&caps[1])?;
        ensure!(divisor != 0.0, "Division by zero");
        return Ok(Transform::Scale(1.0 / divisor));
    }
    if let Some(caps) = matches(format!(r"^round\(\s*{operand}\s*(?:,\s*(\d+)\s*)?\)$"))? {
        let digits = match caps.get(1) {
            Some(m) => m.as_str().parse::<u32>()?,
            None => 0,
        };
        return Ok(Transform::Round(digits));
    }
    bail!("lambda body '{body}' does not match a supported operator")
}

fn capture<'h>(pattern: &str, body: &'h str) -> Result<Option<Captures<'h>>> {
    Ok(Regex::new(pattern)?.captures(body))
}

/// Splits on `sep` outside quotes and parentheses.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for ch in text.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '(') => {
                depth += 1;
                current.push(ch);
            }
            (None, ')') => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            (None, c) if c == sep && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

fn split_args(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    split_top_level(text, ',')
        .into_iter()
        .map(|arg| unquote(&arg).to_string())
        .collect()
}

fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}
