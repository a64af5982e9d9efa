use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    apply::{ApplyReport, SkipReason},
    mapping::Mapping,
};

const MAPPING_HEADERS: [&str; 4] = ["field", "source_column", "transformation", "status"];

/// Renders the mapping as an aligned table, one line per template field.
pub fn render_mapping(template_fields: &[&str], mapping: &Mapping, report: &ApplyReport) -> String {
    let headers = MAPPING_HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    let rows = template_fields
        .iter()
        .map(|field| {
            let entry = mapping.get(*field);
            let status = match report.skipped.iter().find(|f| f.field == *field) {
                None => "mapped".to_string(),
                Some(failure) if failure.reason == SkipReason::Unmapped => "unmapped".to_string(),
                Some(failure) => format!("skipped: {}", failure.reason),
            };
            vec![
                field.to_string(),
                entry.map(|e| e.source_column.clone()).unwrap_or_default(),
                entry
                    .and_then(|e| e.transformation.clone())
                    .unwrap_or_else(|| "-".to_string()),
                status,
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths.iter().map(|w| "-".repeat((*w).max(3))).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&sanitized));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
