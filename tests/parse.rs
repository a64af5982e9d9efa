use std::collections::BTreeMap;

use proptest::prelude::*;
use table_mapper::{
    dataset::Table,
    mapping::{
        MappingEntry, MappingError, ParseMode, parse_response, parse_structured, read_mapping,
    },
};

fn tables() -> (Table, Table) {
    let source = Table::from_rows(
        &["order_date".to_string(), "amt".to_string()],
        &[vec!["2024-01-01".to_string(), "10.5".to_string()]],
        None,
    )
    .expect("source");
    let template =
        Table::from_rows(&["Date".to_string(), "Amount".to_string()], &[], None).expect("template");
    (source, template)
}

#[test]
fn text_without_triples_yields_empty_mapping() {
    assert!(parse_response("").is_empty());
    assert!(parse_response("I could not find any matching columns.").is_empty());
    assert!(parse_response("{\"Date\": [\"order_date\"]}").is_empty());
}

#[test]
fn duplicate_fields_keep_the_last_entry() {
    let response = "\"Date\": \"order_date\", None,\n\"Date\": \"shipped\", \"lambda x: x.strip()\",\n";
    let mapping = parse_response(response);
    assert_eq!(mapping.len(), 1);
    assert_eq!(
        mapping["Date"],
        MappingEntry::new("shipped", Some("lambda x: x.strip()"))
    );
}

#[test]
fn lambda_style_response_is_read_line_by_line() {
    let response = r#"```json
{
    "Date": "order_date", "lambda x: datetime.strptime(x, '%d/%m/%Y').strftime('%Y-%m-%d')",
    "Amount": "amt", lambda x: float(x),
    "Policy": "policy_no", None
}
```"#;
    let mapping = parse_response(response);
    assert_eq!(mapping.len(), 3);
    assert_eq!(
        mapping["Date"].transformation.as_deref(),
        Some("lambda x: datetime.strptime(x, '%d/%m/%Y').strftime('%Y-%m-%d')")
    );
    assert_eq!(mapping["Amount"].transformation.as_deref(), Some("lambda x: float(x)"));
    assert_eq!(mapping["Policy"].transformation, None);
}

#[test]
fn auto_mode_prefers_json_and_falls_back_to_lines() {
    let (source, template) = tables();
    let json = r#"{"Amount": {"source_column": "amt", "transformation": "to_float"}}"#;
    let mapping = read_mapping(json, ParseMode::Auto, &source, &template).unwrap();
    assert_eq!(mapping["Amount"], MappingEntry::new("amt", Some("to_float")));

    let lines = "\"Amount\": \"amt\", float\n";
    let mapping = read_mapping(lines, ParseMode::Auto, &source, &template).unwrap();
    assert_eq!(mapping["Amount"], MappingEntry::new("amt", Some("float")));
}

#[test]
fn strict_mode_rejects_unknown_columns_and_fields() {
    let (source, template) = tables();
    let unknown_column = r#"{"Amount": {"source_column": "total", "transformation": null}}"#;
    assert_eq!(
        read_mapping(unknown_column, ParseMode::Strict, &source, &template).unwrap_err(),
        MappingError::UnknownSourceColumn {
            field: "Amount".into(),
            column: "total".into()
        }
    );
    let unknown_field = r#"{"Total": "amt"}"#;
    assert_eq!(
        read_mapping(unknown_field, ParseMode::Strict, &source, &template).unwrap_err(),
        MappingError::UnknownField("Total".into())
    );
    assert!(matches!(
        read_mapping("\"Amount\": \"amt\", float\n", ParseMode::Strict, &source, &template),
        Err(MappingError::MissingJson)
    ));
}

#[test]
fn structured_rejects_non_string_transformation() {
    let err = parse_structured(r#"{"Amount": {"source_column": "amt", "transformation": 3}}"#)
        .unwrap_err();
    assert!(err.to_string().contains("Amount"));
}

proptest! {
    #[test]
    fn lenient_parse_never_panics(text in "\\PC{0,200}") {
        let _ = parse_response(&text);
    }

    #[test]
    fn lenient_parse_reads_generated_lines(
        entries in proptest::collection::vec(("[A-Za-z][A-Za-z0-9_ ]{0,12}", "[a-z_]{1,12}"), 1..8)
    ) {
        let mut text = String::new();
        for (field, column) in &entries {
            text.push_str(&format!("\"{field}\": \"{column}\", None,\n"));
        }
        let mapping = parse_response(&text);
        let expected = entries.iter().cloned().collect::<BTreeMap<String, String>>();
        prop_assert_eq!(mapping.len(), expected.len());
        for (field, column) in &expected {
            prop_assert_eq!(&mapping[field.as_str()].source_column, column);
            prop_assert_eq!(&mapping[field.as_str()].transformation, &None);
        }
    }
}
