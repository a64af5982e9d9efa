mod common;

use common::{ORDERS_CSV, TEMPLATE_CSV, TestWorkspace};
use proptest::prelude::*;
use table_mapper::{
    apply::{SkipReason, apply, apply_with_report},
    data::Value,
    dataset::{Column, ReadOptions, Table},
    mapping::{Mapping, MappingEntry, parse_response},
    schema::{ColumnType, Schema},
};

fn load(workspace: &TestWorkspace, name: &str, contents: &str) -> Table {
    let path = workspace.write(name, contents);
    Table::read_csv(&path, &ReadOptions::default()).expect("read table")
}

#[test]
fn float_transformation_produces_typed_amount() {
    let workspace = TestWorkspace::new();
    let source = load(&workspace, "source.csv", "order_date,amt\n2024-01-01,10.5\n");
    let template = load(&workspace, "template.csv", TEMPLATE_CSV);
    let mut mapping = Mapping::new();
    mapping.insert("Date".into(), MappingEntry::new("order_date", None));
    mapping.insert("Amount".into(), MappingEntry::new("amt", Some("float")));

    let output = apply(&source, &template, &mapping);

    assert_eq!(output.column_names(), vec!["Date", "Amount"]);
    assert_eq!(output.row_count(), 1);
    assert_eq!(
        output.column("Date").unwrap().values,
        vec![Some(Value::String("2024-01-01".into()))]
    );
    let amount = output.column("Amount").unwrap();
    assert_eq!(amount.datatype, ColumnType::Float);
    assert_eq!(amount.values, vec![Some(Value::Float(10.5))]);

    let target = workspace.path().join("target.csv");
    output.write_csv(&target, b',').expect("write target");
    assert_eq!(workspace.read("target.csv"), "Date,Amount\n2024-01-01,10.5\n");
}

#[test]
fn identity_mapping_round_trips_columns() {
    let workspace = TestWorkspace::new();
    let source = load(&workspace, "orders.csv", ORDERS_CSV);
    let template = load(&workspace, "same.csv", "order_date,amt,customer\n");
    let mapping = source
        .column_names()
        .into_iter()
        .map(|name| (name.to_string(), MappingEntry::new(name, None)))
        .collect::<Mapping>();

    let output = apply(&source, &template, &mapping);
    assert_eq!(output, source);
}

#[test]
fn unknown_source_column_only_affects_its_field() {
    let workspace = TestWorkspace::new();
    let source = load(&workspace, "orders.csv", ORDERS_CSV);
    let template = load(&workspace, "template.csv", "Date,Amount,Customer\n");
    let mapping = parse_response(
        "\"Date\": \"order_date\", None,\n\"Amount\": \"total\", float,\n\"Customer\": \"customer\", upper\n",
    );

    let (output, report) = apply_with_report(&source, &template, &mapping);

    assert_eq!(report.populated, vec!["Date".to_string(), "Customer".to_string()]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].field, "Amount");
    assert_eq!(
        report.skipped[0].reason,
        SkipReason::UnknownSourceColumn("total".into())
    );
    assert!(output.column("Amount").unwrap().is_unpopulated());
    assert_eq!(output.row_count(), source.row_count());
    assert_eq!(
        output.column("Customer").unwrap().values,
        vec![
            Some(Value::String("ALICE".into())),
            Some(Value::String("BOB".into()))
        ]
    );
}

#[test]
fn declared_template_types_drive_coercion() {
    let workspace = TestWorkspace::new();
    let source = load(
        &workspace,
        "claims.csv",
        "claim_date,paid\n03/01/2024,\"1,200.50\"\n15/02/2024,80\n",
    );
    let template_path = workspace.write("template.csv", "When,Paid\n");
    let schema_path = workspace.write(
        "template.yaml",
        "columns:\n  - name: When\n    datatype: String\n  - name: Paid\n    datatype: Integer\n",
    );
    let template = Table::read_csv(
        &template_path,
        &ReadOptions {
            schema: Some(Schema::load(&schema_path).expect("schema")),
            ..ReadOptions::default()
        },
    )
    .expect("template");
    let mapping = parse_response(
        "\"When\": \"claim_date\", \"lambda x: datetime.strptime(x, '%d/%m/%Y').strftime('%Y-%m-%d')\",\n\
         \"Paid\": \"paid\", \"replace(',', '') | to_float\",\n",
    );

    let output = apply(&source, &template, &mapping);

    assert_eq!(
        output.column("When").unwrap().values,
        vec![
            Some(Value::String("2024-01-03".into())),
            Some(Value::String("2024-02-15".into()))
        ]
    );
    let paid = output.column("Paid").unwrap();
    assert_eq!(paid.datatype, ColumnType::Integer);
    assert_eq!(
        paid.values,
        vec![Some(Value::Integer(1200)), Some(Value::Integer(80))]
    );
}

#[test]
fn empty_mapping_yields_template_shaped_empty_rows() {
    let workspace = TestWorkspace::new();
    let source = load(&workspace, "orders.csv", ORDERS_CSV);
    let template = load(&workspace, "template.csv", TEMPLATE_CSV);
    let output = apply(&source, &template, &Mapping::new());
    assert_eq!(output.row_count(), 2);
    assert!(output.columns().iter().all(|c| c.is_unpopulated()));
    let target = workspace.path().join("out.csv");
    output.write_csv(&target, b',').expect("write");
    assert_eq!(workspace.read("out.csv"), "Date,Amount\n,\n,\n");
}

#[test]
fn unknown_strftime_specifier_leaves_column_empty() {
    let workspace = TestWorkspace::new();
    let source = load(&workspace, "claims.csv", "d,amt\n03/01/2024,1.25\n");
    let template = load(&workspace, "template.csv", "When,Amount\n");
    let mapping = parse_response(
        "\"When\": \"d\", \"lambda x: datetime.strptime(x, '%d/%m/%Y').strftime('%Q')\",\n\
         \"Amount\": \"amt\", round(400)\n",
    );

    let (output, report) = apply_with_report(&source, &template, &mapping);

    assert_eq!(report.populated, vec!["Amount".to_string()]);
    assert_eq!(report.skipped[0].field, "When");
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::UnsupportedTransformation { .. }
    ));
    assert!(output.column("When").unwrap().is_unpopulated());
    assert_eq!(
        output.column("Amount").unwrap().values,
        vec![Some(Value::Float(1.25))]
    );
}

fn typed_template() -> Table {
    Table::new(vec![
        Column::empty("Text", ColumnType::String, 0),
        Column::empty("Number", ColumnType::Float, 0),
        Column::empty("Count", ColumnType::Integer, 0),
        Column::empty("Flag", ColumnType::Boolean, 0),
        Column::empty("Day", ColumnType::Date, 0),
    ])
    .expect("template")
}

fn transformation_text() -> impl Strategy<Value = String> {
    let operator = prop::sample::select(vec![
        "identity", "to_float", "to_int", "to_string", "to_bool", "strip", "upper", "lower",
        "title", "snake_case", "to_date", "scale(-2.5)", "round(1)", "replace('-', '')",
    ]);
    prop_oneof![
        "\\PC{0,40}",
        "%[A-Za-z%:#.0-9+-]{1,3}".prop_map(|spec| format!("to_date(%Y-%m-%d, {spec})")),
        "%[A-Za-z%:#.0-9+-]{1,3}".prop_map(|spec| {
            format!("lambda x: datetime.strptime(x, '%Y-%m-%d').strftime('{spec}')")
        }),
        any::<u32>().prop_map(|digits| format!("round({digits})")),
        any::<u32>().prop_map(|digits| format!("lambda x: round(float(x), {digits})")),
        prop::collection::vec(operator, 1..4).prop_map(|steps| steps.join(" | ")),
    ]
}

proptest! {
    #[test]
    fn any_transformation_text_keeps_rows_and_accounts_for_every_field(
        entries in prop::collection::vec(
            (
                prop::sample::select(vec!["order_date", "amt", "customer", "absent"]),
                transformation_text(),
            ),
            5,
        )
    ) {
        let workspace = TestWorkspace::new();
        let source = load(&workspace, "orders.csv", ORDERS_CSV);
        let template = typed_template();
        let mapping = template
            .column_names()
            .into_iter()
            .zip(&entries)
            .map(|(field, (column, text))| {
                (field.to_string(), MappingEntry::new(*column, Some(text.as_str())))
            })
            .collect::<Mapping>();

        let (output, report) = apply_with_report(&source, &template, &mapping);

        prop_assert_eq!(output.row_count(), source.row_count());
        prop_assert_eq!(output.column_names(), template.column_names());
        for column in output.columns() {
            prop_assert_eq!(column.values.len(), source.row_count());
            let populated = report.populated.contains(&column.name);
            let skipped = report.skipped.iter().any(|failure| failure.field == column.name);
            prop_assert!(populated != skipped, "'{}' must be populated or skipped", column.name);
        }
    }
}
