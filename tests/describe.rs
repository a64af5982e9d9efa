mod common;

use common::{ORDERS_CSV, TestWorkspace};
use proptest::prelude::*;
use table_mapper::{
    dataset::{ReadOptions, Table},
    describe::{describe, describe_by_index},
};

fn table_from(headers: &[String], rows: &[Vec<String>]) -> Table {
    Table::from_rows(headers, rows, None).expect("table from rows")
}

#[test]
fn describe_reads_examples_from_csv() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("orders.csv", ORDERS_CSV);
    let table = Table::read_csv(&path, &ReadOptions::default()).expect("read orders");

    assert_eq!(
        describe(&table, false),
        "\t- order_date (Examples: 2024-01-01, 2024-01-02)\n\
         \t- amt (Examples: 10.5, 7.0)\n\
         \t- customer (Examples: Alice, Bob)\n"
    );
    assert_eq!(
        describe(&table, true),
        "\t- 0 (Examples: 2024-01-01, 2024-01-02)\n\
         \t- 1 (Examples: 10.5, 7.0)\n\
         \t- 2 (Examples: Alice, Bob)\n"
    );
    let by_index = describe_by_index(&table);
    assert_eq!(by_index[&1], "amt (Examples: 10.5, 7.0)");
}

#[test]
fn header_only_table_describes_names_only() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("template.csv", "Date,Amount\n");
    let table = Table::read_csv(&path, &ReadOptions::default()).expect("read template");
    assert_eq!(describe(&table, false), "\t- Date\n\t- Amount\n");
}

fn table_strategy() -> impl Strategy<Value = (Vec<String>, Vec<Vec<String>>)> {
    (1usize..5).prop_flat_map(|width| {
        let headers = proptest::collection::hash_set("h_[a-z]{3,8}", width)
            .prop_map(|set| set.into_iter().collect::<Vec<_>>());
        let rows = proptest::collection::vec(
            proptest::collection::vec("[0-9]{0,4}", width),
            1..6,
        );
        (headers, rows)
    })
}

proptest! {
    #[test]
    fn describe_is_deterministic((headers, rows) in table_strategy()) {
        let table = table_from(&headers, &rows);
        prop_assert_eq!(describe(&table, false), describe(&table, false));
        prop_assert_eq!(describe(&table, true), describe(&table, true));
    }

    #[test]
    fn anonymized_description_never_leaks_names((headers, rows) in table_strategy()) {
        // Names carry an underscore and values are digits, so any occurrence is a leak.
        let table = table_from(&headers, &rows);
        let text = describe(&table, true);
        for name in &headers {
            prop_assert!(!text.contains(name.as_str()), "{} leaked into {}", name, text);
        }
    }
}
