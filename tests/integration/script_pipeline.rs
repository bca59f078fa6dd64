#![allow(missing_docs)]

use quarry::cli::{load_rows, InputFormat, Script};
use quarry::OperatorKind;
use serde_json::{json, Value};

fn orders() -> Vec<Value> {
    vec![
        json!({"id": 1, "customer": "ada", "total": 30.5, "tags": ["gift"]}),
        json!({"id": 2, "customer": "bob", "total": 12, "tags": []}),
        json!({"id": 3, "customer": "ada", "total": 7, "tags": ["rush", "gift"]}),
        json!({"id": 4, "customer": "cy", "total": 12, "tags": ["rush"]}),
    ]
}

#[test]
fn multi_key_sort_with_projection() {
    let script = Script::from_toml_str(
        r#"
        [[steps]]
        op = "order_by"
        field = "total"

        [[steps]]
        op = "then_by_descending"
        field = "id"

        [[steps]]
        op = "select"
        fields = ["id"]
        "#,
    )
    .unwrap();
    assert_eq!(
        script.evaluate(orders()).unwrap(),
        json!([{"id": 3}, {"id": 4}, {"id": 2}, {"id": 1}])
    );
}

#[test]
fn filters_with_contains_and_counts() {
    let script = Script::from_json_str(
        r#"{
            "steps": [{"op": "where", "field": "tags", "cmp": "contains", "value": "gift"}],
            "terminal": {"op": "count"}
        }"#,
    )
    .unwrap();
    assert_eq!(script.evaluate(orders()).unwrap(), json!(2));
}

#[test]
fn distinct_by_field_then_take() {
    let script = Script::from_json_str(
        r#"{"steps": [
            {"op": "distinct", "field": "customer"},
            {"op": "skip", "count": 1},
            {"op": "take", "count": 1},
            {"op": "select", "fields": ["customer"]}
        ]}"#,
    )
    .unwrap();
    assert_eq!(script.evaluate(orders()).unwrap(), json!([{"customer": "bob"}]));
}

#[test]
fn group_by_items_keep_arrival_order() {
    let script = Script::from_json_str(
        r#"{"steps": [{"op": "group_by", "field": "customer"}], "terminal": {"op": "first"}}"#,
    )
    .unwrap();
    let first = script.evaluate(orders()).unwrap();
    assert_eq!(first["key"], json!("ada"));
    let ids: Vec<&Value> = first["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| &item["id"])
        .collect();
    assert_eq!(ids, vec![&json!(1), &json!(3)]);
}

#[test]
fn while_steps_and_reverse() {
    let script = Script::from_json_str(
        r#"{"steps": [
            {"op": "skip_while", "field": "total", "cmp": "gt", "value": 10},
            {"op": "take_while", "field": "total", "cmp": "lt", "value": 20},
            {"op": "reverse"}
        ], "terminal": {"op": "last"}}"#,
    )
    .unwrap();
    assert_eq!(script.evaluate(orders()).unwrap()["id"], json!(3));
}

#[test]
fn numeric_terminals_over_fields() {
    let parse = |terminal: &str| {
        Script::from_json_str(&format!(r#"{{"terminal": {terminal}}}"#)).unwrap()
    };
    assert_eq!(parse(r#"{"op": "sum", "field": "total"}"#).evaluate(orders()).unwrap(), json!(61.5));
    assert_eq!(
        parse(r#"{"op": "average", "field": "id"}"#).evaluate(orders()).unwrap(),
        json!(2.5)
    );
    assert_eq!(parse(r#"{"op": "min", "field": "total"}"#).evaluate(orders()).unwrap(), json!(7));
    assert_eq!(
        parse(r#"{"op": "max", "field": "customer"}"#).evaluate(orders()).unwrap(),
        json!("cy")
    );
    let err = parse(r#"{"op": "max", "field": "total"}"#).evaluate(Vec::new()).unwrap_err();
    assert_eq!(err.code(), "EmptySequence");
}

#[test]
fn explain_reports_recorded_operators() {
    let script = Script::from_json_str(
        r#"{"steps": [
            {"op": "where", "field": "id", "cmp": "ne", "value": 2},
            {"op": "order_by_descending", "field": "id"},
            {"op": "group_by", "field": "customer"}
        ]}"#,
    )
    .unwrap();
    assert_eq!(
        script.explain().unwrap(),
        vec![
            OperatorKind::Filter,
            OperatorKind::SortDescending,
            OperatorKind::Group,
            OperatorKind::Project,
        ]
    );
}

#[test]
fn unknown_step_is_a_script_error() {
    let err = Script::from_toml_str("[[steps]]\nop = \"explode\"\n").unwrap_err();
    assert_eq!(err.code(), "Script");
    let err = Script::from_json_str(r#"{"steps": [{"op": "explode"}]}"#).unwrap_err();
    assert_eq!(err.code(), "Json");
}

#[test]
fn csv_rows_feed_scripts() {
    let csv = "name,score\nada,9\nbob,4\ncy,7\n";
    let rows = load_rows(csv.as_bytes(), InputFormat::Csv).unwrap();
    let script = Script::from_json_str(
        r#"{"steps": [{"op": "where", "field": "score", "cmp": "ge", "value": 7},
                      {"op": "order_by", "field": "score"}],
            "terminal": {"op": "first"}}"#,
    )
    .unwrap();
    assert_eq!(script.evaluate(rows).unwrap(), json!({"name": "cy", "score": 7}));
}
