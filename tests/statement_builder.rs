use std::collections::HashMap;

use sqlite_writer::statement;
use sqlite_writer::{DataType, Params, RowData, SqlStatement, SqliteError, StatementKind, Value};

fn assert_invalid<T: std::fmt::Debug>(result: Result<T, SqliteError>) {
    match result {
        Err(SqliteError::InvalidConfiguration(_)) => {}
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}

#[test]
fn test_create_table_renders_one_clause_per_column() {
    let sql = statement::create_table("users", &["name", "age"], &["TEXT", "INTEGER"]).unwrap();
    assert_eq!(
        sql.text(),
        "CREATE TABLE IF NOT EXISTS users(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)"
    );
    assert!(sql.params().is_empty());

    let typed = statement::create_table(
        "scores",
        &["player", "points"],
        &[DataType::Text, DataType::Real],
    )
    .unwrap();
    assert!(typed.text().ends_with("player TEXT, points REAL)"));
}

#[test]
fn test_create_table_rejects_bad_shapes() {
    let none: [&str; 0] = [];
    assert_invalid(statement::create_table("users", &["name"], &["TEXT", "INTEGER"]));
    assert_invalid(statement::create_table("users", &["name", "age"], &["TEXT"]));
    assert_invalid(statement::create_table("users", &none, &none));
    assert_invalid(statement::create_table("users", &["name"], &none));
    assert_invalid(statement::create_table("users", &["name", "name"], &["TEXT", "TEXT"]));
    assert_invalid(statement::create_table("users", &["id"], &["INTEGER"]));
}

#[test]
fn test_identifiers_are_validated() {
    assert_invalid(statement::drop_table("users; DROP TABLE x"));
    assert_invalid(statement::drop_table(""));
    assert_invalid(statement::create_table("users", &["na me"], &["TEXT"]));
    assert_invalid(statement::create_table("users", &["name"], &["TEXT; DROP TABLE users"]));
    assert_invalid(statement::delete_row("users", "1=1 OR id", 1));
    assert!(statement::drop_table("main.users").is_ok());
}

#[test]
fn test_drop_table() {
    let sql = statement::drop_table("users").unwrap();
    assert_eq!(sql.text(), "DROP TABLE IF EXISTS users");
}

#[test]
fn test_insert_row_binds_values_positionally() {
    let sql = statement::insert_row(
        "users",
        &["name", "age"],
        vec![Value::from("Ann"), Value::from(30)],
    )
    .unwrap();
    assert_eq!(sql.text(), "INSERT INTO users(name, age) VALUES (?, ?)");
    assert_eq!(
        sql.params().values,
        vec![Value::Text("Ann".into()), Value::Integer(30)]
    );
}

#[test]
fn test_insert_row_rejects_count_mismatch() {
    assert_invalid(statement::insert_row("users", &["name", "age"], vec![Value::from("Ann")]));
    assert_invalid(statement::insert_row(
        "users",
        &["name"],
        vec![Value::from("Ann"), Value::from(30)],
    ));
}

#[test]
fn test_insert_multiple_rows_flattens_row_major() {
    let rows = vec![
        vec![Value::from("Bo"), Value::from(20)],
        vec![Value::from("Cy"), Value::from(40)],
        vec![Value::from("Di"), Value::Null],
    ];
    let sql = statement::insert_multiple_rows("users", &["name", "age"], &rows).unwrap();
    assert_eq!(
        sql.text(),
        "INSERT INTO users(name, age) VALUES (?, ?), (?, ?), (?, ?)"
    );
    assert_eq!(sql.params().len(), rows.len() * 2);
    let expected: Vec<Value> = rows.iter().flatten().cloned().collect();
    assert_eq!(sql.params().values, expected);
}

#[test]
fn test_insert_multiple_rows_rejects_ragged_batch() {
    let rows = vec![
        vec![Value::from("Bo"), Value::from(20)],
        vec![Value::from("Cy")],
    ];
    assert_invalid(statement::insert_multiple_rows("users", &["name", "age"], &rows));

    let empty: Vec<Vec<Value>> = Vec::new();
    assert_invalid(statement::insert_multiple_rows("users", &["name", "age"], &empty));
}

#[test]
fn test_update_row_keyed_matches_ordered() {
    let columns = ["name", "age"];
    let ordered = statement::update_row(
        "users",
        &columns,
        vec![Value::from("Ann"), Value::from(31)],
        "id",
        1,
    )
    .unwrap();

    let keyed_data = HashMap::from([
        ("age".to_string(), Value::from(31)),
        ("name".to_string(), Value::from("Ann")),
    ]);
    let keyed = statement::update_row("users", &columns, keyed_data, "id", 1).unwrap();

    assert_eq!(ordered, keyed);
    assert_eq!(ordered.text(), "UPDATE users SET name = ?, age = ? WHERE id = ?");
    assert_eq!(
        ordered.params().values,
        vec![Value::from("Ann"), Value::from(31), Value::from(1)]
    );
}

#[test]
fn test_update_row_rejects_missing_or_unknown_keys() {
    let missing = HashMap::from([("name".to_string(), Value::from("Ann"))]);
    assert_invalid(statement::update_row("users", &["name", "age"], missing, "id", 1));

    let unknown = HashMap::from([
        ("name".to_string(), Value::from("Ann")),
        ("email".to_string(), Value::from("ann@example.com")),
    ]);
    assert_invalid(statement::update_row("users", &["name"], unknown, "id", 1));

    assert_invalid(statement::update_row(
        "users",
        &["name", "age"],
        vec![Value::from("Ann")],
        "id",
        1,
    ));
}

#[test]
fn test_row_data_normalizes_once() {
    let data = RowData::Keyed(HashMap::from([
        ("b".to_string(), Value::from(2)),
        ("a".to_string(), Value::from(1)),
    ]));
    assert_eq!(
        data.normalize(&["a", "b"]).unwrap(),
        vec![Value::from(1), Value::from(2)]
    );
}

#[test]
fn test_delete_row_binds_where_value() {
    let sql = statement::delete_row("users", "name", "O'Brien").unwrap();
    assert_eq!(sql.text(), "DELETE FROM users WHERE name = ?");
    assert_eq!(sql.params().values, vec![Value::from("O'Brien")]);
}

#[test]
fn test_sql_statement_checks_placeholder_count() {
    assert!(SqlStatement::new("SELECT * FROM users WHERE id = ?", Params::new().with_value(1)).is_ok());
    assert_invalid(SqlStatement::new("SELECT * FROM users WHERE id = ?", Params::new()));
    assert_invalid(SqlStatement::raw("SELECT ?, ?"));
    assert!(SqlStatement::raw("SELECT '?' AS mark").is_ok());
}

#[test]
fn test_statement_kind_marks_inserts() {
    let single = statement::insert_row("users", &["name"], vec![Value::from("Ann")]).unwrap();
    assert_eq!(single.kind(), StatementKind::Insert);
    let batch = statement::insert_multiple_rows("users", &["name"], &[vec![Value::from("Bo")]]).unwrap();
    assert_eq!(batch.kind(), StatementKind::Insert);

    assert_eq!(statement::drop_table("users").unwrap().kind(), StatementKind::Other);
    assert_eq!(
        statement::delete_row("users", "id", 1).unwrap().kind(),
        StatementKind::Other
    );
    assert_eq!(StatementKind::of("  insert into t(a) values (1)"), StatementKind::Insert);
    assert_eq!(StatementKind::of("REPLACE INTO t(a) VALUES (1)"), StatementKind::Insert);
    assert_eq!(StatementKind::of("SELECT 'INSERT'"), StatementKind::Other);
}
