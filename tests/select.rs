use quartzdb::types::Value;
use quartzdb::{Engine, ExecResult};
use tempfile::TempDir;

fn open() -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    (dir, engine)
}

fn run(engine: &mut Engine, sql: &str) -> ExecResult {
    let result = engine.execute(sql);
    assert!(
        result.success(),
        "'{sql}' failed: {:?}",
        result.error()
    );
    result
}

fn people(engine: &mut Engine) {
    run(
        engine,
        "CREATE TABLE people (id INT PRIMARY KEY, name VARCHAR, age INT, city VARCHAR)",
    );
    run(engine, "INSERT INTO people VALUES (1, 'Alice', 34, 'Paris')");
    run(engine, "INSERT INTO people VALUES (2, 'Bob', 28, 'London')");
    run(engine, "INSERT INTO people VALUES (3, 'Carol', 41, 'Paris')");
    run(engine, "INSERT INTO people VALUES (4, 'Dave', 19, 'Berlin')");
}

fn names(result: &ExecResult) -> Vec<String> {
    result
        .rows()
        .unwrap()
        .iter()
        .map(|r| r.get("name").unwrap().to_string())
        .collect()
}

#[test]
fn projection_order_and_limit() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    let result = run(
        &mut engine,
        "SELECT name FROM people ORDER BY age DESC LIMIT 2",
    );
    assert_eq!(names(&result), vec!["Carol", "Alice"]);
    assert_eq!(result.rows().unwrap()[0].len(), 1);
}

#[test]
fn where_with_comparison_operators() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    let result = run(&mut engine, "SELECT name FROM people WHERE age >= 28");
    assert_eq!(names(&result), vec!["Alice", "Bob", "Carol"]);
    let result = run(&mut engine, "SELECT name FROM people WHERE age != 28");
    assert_eq!(names(&result), vec!["Alice", "Carol", "Dave"]);
}

#[test]
fn chains_fold_left_to_right() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    let result = run(
        &mut engine,
        "SELECT name FROM people WHERE city = 'Paris' AND age > 40 OR city = 'Berlin'",
    );
    // ((Paris AND >40) OR Berlin)
    assert_eq!(names(&result), vec!["Carol", "Dave"]);
}

#[test]
fn like_is_case_insensitive() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    let result = run(&mut engine, "SELECT name FROM people WHERE name LIKE 'a%'");
    assert_eq!(names(&result), vec!["Alice"]);
    let result = run(&mut engine, "SELECT name FROM people WHERE city LIKE '%on'");
    assert_eq!(names(&result), vec!["Bob"]);
}

#[test]
fn index_lookup_and_scan_return_the_same_rows() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    let before = run(&mut engine, "SELECT * FROM people WHERE city = 'Paris'");
    run(&mut engine, "CREATE INDEX ON people (city)");
    let after = run(&mut engine, "SELECT * FROM people WHERE city = 'Paris'");
    assert_eq!(before.rows().unwrap().len(), 2);
    assert_eq!(before.rows(), after.rows());
}

#[test]
fn residual_predicate_filters_index_candidates() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    run(&mut engine, "CREATE INDEX ON people (city)");
    let result = run(
        &mut engine,
        "SELECT name FROM people WHERE city = 'Paris' AND age = 34",
    );
    assert_eq!(names(&result), vec!["Alice"]);
}

#[test]
fn order_by_missing_column_keeps_row_order() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    let result = run(&mut engine, "SELECT name FROM people ORDER BY nope");
    assert_eq!(names(&result), vec!["Alice", "Bob", "Carol", "Dave"]);
}

#[test]
fn date_columns_sort_chronologically() {
    let (_dir, mut engine) = open();
    run(
        &mut engine,
        "CREATE TABLE events (id INT PRIMARY KEY, day DATE)",
    );
    run(&mut engine, "INSERT INTO events VALUES (1, '2024-06-01')");
    run(&mut engine, "INSERT INTO events VALUES (2, '15/01/2024')");
    run(&mut engine, "INSERT INTO events VALUES (3, 'March 05, 2024')");
    let result = run(&mut engine, "SELECT * FROM events ORDER BY day");
    let rows = result.rows().unwrap();
    let days: Vec<String> = rows
        .iter()
        .map(|r| r.get("day").unwrap().to_string())
        .collect();
    assert_eq!(days, vec!["2024-01-15", "2024-03-05", "2024-06-01"]);
}

#[test]
fn select_from_missing_table_errors() {
    let (_dir, mut engine) = open();
    let result = engine.execute("SELECT * FROM ghosts");
    assert!(result.error().unwrap().contains("does not exist"));
}

#[test]
fn update_and_delete_report_counts() {
    let (_dir, mut engine) = open();
    people(&mut engine);
    let result = run(&mut engine, "UPDATE people SET city = 'Lyon' WHERE city = 'Paris'");
    assert!(matches!(result, ExecResult::Ok { rows_affected: 2, .. }));
    let result = run(&mut engine, "DELETE FROM people WHERE age < 20");
    assert!(matches!(result, ExecResult::Ok { rows_affected: 1, .. }));
    let result = run(&mut engine, "UPDATE people SET city = 'Rome' WHERE age > 100");
    assert!(matches!(result, ExecResult::Ok { rows_affected: 0, .. }));
    assert_eq!(engine.storage().row_count("people").unwrap(), 3);
}

#[test]
fn show_tables_lists_sorted_names() {
    let (_dir, mut engine) = open();
    run(&mut engine, "CREATE TABLE zebra (a INT)");
    run(&mut engine, "CREATE TABLE apple (a INT)");
    let result = run(&mut engine, "SHOW TABLES");
    let listed: Vec<String> = result
        .rows()
        .unwrap()
        .iter()
        .map(|r| r.get("table").unwrap().to_string())
        .collect();
    assert_eq!(listed, vec!["apple", "zebra"]);
}
