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

fn staff_table(engine: &mut Engine) {
    run(
        engine,
        "CREATE TABLE employees (id INT PRIMARY KEY, dept_id INT, salary FLOAT, city VARCHAR)",
    );
    let rows = [
        (1, 1, 100.0, "'paris'"),
        (2, 1, 200.0, "'london'"),
        (3, 1, 300.0, "'paris'"),
        (4, 2, 400.0, "'berlin'"),
        (5, 2, 500.0, "'berlin'"),
        (6, 2, 600.0, "'paris'"),
        (7, 3, 700.0, "'london'"),
        (8, 3, 800.0, "NULL"),
    ];
    for (id, dept, salary, city) in rows {
        run(
            engine,
            &format!("INSERT INTO employees VALUES ({id}, {dept}, {salary}, {city})"),
        );
    }
}

#[test]
fn group_by_with_having_threshold() {
    let (_dir, mut engine) = open();
    staff_table(&mut engine);
    let result = run(
        &mut engine,
        "SELECT dept_id, COUNT(*) AS headcount FROM employees \
         GROUP BY dept_id HAVING COUNT(*) >= 3",
    );
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 2);
    // first-seen group order
    assert_eq!(rows[0].get("dept_id"), Some(&Value::Int(1)));
    assert_eq!(rows[0].get("headcount"), Some(&Value::Int(3)));
    assert_eq!(rows[1].get("dept_id"), Some(&Value::Int(2)));
    assert_eq!(rows[1].get("headcount"), Some(&Value::Int(3)));
}

#[test]
fn having_resolves_alias_directly() {
    let (_dir, mut engine) = open();
    staff_table(&mut engine);
    let result = run(
        &mut engine,
        "SELECT dept_id, SUM(salary) AS payroll FROM employees \
         GROUP BY dept_id HAVING payroll > 1000",
    );
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("payroll"), Some(&Value::Float(1500.0)));
    assert_eq!(rows[1].get("payroll"), Some(&Value::Float(1500.0)));
}

#[test]
fn count_distinct_skips_nulls_and_duplicates() {
    let (_dir, mut engine) = open();
    staff_table(&mut engine);
    let result = run(
        &mut engine,
        "SELECT COUNT(DISTINCT city) AS cities FROM employees",
    );
    assert_eq!(
        result.rows().unwrap()[0].get("cities"),
        Some(&Value::Int(3))
    );
}

#[test]
fn avg_and_count_ignore_nulls() {
    let (_dir, mut engine) = open();
    run(&mut engine, "CREATE TABLE t (id INT PRIMARY KEY, v INT)");
    run(&mut engine, "INSERT INTO t VALUES (1, 2)");
    run(&mut engine, "INSERT INTO t VALUES (2, NULL)");
    run(&mut engine, "INSERT INTO t VALUES (3, 4)");
    let result = run(
        &mut engine,
        "SELECT AVG(v) AS mean, COUNT(v) AS present, COUNT(*) AS total FROM t",
    );
    let row = &result.rows().unwrap()[0];
    assert_eq!(row.get("mean"), Some(&Value::Float(3.0)));
    assert_eq!(row.get("present"), Some(&Value::Int(2)));
    assert_eq!(row.get("total"), Some(&Value::Int(3)));
}

#[test]
fn empty_input_yields_null_sum_and_zero_count() {
    let (_dir, mut engine) = open();
    run(&mut engine, "CREATE TABLE t (id INT PRIMARY KEY, v INT)");
    let result = run(&mut engine, "SELECT SUM(v) AS s, COUNT(*) AS n FROM t");
    let row = &result.rows().unwrap()[0];
    assert_eq!(row.get("s"), Some(&Value::Null));
    assert_eq!(row.get("n"), Some(&Value::Int(0)));
}

#[test]
fn max_and_min_over_text() {
    let (_dir, mut engine) = open();
    staff_table(&mut engine);
    let result = run(
        &mut engine,
        "SELECT MAX(city) AS last, MIN(city) AS first FROM employees",
    );
    let row = &result.rows().unwrap()[0];
    assert_eq!(row.get("last"), Some(&Value::Text("paris".into())));
    assert_eq!(row.get("first"), Some(&Value::Text("berlin".into())));
}

#[test]
fn order_and_limit_apply_after_aggregation() {
    let (_dir, mut engine) = open();
    staff_table(&mut engine);
    let result = run(
        &mut engine,
        "SELECT dept_id, SUM(salary) AS payroll FROM employees \
         GROUP BY dept_id ORDER BY payroll DESC LIMIT 1",
    );
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("dept_id"), Some(&Value::Int(2)));
}

#[test]
fn group_by_requires_an_aggregate() {
    let (_dir, mut engine) = open();
    staff_table(&mut engine);
    let result = engine.execute("SELECT dept_id FROM employees GROUP BY dept_id");
    assert!(result.error().unwrap().contains("aggregate"));
}

#[test]
fn having_requires_an_aggregate() {
    let (_dir, mut engine) = open();
    staff_table(&mut engine);
    let result = engine.execute("SELECT dept_id FROM employees HAVING dept_id > 1");
    assert!(result.error().unwrap().contains("aggregate"));
}
