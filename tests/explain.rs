use quartzdb::Engine;
use tempfile::TempDir;

fn open() -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(dir.path()).unwrap();
    (dir, engine)
}

fn setup(engine: &mut Engine) {
    for sql in [
        "CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR, age INT, city VARCHAR)",
        "CREATE TABLE orders (id INT PRIMARY KEY, user_id INT, total FLOAT)",
        "CREATE INDEX idx_city ON users (city)",
    ] {
        let result = engine.execute(sql);
        assert!(result.success(), "'{sql}' failed: {:?}", result.error());
    }
}

fn plan(engine: &Engine, sql: &str) -> String {
    engine.explain(sql).unwrap().to_string()
}

#[test]
fn bare_scan() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    assert_eq!(plan(&engine, "SELECT * FROM users"), "SELECT\n  SCAN users\n");
}

#[test]
fn filter_wraps_scan_without_usable_index() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    assert_eq!(
        plan(&engine, "SELECT * FROM users WHERE age > 30"),
        "SELECT\n  FILTER age > 30\n    SCAN users\n"
    );
}

#[test]
fn fully_bound_equality_needs_no_filter() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    assert_eq!(
        plan(&engine, "SELECT * FROM users WHERE city = 'Paris'"),
        "SELECT\n  INDEX_LOOKUP users USING idx_city (city)\n"
    );
}

#[test]
fn partially_bound_equality_keeps_residual_filter() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    assert_eq!(
        plan(
            &engine,
            "SELECT * FROM users WHERE city = 'Paris' AND name = 'Ada'"
        ),
        "SELECT\n  FILTER city = 'Paris' AND name = 'Ada'\n    INDEX_LOOKUP users USING idx_city (city)\n"
    );
}

#[test]
fn range_predicates_disqualify_the_index() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    assert_eq!(
        plan(
            &engine,
            "SELECT * FROM users WHERE city = 'Paris' OR city = 'Lyon'"
        ),
        "SELECT\n  FILTER city = 'Paris' OR city = 'Lyon'\n    SCAN users\n"
    );
}

#[test]
fn join_strategies_reflect_available_indexes() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    // users.id is indexed through its primary key
    assert_eq!(
        plan(
            &engine,
            "SELECT * FROM orders JOIN users ON orders.user_id = users.id"
        ),
        "SELECT\n  SCAN orders\n  INNER_JOIN users ON orders.user_id = users.id [INDEX_LOOKUP]\n"
    );
    // orders.user_id is not
    assert_eq!(
        plan(
            &engine,
            "SELECT * FROM users LEFT JOIN orders ON users.id = orders.user_id"
        ),
        "SELECT\n  SCAN users\n  LEFT_JOIN orders ON users.id = orders.user_id [NESTED_LOOP]\n"
    );
}

#[test]
fn full_pipeline_renders_every_stage() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    let text = plan(
        &engine,
        "SELECT city, COUNT(*) AS n FROM users WHERE age > 18 \
         GROUP BY city HAVING COUNT(*) > 2 ORDER BY n DESC LIMIT 3",
    );
    assert_eq!(
        text,
        "SELECT\n\
         \x20 FILTER age > 18\n\
         \x20   SCAN users\n\
         \x20 AGGREGATE COUNT(*) GROUP BY city\n\
         \x20 HAVING COUNT(*) > 2\n\
         \x20 SORT n DESC\n\
         \x20 LIMIT 3\n\
         \x20 PROJECTION city\n"
    );
}

#[test]
fn explain_only_accepts_select() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    assert!(engine.explain("DELETE FROM users").is_err());
    assert!(engine.explain("not sql at all").is_err());
}

#[test]
fn explain_never_touches_data() {
    let (_dir, mut engine) = open();
    setup(&mut engine);
    let result = engine.execute("INSERT INTO users VALUES (1, 'Ada', 36, 'London')");
    assert!(result.success());
    let _ = engine.explain("SELECT * FROM users WHERE city = 'London'").unwrap();
    assert_eq!(engine.storage().row_count("users").unwrap(), 1);
}
