use quartzdb::types::Value;
use quartzdb::{Engine, ExecResult};
use tempfile::TempDir;

fn open() -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::with_manager(dir.path(), "main").unwrap();
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

#[test]
fn default_database_is_selected() {
    let (_dir, engine) = open();
    assert_eq!(engine.current_database(), Some("main"));
}

#[test]
fn tables_are_scoped_per_database() {
    let (_dir, mut engine) = open();
    run(&mut engine, "CREATE TABLE only_in_main (a INT)");
    run(&mut engine, "CREATE DATABASE analytics");
    run(&mut engine, "USE analytics");
    let result = run(&mut engine, "SHOW TABLES");
    assert_eq!(result.rows().unwrap().len(), 0);
    run(&mut engine, "CREATE TABLE only_in_analytics (a INT)");
    run(&mut engine, "USE main");
    let result = run(&mut engine, "SHOW TABLES");
    let listed: Vec<String> = result
        .rows()
        .unwrap()
        .iter()
        .map(|r| r.get("table").unwrap().to_string())
        .collect();
    assert_eq!(listed, vec!["only_in_main"]);
}

#[test]
fn show_databases_marks_the_current_one() {
    let (_dir, mut engine) = open();
    run(&mut engine, "CREATE DATABASE beta");
    let result = run(&mut engine, "SHOW DATABASES");
    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("database"), Some(&Value::Text("beta".into())));
    assert_eq!(rows[0].get("current"), Some(&Value::Bool(false)));
    assert_eq!(rows[1].get("database"), Some(&Value::Text("main".into())));
    assert_eq!(rows[1].get("current"), Some(&Value::Bool(true)));
}

#[test]
fn statement_messages() {
    let (_dir, mut engine) = open();
    let created = run(&mut engine, "CREATE DATABASE beta");
    assert!(matches!(
        created,
        ExecResult::Ok { ref message, .. } if message == "database 'beta' created"
    ));
    let switched = run(&mut engine, "USE beta");
    assert!(matches!(
        switched,
        ExecResult::Ok { ref message, .. } if message == "database changed to 'beta'"
    ));
    run(&mut engine, "USE main");
    let dropped = run(&mut engine, "DROP DATABASE beta");
    assert!(matches!(
        dropped,
        ExecResult::Ok { ref message, .. } if message == "database 'beta' dropped"
    ));
}

#[test]
fn cannot_drop_the_selected_database() {
    let (_dir, mut engine) = open();
    let result = engine.execute("DROP DATABASE main");
    assert!(result
        .error()
        .unwrap()
        .contains("cannot drop the currently selected database"));
    assert_eq!(engine.current_database(), Some("main"));
}

#[test]
fn dropped_databases_are_gone() {
    let (_dir, mut engine) = open();
    run(&mut engine, "CREATE DATABASE temp");
    run(&mut engine, "DROP DATABASE temp");
    let result = engine.execute("USE temp");
    assert!(result.error().unwrap().contains("does not exist"));
}

#[test]
fn duplicate_and_invalid_names_rejected() {
    let (_dir, mut engine) = open();
    let result = engine.execute("CREATE DATABASE main");
    assert!(result.error().unwrap().contains("already exists"));
    assert!(!engine.execute("CREATE DATABASE 1bad").success());
    assert!(!engine.execute("CREATE DATABASE ../escape").success());
}

#[test]
fn data_survives_switching_back() {
    let (_dir, mut engine) = open();
    run(&mut engine, "CREATE TABLE t (id INT PRIMARY KEY)");
    run(&mut engine, "INSERT INTO t VALUES (1)");
    run(&mut engine, "CREATE DATABASE other");
    run(&mut engine, "USE other");
    run(&mut engine, "USE main");
    let result = run(&mut engine, "SELECT * FROM t");
    assert_eq!(result.rows().unwrap().len(), 1);
}

#[test]
fn single_database_mode_rejects_database_statements() {
    let dir = TempDir::new().unwrap();
    let mut engine = Engine::open(dir.path()).unwrap();
    for sql in [
        "CREATE DATABASE x",
        "DROP DATABASE x",
        "USE x",
        "SHOW DATABASES",
    ] {
        let result = engine.execute(sql);
        assert!(
            result
                .error()
                .is_some_and(|e| e.contains("multi-database mode is not enabled")),
            "'{sql}' should be rejected"
        );
    }
}
