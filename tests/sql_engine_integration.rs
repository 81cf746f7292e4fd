//! End-to-end SQL scenarios: a full CREATE → INSERT → SELECT/UPDATE/DELETE
//! lifecycle through a single `Database` handle, including crash recovery,
//! joins, aggregation and index-aware planning.

use interchangedb::db::ExecOutput;
use interchangedb::execution::ast::Value;
use interchangedb::Database;
use tempfile::tempdir;

fn rows(output: ExecOutput) -> Vec<Vec<Value>> {
    match output {
        ExecOutput::Rows { rows, .. } => rows,
        other => panic!("expected Rows, got {other:?}"),
    }
}

#[test]
fn test_basic_round_trip() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_pool_size(dir.path().join("db"), 64).unwrap();

    db.execute("CREATE TABLE users (id INT, name TEXT)").unwrap();
    db.execute("INSERT INTO users VALUES (1, 'Alice')").unwrap();
    db.execute("INSERT INTO users VALUES (2, 'Bob')").unwrap();

    let got = rows(db.execute("SELECT * FROM users ORDER BY id").unwrap());
    assert_eq!(
        got,
        vec![
            vec![Value::Int(1), Value::Text("Alice".to_string())],
            vec![Value::Int(2), Value::Text("Bob".to_string())],
        ]
    );
}

#[test]
fn test_crash_recovery_preserves_committed_auto_transactions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db");

    {
        let db = Database::open_with_pool_size(&path, 64).unwrap();
        db.execute("CREATE TABLE t (a INT)").unwrap();
        db.execute("INSERT INTO t VALUES (1)").unwrap();
        db.execute("INSERT INTO t VALUES (2)").unwrap();
        // No explicit checkpoint or shutdown hook: simulates a crash right
        // after the last insert's WAL record was flushed.
    }

    let db = Database::open_with_pool_size(&path, 64).unwrap();
    let got = rows(db.execute("SELECT * FROM t ORDER BY a").unwrap());
    assert_eq!(got, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
}

#[test]
fn test_join_with_column_name_collision() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_pool_size(dir.path().join("db"), 64).unwrap();

    db.execute("CREATE TABLE customers (id INT, name TEXT)").unwrap();
    db.execute("CREATE TABLE orders (id INT, customer_id INT, item TEXT)").unwrap();
    db.execute("INSERT INTO customers VALUES (1, 'Alice')").unwrap();
    db.execute("INSERT INTO customers VALUES (2, 'Bob')").unwrap();
    db.execute("INSERT INTO orders VALUES (1, 1, 'Laptop')").unwrap();
    db.execute("INSERT INTO orders VALUES (2, 2, 'Mouse')").unwrap();

    let mut got = rows(db
        .execute("SELECT name, item FROM customers INNER JOIN orders ON customers.id = orders.customer_id")
        .unwrap());
    got.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    assert_eq!(
        got,
        vec![
            vec![Value::Text("Alice".to_string()), Value::Text("Laptop".to_string())],
            vec![Value::Text("Bob".to_string()), Value::Text("Mouse".to_string())],
        ]
    );
}

#[test]
fn test_group_by_with_aggregate() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_pool_size(dir.path().join("db"), 64).unwrap();

    db.execute("CREATE TABLE sales (region TEXT, amount INT)").unwrap();
    db.execute("INSERT INTO sales VALUES ('west', 100)").unwrap();
    db.execute("INSERT INTO sales VALUES ('east', 50)").unwrap();
    db.execute("INSERT INTO sales VALUES ('west', 25)").unwrap();

    let mut got = rows(db.execute("SELECT region, SUM(amount) FROM sales GROUP BY region").unwrap());
    got.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
    assert_eq!(
        got,
        vec![
            vec![Value::Text("east".to_string()), Value::Int(50)],
            vec![Value::Text("west".to_string()), Value::Int(125)],
        ]
    );
}

#[test]
fn test_explain_prefers_index_scan_when_selective() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_pool_size(dir.path().join("db"), 64).unwrap();

    db.execute("CREATE TABLE big (k INT)").unwrap();
    for i in 0..50 {
        db.execute(&format!("INSERT INTO big VALUES ({i})")).unwrap();
    }
    db.execute("CREATE INDEX ix_k ON big (k)").unwrap();

    match db.execute("EXPLAIN SELECT * FROM big WHERE k = 7").unwrap() {
        ExecOutput::Explain(text) => assert!(text.contains("IndexScan"), "expected an IndexScan in:\n{text}"),
        other => panic!("expected Explain, got {other:?}"),
    }
}

#[test]
fn test_update_and_delete_mutate_visible_rows() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_pool_size(dir.path().join("db"), 64).unwrap();

    db.execute("CREATE TABLE t (a INT, b TEXT)").unwrap();
    db.execute("INSERT INTO t VALUES (1, 'x')").unwrap();
    db.execute("INSERT INTO t VALUES (2, 'y')").unwrap();

    db.execute("UPDATE t SET b = 'z' WHERE a = 1").unwrap();
    db.execute("DELETE FROM t WHERE a = 2").unwrap();

    let got = rows(db.execute("SELECT * FROM t").unwrap());
    assert_eq!(got, vec![vec![Value::Int(1), Value::Text("z".to_string())]]);
}

#[test]
fn test_dropped_table_is_not_queryable() {
    let dir = tempdir().unwrap();
    let db = Database::open_with_pool_size(dir.path().join("db"), 64).unwrap();

    db.execute("CREATE TABLE t (a INT)").unwrap();
    db.execute("DROP TABLE t").unwrap();

    assert!(db.execute("SELECT * FROM t").is_err());
}
