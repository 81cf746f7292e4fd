//! Top-level facade wiring the catalog, the transactional engine and the
//! SQL front end behind a single [`Database::execute`] entry point.

use std::path::Path;

use crate::catalog;
use crate::common::Result;
use crate::concurrency::Engine;
use crate::execution::ast::{Statement, Value};
use crate::execution::{executor, parser, planner};

/// The result of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutput {
    /// DDL or a mutation (INSERT/UPDATE/DELETE), reported as a message.
    Message(String),
    /// A SELECT's result set.
    Rows { columns: Vec<String>, rows: Vec<Vec<Value>> },
    /// The textual plan produced by EXPLAIN.
    Explain(String),
}

/// A single-writer database: one [`Engine`] (page store + buffer pool +
/// WAL + B+-tree), schema metadata via [`catalog`], and SQL execution via
/// [`crate::execution`].
pub struct Database {
    engine: Engine,
    row_ids: executor::RowIdGenerator,
}

impl Database {
    /// Open (or create) the database file at `path`. Crash recovery runs
    /// inside [`Engine::open`] before this returns.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let engine = Engine::open(path)?;
        Ok(Database { engine, row_ids: executor::RowIdGenerator::new() })
    }

    pub fn open_with_pool_size<P: AsRef<Path>>(path: P, pool_size: usize) -> Result<Self> {
        let engine = Engine::open_with_pool_size(path, pool_size)?;
        Ok(Database { engine, row_ids: executor::RowIdGenerator::new() })
    }

    /// Parse and run one SQL statement.
    pub fn execute(&self, sql: &str) -> Result<ExecOutput> {
        let statement = parser::parse(sql)?;
        self.execute_statement(&statement)
    }

    fn execute_statement(&self, statement: &Statement) -> Result<ExecOutput> {
        match statement {
            Statement::CreateTable { table, columns } => {
                let cols: Vec<(String, catalog::ColumnType)> =
                    columns.iter().map(|c| (c.name.clone(), c.col_type)).collect();
                catalog::create_table(&self.engine, table, &cols)?;
                Ok(ExecOutput::Message(format!("CREATE TABLE {table}")))
            }
            Statement::DropTable { table } => {
                catalog::drop_table(&self.engine, table)?;
                Ok(ExecOutput::Message(format!("DROP TABLE {table}")))
            }
            Statement::AlterTableAdd { table, column } => {
                catalog::add_column(&self.engine, table, &column.name, column.col_type)?;
                Ok(ExecOutput::Message(format!("ALTER TABLE {table} ADD COLUMN {}", column.name)))
            }
            Statement::CreateIndex { index, table, column } => {
                catalog::create_index(&self.engine, index, table, column)?;
                Ok(ExecOutput::Message(format!("CREATE INDEX {index}")))
            }
            Statement::DropIndex { index } => {
                catalog::drop_index(&self.engine, index)?;
                Ok(ExecOutput::Message(format!("DROP INDEX {index}")))
            }
            Statement::Insert { table, values } => {
                let message = executor::execute_insert(&self.engine, table, values, &self.row_ids)?;
                Ok(ExecOutput::Message(message))
            }
            Statement::Select(select) => {
                let (columns, rows) = executor::execute_select(select, &self.engine)?;
                Ok(ExecOutput::Rows { columns, rows })
            }
            Statement::Update { table, assignments, filter } => {
                let message = executor::execute_update(&self.engine, table, assignments, filter.as_ref())?;
                Ok(ExecOutput::Message(message))
            }
            Statement::Delete { table, filter } => {
                let message = executor::execute_delete(&self.engine, table, filter.as_ref())?;
                Ok(ExecOutput::Message(message))
            }
            Statement::Explain(select) => {
                let plan = planner::plan_select(select, &self.engine)?;
                Ok(ExecOutput::Explain(planner::explain(&plan)))
            }
        }
    }

    /// Force a WAL checkpoint.
    pub fn checkpoint(&self) -> Result<()> {
        self.engine.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ddl_insert_select_round_trip() {
        let dir = tempdir().unwrap();
        let db = Database::open_with_pool_size(dir.path().join("t.db"), 64).unwrap();

        db.execute("CREATE TABLE t (id INT, name TEXT)").unwrap();
        db.execute("INSERT INTO t VALUES (1, 'Alice')").unwrap();
        db.execute("INSERT INTO t VALUES (2, 'Bob')").unwrap();

        match db.execute("SELECT * FROM t ORDER BY id").unwrap() {
            ExecOutput::Rows { columns, rows } => {
                assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
                assert_eq!(rows.len(), 2);
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn test_explain_reports_plan_text() {
        let dir = tempdir().unwrap();
        let db = Database::open_with_pool_size(dir.path().join("t.db"), 64).unwrap();
        db.execute("CREATE TABLE t (id INT)").unwrap();

        match db.execute("EXPLAIN SELECT * FROM t WHERE id = 1").unwrap() {
            ExecOutput::Explain(text) => assert!(text.contains("Scan")),
            other => panic!("expected Explain, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_on_reopen_preserves_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");

        {
            let db = Database::open_with_pool_size(&path, 64).unwrap();
            db.execute("CREATE TABLE t (id INT)").unwrap();
            db.execute("INSERT INTO t VALUES (1)").unwrap();
        }

        let db = Database::open_with_pool_size(&path, 64).unwrap();
        match db.execute("SELECT * FROM t").unwrap() {
            ExecOutput::Rows { rows, .. } => assert_eq!(rows, vec![vec![Value::Int(1)]]),
            other => panic!("expected Rows, got {other:?}"),
        }
    }
}
