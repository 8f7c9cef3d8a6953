//! SQL text for table creation and row inserts.
//!
//! Drivers are free to build their own statements; these helpers give the
//! dry-run driver and SQL-speaking drivers one shared rendering.

use crate::descriptor::{ColumnDef, CreateTable, IndexDef, IsolationLevel};
use crate::value::Value;

fn column_clause(column: &ColumnDef) -> String {
    let mut clause = format!("{} {}", column.name, column.sql_type);
    match &column.constraint {
        Some(constraint) => {
            clause.push(' ');
            clause.push_str(constraint);
        }
        None => {
            if !column.nullable {
                clause.push_str(" NOT NULL");
            }
            if column.unique {
                clause.push_str(" UNIQUE");
            }
        }
    }
    clause
}

fn index_statement(table: &str, index: &IndexDef) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {unique}INDEX IF NOT EXISTS {} ON {table} ({})",
        index.name,
        index.columns.join(", ")
    )
}

/// `CREATE TABLE` followed by one `CREATE INDEX` per secondary index.
pub fn create_table_statements(table: &CreateTable) -> Vec<String> {
    let mut clauses: Vec<String> = table.columns.iter().map(column_clause).collect();

    let primary_key: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();
    if !primary_key.is_empty() {
        clauses.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }
    clauses.extend(table.constraints.iter().cloned());

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name,
        clauses.join(", ")
    )];
    statements.extend(
        table
            .indexes
            .iter()
            .map(|index| index_statement(&table.name, index)),
    );
    statements
}

/// Multi-row `INSERT` with positional markers, plus the flattened arguments.
pub fn insert_statement(table: &str, columns: &[String], rows: &[Vec<Value>]) -> (String, Vec<Value>) {
    let mut args = Vec::with_capacity(columns.len() * rows.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let markers: Vec<String> = row
            .iter()
            .map(|value| {
                args.push(value.clone());
                format!("${}", args.len())
            })
            .collect();
        tuples.push(format!("({})", markers.join(", ")));
    }
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {}",
        columns.join(", "),
        tuples.join(", ")
    );
    (sql, args)
}

/// `SET TRANSACTION` clause for a level, if one was requested.
pub fn isolation_clause(level: IsolationLevel) -> Option<&'static str> {
    match level {
        IsolationLevel::Unspecified => None,
        IsolationLevel::ReadUncommitted => Some("ISOLATION LEVEL READ UNCOMMITTED"),
        IsolationLevel::ReadCommitted => Some("ISOLATION LEVEL READ COMMITTED"),
        IsolationLevel::RepeatableRead => Some("ISOLATION LEVEL REPEATABLE READ"),
        IsolationLevel::Serializable => Some("ISOLATION LEVEL SERIALIZABLE"),
    }
}
