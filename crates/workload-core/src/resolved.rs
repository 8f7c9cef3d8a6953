//! Resolved operations: what actually crosses the driver boundary.
//!
//! A resolved operation carries concrete values only. The generation side
//! produces it; the driver executes it and never sees a rule.

use crate::descriptor::{CreateTable, InsertMethod, IsolationLevel};
use crate::error::{Result, WorkloadError};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One query with concrete parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuery {
    /// Query name
    pub name: String,

    /// SQL with positional `$N` markers
    pub sql: String,

    /// Values for `$1..$N`, in marker order
    pub args: Vec<Value>,

    /// Every bound parameter by name, including ones the SQL does not use
    pub params: BTreeMap<String, Value>,
}

/// A resolved unit ready for `run_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolvedUnit {
    Query(ResolvedQuery),

    CreateTable(CreateTable),

    Transaction {
        /// Transaction name
        name: String,
        /// Isolation level requested from the driver
        isolation_level: IsolationLevel,
        /// Queries in execution order, repeats unrolled
        queries: Vec<ResolvedQuery>,
    },
}

impl ResolvedUnit {
    /// Name of the originating unit.
    pub fn name(&self) -> &str {
        match self {
            ResolvedUnit::Query(query) => &query.name,
            ResolvedUnit::CreateTable(table) => &table.name,
            ResolvedUnit::Transaction { name, .. } => name,
        }
    }

    /// Number of statements the driver will execute.
    pub fn statement_count(&self) -> usize {
        match self {
            ResolvedUnit::Query(_) => 1,
            ResolvedUnit::CreateTable(table) => 1 + table.indexes.len(),
            ResolvedUnit::Transaction { queries, .. } => queries.len(),
        }
    }
}

/// A batch of generated rows for `insert_rows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    /// Target table
    pub table_name: String,

    /// Column names in row order
    pub columns: Vec<String>,

    /// Load path hint
    pub method: InsertMethod,

    /// Index of the first row of this batch within the whole insert
    #[serde(default)]
    pub first_row: u64,

    /// Row values, each in column order
    pub rows: Vec<Vec<Value>>,
}

impl RowBatch {
    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check that every row matches the column list.
    pub fn validate(&self) -> Result<()> {
        for row in &self.rows {
            if row.len() != self.columns.len() {
                return Err(WorkloadError::GroupArityMismatch {
                    group: self.table_name.clone(),
                    expected: self.columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(rows: Vec<Vec<Value>>) -> RowBatch {
        RowBatch {
            table_name: "item".to_string(),
            columns: vec!["i_id".to_string(), "i_name".to_string()],
            method: InsertMethod::BulkCopy,
            first_row: 0,
            rows,
        }
    }

    #[test]
    fn test_row_batch_validate() {
        let ok = batch(vec![vec![Value::Int32(1), Value::from("a")]]);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.len(), 1);

        let bad = batch(vec![vec![Value::Int32(1)]]);
        assert!(matches!(
            bad.validate(),
            Err(WorkloadError::GroupArityMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_statement_count() {
        let tx = ResolvedUnit::Transaction {
            name: "tx".to_string(),
            isolation_level: IsolationLevel::Serializable,
            queries: vec![],
        };
        assert_eq!(tx.statement_count(), 0);
        assert_eq!(tx.name(), "tx");
    }
}
