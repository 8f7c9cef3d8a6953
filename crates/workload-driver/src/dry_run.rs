//! Driver that logs the SQL it would run and executes nothing.

use crate::driver::{Driver, DriverStat, StepStatus};
use crate::error::DriverError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};
use workload_core::ddl::{create_table_statements, insert_statement, isolation_clause};
use workload_core::wire::decode;
use workload_core::{InsertMethod, ResolvedQuery, ResolvedUnit, RowBatch};

/// Totals accumulated by a [`DryRunDriver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DryRunTotals {
    pub units: u64,
    pub statements: u64,
    pub batches: u64,
    pub rows: u64,
}

/// Decodes every operation, renders it as SQL at debug level and reports
/// success.
#[derive(Debug, Default)]
pub struct DryRunDriver {
    units: AtomicU64,
    statements: AtomicU64,
    batches: AtomicU64,
    rows: AtomicU64,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the counters.
    pub fn totals(&self) -> DryRunTotals {
        DryRunTotals {
            units: self.units.load(Ordering::Relaxed),
            statements: self.statements.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
        }
    }

    fn log_query(query: &ResolvedQuery) {
        let args: Vec<String> = query.args.iter().map(ToString::to_string).collect();
        debug!(query = %query.name, args = %args.join(", "), "{}", query.sql);
    }
}

#[async_trait]
impl Driver for DryRunDriver {
    async fn run_unit(&self, unit: &[u8]) -> Result<DriverStat, DriverError> {
        let start = Instant::now();
        let unit: ResolvedUnit = decode(unit)?;

        let statements = match &unit {
            ResolvedUnit::Query(query) => {
                Self::log_query(query);
                1
            }
            ResolvedUnit::CreateTable(table) => {
                let statements = create_table_statements(table);
                for sql in &statements {
                    debug!(table = %table.name, "{}", sql);
                }
                statements.len() as u64
            }
            ResolvedUnit::Transaction {
                name,
                isolation_level,
                queries,
            } => {
                match isolation_clause(*isolation_level) {
                    Some(clause) => debug!(transaction = %name, "BEGIN {}", clause),
                    None => debug!(transaction = %name, "BEGIN"),
                }
                for query in queries {
                    Self::log_query(query);
                }
                debug!(transaction = %name, "COMMIT");
                queries.len() as u64
            }
        };

        self.units.fetch_add(1, Ordering::Relaxed);
        self.statements.fetch_add(statements, Ordering::Relaxed);
        Ok(DriverStat {
            statements,
            rows: 0,
            duration: start.elapsed(),
        })
    }

    async fn insert_rows(&self, batch: &[u8], row_count: u64) -> Result<DriverStat, DriverError> {
        let start = Instant::now();
        let batch: RowBatch = decode(batch)?;
        batch.validate()?;
        if batch.len() as u64 != row_count {
            return Err(DriverError::driver(
                1,
                format!(
                    "batch for '{}' holds {} rows, caller announced {row_count}",
                    batch.table_name,
                    batch.len()
                ),
            ));
        }

        match batch.method {
            InsertMethod::BulkCopy => debug!(
                table = %batch.table_name,
                first_row = batch.first_row,
                rows = row_count,
                "COPY {} ({}) FROM STDIN",
                batch.table_name,
                batch.columns.join(", ")
            ),
            InsertMethod::RowByRow => {
                let (sql, args) = insert_statement(&batch.table_name, &batch.columns, &batch.rows);
                debug!(
                    table = %batch.table_name,
                    first_row = batch.first_row,
                    args = args.len(),
                    "{}",
                    sql
                );
            }
        }

        self.batches.fetch_add(1, Ordering::Relaxed);
        self.rows.fetch_add(row_count, Ordering::Relaxed);
        Ok(DriverStat {
            statements: 1,
            rows: row_count,
            duration: start.elapsed(),
        })
    }

    async fn notify_step(&self, step: &str, status: StepStatus) -> Result<(), DriverError> {
        info!(step = %step, status = %status, "Step status");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use workload_core::wire::encode;
    use workload_core::{IsolationLevel, Value};

    fn query(name: &str) -> ResolvedQuery {
        ResolvedQuery {
            name: name.to_string(),
            sql: "SELECT $1".to_string(),
            args: vec![Value::Int32(1)],
            params: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_counts_statements_and_rows() {
        let driver = DryRunDriver::new();
        let tx = ResolvedUnit::Transaction {
            name: "tx".to_string(),
            isolation_level: IsolationLevel::ReadCommitted,
            queries: vec![query("a"), query("b")],
        };
        let stat = driver.run_unit(&encode(&tx).unwrap()).await.unwrap();
        assert_eq!(stat.statements, 2);

        let batch = RowBatch {
            table_name: "t".to_string(),
            columns: vec!["id".to_string()],
            method: InsertMethod::RowByRow,
            first_row: 0,
            rows: vec![vec![Value::Int32(1)], vec![Value::Int32(2)]],
        };
        let stat = driver.insert_rows(&encode(&batch).unwrap(), 2).await.unwrap();
        assert_eq!(stat.rows, 2);

        assert_eq!(
            driver.totals(),
            DryRunTotals {
                units: 1,
                statements: 2,
                batches: 1,
                rows: 2
            }
        );
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let driver = DryRunDriver::new();
        assert!(matches!(
            driver.run_unit(b"not a message").await,
            Err(DriverError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_row_count_mismatch() {
        let driver = DryRunDriver::new();
        let batch = RowBatch {
            table_name: "t".to_string(),
            columns: vec!["id".to_string()],
            method: InsertMethod::BulkCopy,
            first_row: 0,
            rows: vec![vec![Value::Int32(1)]],
        };
        assert!(matches!(
            driver.insert_rows(&encode(&batch).unwrap(), 5).await,
            Err(DriverError::Driver { .. })
        ));
    }
}
