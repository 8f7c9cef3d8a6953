//! Streaming row generation for `Insert` units.

use crate::resolve::BoundParams;
use std::ops::Range;
use tracing::{debug, info};
use workload_core::{Insert, InsertMethod, Result, RowBatch};

/// Rows per batch unless the caller asks otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Lazily generated row batches for one `Insert`.
///
/// Every column generator and group is called exactly once per row. Rows
/// are produced batch by batch and never held for the whole insert. A
/// generation error is yielded once and ends the stream; the rows of the
/// failed batch are discarded.
#[derive(Debug)]
pub struct InsertStream {
    table_name: String,
    columns: Vec<String>,
    method: InsertMethod,
    rows: Range<u64>,
    next_row: u64,
    /// Generator call index of row 0
    call_base: u64,
    batch_size: usize,
    bound: BoundParams,
    finished: bool,
}

impl InsertStream {
    /// Stream every row of `insert`.
    pub fn new(run_seed: u64, insert: &Insert) -> Result<Self> {
        let bound = BoundParams::new(run_seed, &insert.columns, &insert.groups)?;
        let columns = bound.names();
        Ok(Self {
            table_name: insert.table_name.clone(),
            columns,
            method: insert.method,
            rows: 0..insert.row_count,
            next_row: 0,
            call_base: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            bound,
            finished: false,
        })
    }

    /// Set the number of rows per batch (at least one).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Generate invocation `invocation` of the insert.
    ///
    /// Row `i` of invocation `k` is generator call `k * row_count + i`, so
    /// repeated invocations continue the sequences instead of replaying
    /// them, and unique columns run out with `DomainExhausted`.
    pub fn for_invocation(mut self, invocation: u64) -> Self {
        self.call_base = invocation.saturating_mul(self.rows.end);
        self.bound
            .resume_at(self.call_base.saturating_add(self.next_row));
        self
    }

    /// Restrict the stream to the rows in `range`, clamped to the insert.
    ///
    /// Row `i` is the same value whichever range produces it, so disjoint
    /// ranges can be loaded by different clients.
    pub fn with_row_range(mut self, range: Range<u64>) -> Self {
        let end = range.end.min(self.rows.end);
        let start = range.start.min(end);
        self.rows = start..end;
        self.next_row = start;
        self.bound.resume_at(self.call_base.saturating_add(start));
        self
    }

    /// Target table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Column names in row order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows not yet produced.
    pub fn remaining(&self) -> u64 {
        if self.finished {
            0
        } else {
            self.rows.end - self.next_row
        }
    }

    fn next_batch(&mut self) -> Result<RowBatch> {
        let first_row = self.next_row;
        let count = (self.rows.end - first_row).min(self.batch_size as u64) as usize;
        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            rows.push(self.bound.draw()?);
        }
        self.next_row += count as u64;

        let batch = RowBatch {
            table_name: self.table_name.clone(),
            columns: self.columns.clone(),
            method: self.method,
            first_row,
            rows,
        };
        batch.validate()?;
        debug!(
            table = %self.table_name,
            first_row,
            rows = batch.len(),
            "Generated row batch"
        );
        Ok(batch)
    }
}

impl Iterator for InsertStream {
    type Item = Result<RowBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_row >= self.rows.end {
            return None;
        }
        match self.next_batch() {
            Ok(batch) => {
                if self.next_row >= self.rows.end {
                    info!(
                        table = %self.table_name,
                        rows = self.rows.end - self.rows.start,
                        "Finished generating rows"
                    );
                }
                Some(Ok(batch))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let batches = self.remaining().div_ceil(self.batch_size as u64) as usize;
        (batches.min(1), Some(batches))
    }
}
