//! Splitting a call range across independent clients.
//!
//! Clients that each `resume_at(slice.start)` and draw `slice.len` values
//! together reproduce exactly the sequence of a single generator, so a
//! unique parameter stays unique across all of them.

use std::ops::Range;

/// Contiguous share of a call range assigned to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSlice {
    /// Zero-based client index
    pub client: usize,
    /// First call index of the slice
    pub start: u64,
    /// Number of calls in the slice
    pub len: u64,
}

impl CallSlice {
    /// One past the last call index.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    /// The slice as a range of call indices.
    pub fn range(&self) -> Range<u64> {
        self.start..self.end()
    }

    /// Whether the client has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Partition `[0, total)` into `clients` contiguous slices.
///
/// Sizes differ by at most one; earlier clients take the remainder.
/// Returns no slices for zero clients.
pub fn partition_calls(total: u64, clients: usize) -> Vec<CallSlice> {
    if clients == 0 {
        return Vec::new();
    }
    let count = clients as u64;
    let base = total / count;
    let remainder = total % count;

    let mut slices = Vec::with_capacity(clients);
    let mut start = 0u64;
    for client in 0..clients {
        let len = base + u64::from((client as u64) < remainder);
        slices.push(CallSlice { client, start, len });
        start += len;
    }
    slices
}

/// Describe a partitioning plan for logging.
pub fn describe_partitioning(slices: &[CallSlice]) -> String {
    let mut lines = Vec::with_capacity(slices.len() + 1);
    lines.push("Call distribution:".to_string());
    for slice in slices {
        lines.push(format!(
            "  client-{}: calls {}..{} ({} values)",
            slice.client + 1,
            slice.start,
            slice.end(),
            slice.len
        ));
    }
    lines.join("\n")
}
