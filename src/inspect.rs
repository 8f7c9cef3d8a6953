//! Offline inspection of workloads: summaries, wire payloads, previews and
//! row dumps.

use anyhow::Context;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use workload_core::wire::{decode, encode, peek_kind, PayloadKind};
use workload_core::{
    DriverConfig, GenerationRule, GroupBinding, ParamBinding, ResolvedUnit, RowBatch, Step, Unit,
    Workload,
};
use workload_generator::{InsertStream, Resolved, UnitInstance};

/// Load a workload file, naming it in the error.
pub fn load_workload<P: AsRef<Path>>(path: P) -> anyhow::Result<Workload> {
    let path = path.as_ref();
    Workload::from_file(path).with_context(|| format!("Failed to load workload from {path:?}"))
}

/// Human-readable outline of a workload.
pub fn describe(workload: &Workload) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Workload '{}' (seed={})", workload.name, workload.seed);
    for (key, value) in &workload.metadata {
        let _ = writeln!(out, "  {key}: {value}");
    }
    for step in &workload.steps {
        let mode = if step.concurrent { ", concurrent" } else { "" };
        let _ = writeln!(out, "  step '{}' [{:?}{mode}]", step.name, step.phase);
        for unit in &step.units {
            let detail = match unit {
                Unit::Insert(insert) => format!(" {} rows", insert.row_count),
                Unit::Transaction(tx) => {
                    format!(" {} queries x {}", tx.queries.len(), tx.repeat_count)
                }
                Unit::Query(_) | Unit::CreateTable(_) => String::new(),
            };
            let _ = writeln!(out, "    {} '{}'{detail}", unit.kind(), unit.name());
        }
    }
    out
}

/// Render any wire payload as YAML, whatever its kind.
pub fn decode_payload(bytes: &[u8]) -> anyhow::Result<String> {
    let (version, kind) = peek_kind(bytes)?;
    tracing::debug!(version, ?kind, "Decoding payload");
    let yaml = match kind {
        PayloadKind::Workload => serde_yaml::to_string(&decode::<Workload>(bytes)?)?,
        PayloadKind::Step => serde_yaml::to_string(&decode::<Step>(bytes)?)?,
        PayloadKind::Unit => serde_yaml::to_string(&decode::<Unit>(bytes)?)?,
        PayloadKind::ParamBinding => serde_yaml::to_string(&decode::<ParamBinding>(bytes)?)?,
        PayloadKind::GroupBinding => serde_yaml::to_string(&decode::<GroupBinding>(bytes)?)?,
        PayloadKind::GenerationRule => serde_yaml::to_string(&decode::<GenerationRule>(bytes)?)?,
        PayloadKind::DriverConfig => serde_yaml::to_string(&decode::<DriverConfig>(bytes)?)?,
        PayloadKind::ResolvedUnit => serde_yaml::to_string(&decode::<ResolvedUnit>(bytes)?)?,
        PayloadKind::RowBatch => serde_yaml::to_string(&decode::<RowBatch>(bytes)?)?,
    };
    Ok(yaml)
}

/// Encode a workload, or a single unit of it when `unit` is given.
pub fn encode_workload(workload: &Workload, unit: Option<&str>) -> anyhow::Result<Vec<u8>> {
    Ok(match unit {
        Some(name) => encode(workload.find_unit(name)?)?,
        None => encode(workload)?,
    })
}

/// What a preview produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    /// Successive invocations of a query, transaction or schema unit
    Units(Vec<ResolvedUnit>),
    /// Leading rows of an insert
    Rows(RowBatch),
}

/// Resolve `count` invocations of a unit, or its first `count` rows for
/// an insert.
pub fn preview(workload: &Workload, unit: &str, count: u64) -> anyhow::Result<Preview> {
    let found = workload.find_unit(unit)?;
    if let Unit::Insert(insert) = found {
        let stream = InsertStream::new(workload.seed, insert)?;
        let end = count.min(stream.remaining());
        let columns = stream.columns().to_vec();
        let mut stream = stream
            .with_row_range(0..end)
            .with_batch_size(end.max(1) as usize);
        let batch = match stream.next() {
            Some(batch) => batch?,
            None => RowBatch {
                table_name: insert.table_name.clone(),
                columns,
                method: insert.method,
                first_row: 0,
                rows: vec![],
            },
        };
        return Ok(Preview::Rows(batch));
    }

    let mut instance = UnitInstance::new(workload.seed, found)?;
    let mut units = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match instance.resolve()? {
            Resolved::Unit(resolved) => units.push(resolved),
            Resolved::Rows(_) => anyhow::bail!("unit '{unit}' resolved to rows"),
        }
    }
    Ok(Preview::Units(units))
}

/// Write rows `start..end` of an insert as tab-separated text with a
/// header line. `end` defaults to the row count. Returns the number of rows
/// written.
pub fn write_rows<W: Write>(
    workload: &Workload,
    unit: &str,
    start: u64,
    end: Option<u64>,
    batch_size: usize,
    out: &mut W,
) -> anyhow::Result<u64> {
    let found = workload.find_unit(unit)?;
    let Unit::Insert(insert) = found else {
        anyhow::bail!("unit '{unit}' is a {}, not an insert", found.kind());
    };
    let end = end.unwrap_or(insert.row_count).min(insert.row_count);
    if start > end {
        anyhow::bail!("row range {start}..{end} is empty or reversed");
    }

    let stream = InsertStream::new(workload.seed, insert)?
        .with_row_range(start..end)
        .with_batch_size(batch_size);

    writeln!(out, "{}", stream.columns().join("\t"))?;
    let mut written = 0u64;
    for batch in stream {
        let batch = batch?;
        for row in &batch.rows {
            let line: Vec<String> = row.iter().map(ToString::to_string).collect();
            writeln!(out, "{}", line.join("\t"))?;
        }
        written += batch.len() as u64;
    }
    Ok(written)
}
