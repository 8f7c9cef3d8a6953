//! Per-invocation resolution of units into concrete operations.
//!
//! A [`UnitInstance`] owns fresh generators for one unit in one execution
//! context. Each [`UnitInstance::resolve`] calls every bound generator and
//! group exactly once and returns the concrete operation. Nothing here
//! performs I/O.

use crate::bulk::InsertStream;
use crate::generator::Generator;
use crate::group::GroupGenerator;
use std::collections::BTreeMap;
use tracing::debug;
use workload_core::placeholder::{to_positional, PositionalSql};
use workload_core::{
    CreateTable, GroupBinding, Insert, IsolationLevel, ParamBinding, Query, ResolvedQuery,
    ResolvedUnit, Result, Unit, Value, WorkloadError,
};

// ============================================================================
// Bound parameters
// ============================================================================

/// Generators for one parameter list, in declaration order.
#[derive(Debug, Clone)]
pub(crate) struct BoundParams {
    singles: Vec<(String, Generator)>,
    groups: Vec<GroupGenerator>,
}

impl BoundParams {
    pub(crate) fn new(run_seed: u64, params: &[ParamBinding], groups: &[GroupBinding]) -> Result<Self> {
        let singles = params
            .iter()
            .map(|p| Ok((p.name.clone(), Generator::new(run_seed, p.ordinal, p.rule.clone())?)))
            .collect::<Result<Vec<_>>>()?;
        let groups = groups
            .iter()
            .map(|g| GroupGenerator::from_binding(run_seed, g))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { singles, groups })
    }

    /// Draw one value per name: singles first, then group members.
    ///
    /// Every generator is called even after a failure; the first error is
    /// returned and no values are.
    pub(crate) fn draw(&mut self) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(self.singles.len());
        let mut first_error = None;

        for (_, generator) in &mut self.singles {
            match generator.next() {
                Ok(value) => values.push(value),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        for group in &mut self.groups {
            match group.next() {
                Ok(tuple) => values.extend(tuple),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(values),
        }
    }

    /// Names in the order [`BoundParams::draw`] yields values.
    pub(crate) fn names(&self) -> Vec<String> {
        self.singles
            .iter()
            .map(|(name, _)| name.clone())
            .chain(self.groups.iter().flat_map(|g| g.names().iter().cloned()))
            .collect()
    }

    /// Move every generator to call `call_index`.
    pub(crate) fn resume_at(&mut self, call_index: u64) {
        for (_, generator) in &mut self.singles {
            generator.resume_at(call_index);
        }
        for group in &mut self.groups {
            group.resume_at(call_index);
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// A query with its generators bound.
#[derive(Debug, Clone)]
pub struct QueryInstance {
    name: String,
    positional: PositionalSql,
    names: Vec<String>,
    bound: BoundParams,
}

impl QueryInstance {
    /// Bind generators for `query`.
    pub fn new(run_seed: u64, query: &Query) -> Result<Self> {
        let bound = BoundParams::new(run_seed, &query.params, &query.groups)?;
        let names = bound.names();
        let positional = to_positional(&query.sql);
        if let Some(missing) = positional.order.iter().find(|name| !names.contains(name)) {
            return Err(WorkloadError::UnresolvedParameter {
                unit: query.name.clone(),
                name: missing.clone(),
            });
        }
        Ok(Self {
            name: query.name.clone(),
            positional,
            names,
            bound,
        })
    }

    /// Query name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Draw fresh parameters.
    pub fn resolve(&mut self) -> Result<ResolvedQuery> {
        let values = self.bound.draw()?;
        let params: BTreeMap<String, Value> = self.names.iter().cloned().zip(values).collect();

        let args = self
            .positional
            .order
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| WorkloadError::UnresolvedParameter {
                        unit: self.name.clone(),
                        name: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedQuery {
            name: self.name.clone(),
            sql: self.positional.sql.clone(),
            args,
            params,
        })
    }

    pub(crate) fn resume_at(&mut self, call_index: u64) {
        self.bound.resume_at(call_index);
    }
}

// ============================================================================
// Units
// ============================================================================

/// Outcome of resolving one unit invocation.
#[derive(Debug)]
pub enum Resolved {
    /// A single operation for `run_unit`
    Unit(ResolvedUnit),
    /// Row batches for `insert_rows`
    Rows(InsertStream),
}

/// A unit with generators bound for one execution context.
#[derive(Debug, Clone)]
pub enum UnitInstance {
    Query(QueryInstance),
    CreateTable(CreateTable),
    Insert {
        run_seed: u64,
        insert: Insert,
        /// Invocations resolved so far
        invocations: u64,
    },
    Transaction {
        name: String,
        isolation_level: IsolationLevel,
        repeat_count: u32,
        queries: Vec<QueryInstance>,
    },
}

impl UnitInstance {
    /// Bind fresh generators for `unit`.
    pub fn new(run_seed: u64, unit: &Unit) -> Result<Self> {
        unit.validate()?;
        Ok(match unit {
            Unit::Query(query) => UnitInstance::Query(QueryInstance::new(run_seed, query)?),
            Unit::CreateTable(table) => UnitInstance::CreateTable(table.clone()),
            Unit::Insert(insert) => UnitInstance::Insert {
                run_seed,
                insert: insert.clone(),
                invocations: 0,
            },
            Unit::Transaction(tx) => UnitInstance::Transaction {
                name: tx.name.clone(),
                isolation_level: tx.isolation_level,
                repeat_count: tx.repeat_count,
                queries: tx
                    .queries
                    .iter()
                    .map(|q| QueryInstance::new(run_seed, q))
                    .collect::<Result<Vec<_>>>()?,
            },
        })
    }

    /// Name of the bound unit.
    pub fn name(&self) -> &str {
        match self {
            UnitInstance::Query(query) => query.name(),
            UnitInstance::CreateTable(table) => &table.name,
            UnitInstance::Insert { insert, .. } => insert.display_name(),
            UnitInstance::Transaction { name, .. } => name,
        }
    }

    /// Resolve one invocation.
    ///
    /// Inserts yield a row stream per invocation; invocation `k` continues
    /// the column generators at call `k * row_count`. Transactions draw
    /// all their queries up front, so a failure leaves nothing
    /// half-resolved.
    pub fn resolve(&mut self) -> Result<Resolved> {
        let resolved = match self {
            UnitInstance::Query(query) => ResolvedUnit::Query(query.resolve()?),
            UnitInstance::CreateTable(table) => ResolvedUnit::CreateTable(table.clone()),
            UnitInstance::Insert {
                run_seed,
                insert,
                invocations,
            } => {
                let invocation = *invocations;
                *invocations += 1;
                let stream = InsertStream::new(*run_seed, insert)?.for_invocation(invocation);
                return Ok(Resolved::Rows(stream));
            }
            UnitInstance::Transaction {
                name,
                isolation_level,
                repeat_count,
                queries,
            } => {
                let mut resolved = Vec::with_capacity(queries.len() * *repeat_count as usize);
                for _ in 0..*repeat_count {
                    for query in queries.iter_mut() {
                        resolved.push(query.resolve()?);
                    }
                }
                ResolvedUnit::Transaction {
                    name: name.clone(),
                    isolation_level: *isolation_level,
                    queries: resolved,
                }
            }
        };
        debug!(unit = %self.name(), "Resolved unit");
        Ok(Resolved::Unit(resolved))
    }

    /// Continue from invocation `invocation`.
    ///
    /// Transactions count one call per repeat, so invocation `k` of a
    /// transaction with `repeat_count` r starts at call `k * r`. Inserts
    /// count `row_count` calls per invocation.
    pub fn resume_at(&mut self, invocation: u64) {
        match self {
            UnitInstance::Query(query) => query.resume_at(invocation),
            UnitInstance::CreateTable(_) => {}
            UnitInstance::Insert { invocations, .. } => *invocations = invocation,
            UnitInstance::Transaction {
                repeat_count,
                queries,
                ..
            } => {
                let call_index = invocation.saturating_mul(*repeat_count as u64);
                for query in queries {
                    query.resume_at(call_index);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use workload_core::{GenerationRule, InsertMethod, Transaction};

    fn new_order() -> Query {
        let mut query = Query::new(
            "new_order",
            "SELECT NEWORD(:w_id, :d_id, :c_id, :ol_cnt, 0, ${w_id})",
        )
        .param("w_id", GenerationRule::int32_range(1, 10))
        .param("d_id", GenerationRule::int32_range(1, 10))
        .param("c_id", GenerationRule::int32_range(1, 3000))
        .param("ol_cnt", GenerationRule::int32_range(5, 15))
        .param("unused", GenerationRule::constant(1));
        for (i, param) in query.params.iter_mut().enumerate() {
            param.ordinal = i as u64 + 1;
        }
        query
    }

    #[test]
    fn test_query_resolved_many_times() {
        let mut instance = UnitInstance::new(42, &new_order().into()).unwrap();
        for _ in 0..1000 {
            let Resolved::Unit(ResolvedUnit::Query(query)) = instance.resolve().unwrap() else {
                panic!("expected query");
            };
            assert_eq!(query.sql, "SELECT NEWORD($1, $2, $3, $4, 0, $1)");
            assert_eq!(query.args.len(), 4);
            assert_eq!(query.params.len(), 5);
            let w_id = query.params["w_id"].as_i32().unwrap();
            let c_id = query.params["c_id"].as_i32().unwrap();
            let ol_cnt = query.params["ol_cnt"].as_i32().unwrap();
            assert!((1..=10).contains(&w_id));
            assert!((1..=3000).contains(&c_id));
            assert!((5..=15).contains(&ol_cnt));
            assert_eq!(query.args[0], query.params["w_id"]);
        }
    }

    #[test]
    fn test_same_context_is_reproducible() {
        let unit: Unit = new_order().into();
        let mut a = UnitInstance::new(7, &unit).unwrap();
        let mut b = UnitInstance::new(7, &unit).unwrap();
        for _ in 0..10 {
            let (Resolved::Unit(x), Resolved::Unit(y)) = (a.resolve().unwrap(), b.resolve().unwrap())
            else {
                panic!("expected units");
            };
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_unresolved_parameter() {
        let query = Query::new("q", "SELECT :nope");
        assert!(matches!(
            UnitInstance::new(1, &query.into()),
            Err(WorkloadError::UnresolvedParameter { .. })
        ));
    }

    #[test]
    fn test_transaction_unrolls_repeats() {
        let mut update = Query::new("update", "UPDATE t SET v = :v WHERE id = :id")
            .param("v", GenerationRule::int32_range(-5, 5))
            .param("id", GenerationRule::int32_range(1, 100));
        update.params[0].ordinal = 1;
        update.params[1].ordinal = 2;
        let tx = Transaction {
            name: "tx".to_string(),
            isolation_level: IsolationLevel::Serializable,
            queries: vec![update, Query::new("commit_marker", "SELECT 1")],
            repeat_count: 3,
        };
        let mut instance = UnitInstance::new(1, &tx.into()).unwrap();
        let Resolved::Unit(ResolvedUnit::Transaction {
            isolation_level,
            queries,
            ..
        }) = instance.resolve().unwrap()
        else {
            panic!("expected transaction");
        };
        assert_eq!(isolation_level, IsolationLevel::Serializable);
        assert_eq!(queries.len(), 6);
        assert_eq!(queries[1].name, "commit_marker");
        assert!(queries[1].args.is_empty());
    }

    #[test]
    fn test_exhaustion_fails_the_invocation() {
        let mut query = Query::new("q", "SELECT :id").param(
            "id",
            GenerationRule::int32_range(1, 2).unique(),
        );
        query.params[0].ordinal = 1;
        let mut instance = UnitInstance::new(1, &query.into()).unwrap();
        assert!(instance.resolve().is_ok());
        assert!(instance.resolve().is_ok());
        assert!(matches!(
            instance.resolve(),
            Err(WorkloadError::DomainExhausted { .. })
        ));
    }

    fn unique_insert() -> Unit {
        Insert {
            name: "load_ids".to_string(),
            table_name: "ids".to_string(),
            row_count: 10,
            columns: vec![
                ParamBinding::new("id", GenerationRule::int32_range(1, 10).unique()).with_ordinal(1),
            ],
            groups: vec![],
            method: InsertMethod::RowByRow,
        }
        .into()
    }

    fn rows(resolved: Resolved) -> InsertStream {
        let Resolved::Rows(stream) = resolved else {
            panic!("expected rows");
        };
        stream
    }

    #[test]
    fn test_second_insert_invocation_exhausts_unique_column() {
        let mut instance = UnitInstance::new(1, &unique_insert()).unwrap();

        let ids: HashSet<i32> = rows(instance.resolve().unwrap())
            .flat_map(|batch| batch.unwrap().rows)
            .map(|row| row[0].as_i32().unwrap())
            .collect();
        assert_eq!(ids.len(), 10);

        let mut second = rows(instance.resolve().unwrap());
        assert!(matches!(
            second.next(),
            Some(Err(WorkloadError::DomainExhausted {
                ordinal: 1,
                domain_size: 10
            }))
        ));
        assert!(second.next().is_none());
    }

    #[test]
    fn test_insert_resume_at_invocation() {
        let mut instance = UnitInstance::new(1, &unique_insert()).unwrap();
        instance.resume_at(1);
        let mut stream = rows(instance.resolve().unwrap());
        assert!(matches!(
            stream.next(),
            Some(Err(WorkloadError::DomainExhausted { .. }))
        ));

        instance.resume_at(0);
        assert!(rows(instance.resolve().unwrap()).all(|batch| batch.is_ok()));
    }

    #[test]
    fn test_resume_at_invocation() {
        let unit: Unit = new_order().into();
        let mut straight = UnitInstance::new(3, &unit).unwrap();
        let mut all = Vec::new();
        for _ in 0..5 {
            let Resolved::Unit(resolved) = straight.resolve().unwrap() else {
                panic!("expected unit");
            };
            all.push(resolved);
        }

        let mut resumed = UnitInstance::new(3, &unit).unwrap();
        resumed.resume_at(3);
        let Resolved::Unit(fourth) = resumed.resolve().unwrap() else {
            panic!("expected unit");
        };
        assert_eq!(fourth, all[3]);
    }
}
