//! Workload descriptor tree: `Workload -> Step -> Unit`.
//!
//! The tree is built once (usually from YAML), validated, and then either
//! resolved in-process or encoded for an external driver.

use crate::error::{Result, WorkloadError};
use crate::placeholder::referenced_names;
use crate::rule::GenerationRule;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

// ============================================================================
// Parameter Bindings
// ============================================================================

/// A named parameter bound to a generation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBinding {
    /// Parameter (or column) name
    pub name: String,

    /// Seed sub-stream of the generator; 0 means "not yet assigned"
    #[serde(default)]
    pub ordinal: u64,

    /// How values are produced
    pub rule: GenerationRule,
}

impl ParamBinding {
    /// Create a binding with an unassigned ordinal.
    pub fn new(name: impl Into<String>, rule: GenerationRule) -> Self {
        Self {
            name: name.into(),
            ordinal: 0,
            rule,
        }
    }

    /// Set the ordinal explicitly.
    pub fn with_ordinal(mut self, ordinal: u64) -> Self {
        self.ordinal = ordinal;
        self
    }
}

/// Parameters drawn in lockstep as one tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBinding {
    /// Group name
    pub name: String,

    /// Seed sub-stream of the combined permutation (unique groups)
    #[serde(default)]
    pub ordinal: u64,

    /// The tuple as a whole is unique across the Cartesian product
    #[serde(default)]
    pub unique: bool,

    /// Members in tuple order
    pub params: Vec<ParamBinding>,
}

impl GroupBinding {
    /// Create a group with an unassigned ordinal.
    pub fn new(name: impl Into<String>, params: Vec<ParamBinding>) -> Self {
        Self {
            name: name.into(),
            ordinal: 0,
            unique: false,
            params,
        }
    }

    /// Mark the whole tuple unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Product of member domain sizes, if every member is enumerable and
    /// the product fits in a `u64`.
    pub fn combined_domain_size(&self) -> Option<u64> {
        self.params.iter().try_fold(1u64, |acc, param| {
            param
                .rule
                .domain_size()
                .and_then(|size| acc.checked_mul(size))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.params.is_empty() {
            return Err(WorkloadError::GroupArityMismatch {
                group: self.name.clone(),
                expected: 1,
                actual: 0,
            });
        }
        for param in &self.params {
            param.rule.validate()?;
        }
        if self.unique {
            let has_nulls = self.params.iter().any(|p| p.rule.null_percentage > 0);
            let enumerable = self.params.iter().all(|p| p.rule.domain_size().is_some());
            if !enumerable || has_nulls {
                return Err(WorkloadError::invalid_rule(format!(
                    "group '{}' is unique but a member is not enumerable or produces NULLs",
                    self.name
                )));
            }
            if self.combined_domain_size().is_none() {
                return Err(WorkloadError::invalid_rule(format!(
                    "unique group '{}' spans more than {} tuples",
                    self.name,
                    u64::MAX
                )));
            }
            if let Some(member) = self.params.iter().find(|p| p.rule.unique) {
                return Err(WorkloadError::invalid_rule(format!(
                    "member '{}' of unique group '{}' cannot be unique on its own",
                    member.name, self.name
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Table Definitions
// ============================================================================

/// Column of a table created by a `CreateTable` unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,

    /// SQL type, passed to the database verbatim
    pub sql_type: String,

    /// Whether this column is nullable
    #[serde(default)]
    pub nullable: bool,

    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,

    /// Has a UNIQUE constraint
    #[serde(default)]
    pub unique: bool,

    /// Raw constraint text replacing the generated NOT NULL / UNIQUE clauses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl ColumnDef {
    /// Create a NOT NULL column.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: false,
            primary_key: false,
            unique: false,
            constraint: None,
        }
    }

    /// Mark the column as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the column nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Secondary index of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name
    pub name: String,

    /// Indexed columns in order
    pub columns: Vec<String>,

    /// Unique index
    #[serde(default)]
    pub unique: bool,
}

// ============================================================================
// Units
// ============================================================================

/// Transaction isolation level requested from the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Driver default
    #[default]
    Unspecified,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// How the driver should load insert batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMethod {
    /// One INSERT statement per row (or per batch)
    #[default]
    RowByRow,
    /// High-throughput path such as COPY FROM
    BulkCopy,
}

/// Parameterized SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Query name, unique within its step
    pub name: String,

    /// SQL template with `:name` or `${name}` placeholders
    pub sql: String,

    /// Individually generated parameters
    #[serde(default)]
    pub params: Vec<ParamBinding>,

    /// Parameters generated as tuples
    #[serde(default)]
    pub groups: Vec<GroupBinding>,
}

impl Query {
    /// Create a query without parameters.
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            params: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Add a parameter.
    pub fn param(mut self, name: impl Into<String>, rule: GenerationRule) -> Self {
        self.params.push(ParamBinding::new(name, rule));
        self
    }

    /// Add a group.
    pub fn group(mut self, group: GroupBinding) -> Self {
        self.groups.push(group);
        self
    }

    /// Every bound name: params first, then group members.
    pub fn bound_names(&self) -> Vec<&str> {
        bound_names(&self.params, &self.groups)
    }

    fn validate(&self) -> Result<()> {
        validate_bindings(&self.name, &self.params, &self.groups)?;
        let bound: HashSet<&str> = self.bound_names().into_iter().collect();
        for name in referenced_names(&self.sql) {
            if !bound.contains(name.as_str()) {
                return Err(WorkloadError::UnresolvedParameter {
                    unit: self.name.clone(),
                    name,
                });
            }
        }
        Ok(())
    }
}

/// Table creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTable {
    /// Table name
    pub name: String,

    /// Columns in order
    pub columns: Vec<ColumnDef>,

    /// Secondary indexes
    #[serde(default)]
    pub indexes: Vec<IndexDef>,

    /// Raw table-level constraint clauses
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// Bulk insert of generated rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    /// Unit name; defaults to the table name
    #[serde(default)]
    pub name: String,

    /// Target table
    pub table_name: String,

    /// Number of rows to emit
    pub row_count: u64,

    /// Individually generated columns
    #[serde(default)]
    pub columns: Vec<ParamBinding>,

    /// Columns generated as tuples
    #[serde(default)]
    pub groups: Vec<GroupBinding>,

    /// Load path hint for the driver
    #[serde(default)]
    pub method: InsertMethod,
}

impl Insert {
    /// Column names in row order: plain columns, then group members.
    pub fn column_names(&self) -> Vec<&str> {
        bound_names(&self.columns, &self.groups)
    }

    /// Unit name, falling back to the table name.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.table_name
        } else {
            &self.name
        }
    }

    fn validate(&self) -> Result<()> {
        let name = self.display_name();
        validate_bindings(name, &self.columns, &self.groups)?;
        for column in self.columns.iter().filter(|c| c.rule.unique) {
            check_domain_fits(name, &column.name, column.rule.domain_size(), self.row_count)?;
        }
        for group in &self.groups {
            if group.unique {
                check_domain_fits(name, &group.name, group.combined_domain_size(), self.row_count)?;
            }
            for member in group.params.iter().filter(|p| p.rule.unique) {
                check_domain_fits(name, &member.name, member.rule.domain_size(), self.row_count)?;
            }
        }
        Ok(())
    }
}

fn check_domain_fits(unit: &str, name: &str, domain: Option<u64>, rows: u64) -> Result<()> {
    match domain {
        Some(size) if size >= rows => Ok(()),
        Some(size) => Err(WorkloadError::invalid_rule(format!(
            "'{unit}.{name}' is unique over {size} values but {rows} rows are requested"
        ))),
        None => Err(WorkloadError::invalid_rule(format!(
            "'{unit}.{name}' is unique over a non-enumerable domain"
        ))),
    }
}

fn default_repeat_count() -> u32 {
    1
}

/// Ordered queries sharing one isolation level and commit boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction name
    pub name: String,

    /// Isolation level requested from the driver
    #[serde(default)]
    pub isolation_level: IsolationLevel,

    /// Queries in execution order
    pub queries: Vec<Query>,

    /// How many times the query list repeats inside the transaction
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
}

/// An atomic described operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Unit {
    Query(Query),
    CreateTable(CreateTable),
    Insert(Insert),
    Transaction(Transaction),
}

impl Unit {
    /// Unit name used for lookups and logs.
    pub fn name(&self) -> &str {
        match self {
            Unit::Query(query) => &query.name,
            Unit::CreateTable(table) => &table.name,
            Unit::Insert(insert) => insert.display_name(),
            Unit::Transaction(tx) => &tx.name,
        }
    }

    /// Short name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Unit::Query(_) => "query",
            Unit::CreateTable(_) => "create_table",
            Unit::Insert(_) => "insert",
            Unit::Transaction(_) => "transaction",
        }
    }

    /// Validate rules, bindings and placeholders of this unit.
    pub fn validate(&self) -> Result<()> {
        match self {
            Unit::Query(query) => query.validate(),
            Unit::CreateTable(_) => Ok(()),
            Unit::Insert(insert) => insert.validate(),
            Unit::Transaction(tx) => tx.queries.iter().try_for_each(Query::validate),
        }
    }

    /// Every `(label, ordinal)` slot of this unit in declaration order.
    pub fn ordinal_slots(&self) -> Vec<(String, u64)> {
        let mut slots = Vec::new();
        match self {
            Unit::Query(query) => {
                collect_bindings(&query.name, &query.params, &query.groups, &mut slots)
            }
            Unit::CreateTable(_) => {}
            Unit::Insert(insert) => collect_bindings(
                insert.display_name(),
                &insert.columns,
                &insert.groups,
                &mut slots,
            ),
            Unit::Transaction(tx) => {
                for query in &tx.queries {
                    let scope = format!("{}.{}", tx.name, query.name);
                    collect_bindings(&scope, &query.params, &query.groups, &mut slots);
                }
            }
        }
        slots
    }

    /// Mutable counterpart of [`Unit::ordinal_slots`], same order.
    fn for_each_ordinal(&mut self, f: &mut impl FnMut(&mut u64)) {
        match self {
            Unit::Query(query) => visit_bindings(&mut query.params, &mut query.groups, f),
            Unit::CreateTable(_) => {}
            Unit::Insert(insert) => visit_bindings(&mut insert.columns, &mut insert.groups, f),
            Unit::Transaction(tx) => {
                for query in &mut tx.queries {
                    visit_bindings(&mut query.params, &mut query.groups, f);
                }
            }
        }
    }
}

impl From<Query> for Unit {
    fn from(query: Query) -> Self {
        Unit::Query(query)
    }
}

impl From<CreateTable> for Unit {
    fn from(table: CreateTable) -> Self {
        Unit::CreateTable(table)
    }
}

impl From<Insert> for Unit {
    fn from(insert: Insert) -> Self {
        Unit::Insert(insert)
    }
}

impl From<Transaction> for Unit {
    fn from(tx: Transaction) -> Self {
        Unit::Transaction(tx)
    }
}

fn bound_names<'a>(params: &'a [ParamBinding], groups: &'a [GroupBinding]) -> Vec<&'a str> {
    params
        .iter()
        .map(|p| p.name.as_str())
        .chain(
            groups
                .iter()
                .flat_map(|g| g.params.iter().map(|p| p.name.as_str())),
        )
        .collect()
}

fn validate_bindings(unit: &str, params: &[ParamBinding], groups: &[GroupBinding]) -> Result<()> {
    let mut seen = HashSet::new();
    for name in bound_names(params, groups) {
        if !seen.insert(name) {
            return Err(WorkloadError::DuplicateParameter {
                unit: unit.to_string(),
                name: name.to_string(),
            });
        }
    }
    for param in params {
        param.rule.validate()?;
    }
    for group in groups {
        group.validate()?;
    }
    Ok(())
}

fn collect_bindings(
    scope: &str,
    params: &[ParamBinding],
    groups: &[GroupBinding],
    out: &mut Vec<(String, u64)>,
) {
    for param in params {
        out.push((format!("{scope}.{}", param.name), param.ordinal));
    }
    for group in groups {
        out.push((format!("{scope}.{}", group.name), group.ordinal));
        for param in &group.params {
            out.push((format!("{scope}.{}.{}", group.name, param.name), param.ordinal));
        }
    }
}

fn visit_bindings(
    params: &mut [ParamBinding],
    groups: &mut [GroupBinding],
    f: &mut impl FnMut(&mut u64),
) {
    for param in params.iter_mut() {
        f(&mut param.ordinal);
    }
    for group in groups.iter_mut() {
        f(&mut group.ordinal);
        for param in group.params.iter_mut() {
            f(&mut param.ordinal);
        }
    }
}

// ============================================================================
// Steps and Workloads
// ============================================================================

/// Which harness phase runs a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    /// Once, before the steady state
    Setup,
    /// Every iteration of the steady state
    #[default]
    Workload,
    /// Once, after the steady state
    Teardown,
}

/// A named group of units forming one benchmark phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name
    pub name: String,

    /// Harness phase
    #[serde(default)]
    pub phase: StepPhase,

    /// Units may be resolved and executed concurrently
    #[serde(default)]
    pub concurrent: bool,

    /// Units in order
    pub units: Vec<Unit>,
}

impl Step {
    /// Create a sequential workload-phase step.
    pub fn new(name: impl Into<String>, units: Vec<Unit>) -> Self {
        Self {
            name: name.into(),
            phase: StepPhase::Workload,
            concurrent: false,
            units,
        }
    }

    /// Set the phase.
    pub fn in_phase(mut self, phase: StepPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Mark the step concurrent.
    pub fn concurrent(mut self) -> Self {
        self.concurrent = true;
        self
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    /// Workload name
    pub name: String,

    /// Run seed
    #[serde(default)]
    pub seed: u64,

    /// Free-form metadata (benchmark type, scale, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Steps in order
    pub steps: Vec<Step>,
}

impl Workload {
    /// Create an empty workload.
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            seed,
            metadata: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Load a workload from a YAML file, assign ordinals and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a workload from YAML, assign ordinals and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut workload: Workload = serde_yaml::from_str(yaml)?;
        workload.assign_ordinals();
        workload.validate()?;
        Ok(workload)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Every unit in tree order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.steps.iter().flat_map(|step| step.units.iter())
    }

    /// Find a unit by name.
    pub fn find_unit(&self, name: &str) -> Result<&Unit> {
        self.units()
            .find(|unit| unit.name() == name)
            .ok_or_else(|| WorkloadError::UnitNotFound(name.to_string()))
    }

    /// Steps belonging to `phase`, in order.
    pub fn steps_in(&self, phase: StepPhase) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |step| step.phase == phase)
    }

    /// Give every unassigned (zero) ordinal a fresh value.
    ///
    /// Fresh ordinals start above the largest explicit one and follow tree
    /// order, so the same YAML always yields the same numbering.
    pub fn assign_ordinals(&mut self) {
        let max = self
            .units()
            .flat_map(Unit::ordinal_slots)
            .map(|(_, ordinal)| ordinal)
            .max()
            .unwrap_or(0);
        let mut next = max + 1;
        for unit in self.steps.iter_mut().flat_map(|step| step.units.iter_mut()) {
            unit.for_each_ordinal(&mut |ordinal: &mut u64| {
                if *ordinal == 0 {
                    *ordinal = next;
                    next += 1;
                }
            });
        }
    }

    /// Check the tree invariants: valid rules, resolvable placeholders and
    /// globally unique, assigned ordinals.
    pub fn validate(&self) -> Result<()> {
        for unit in self.units() {
            unit.validate()?;
        }

        let mut seen: HashMap<u64, String> = HashMap::new();
        for (label, ordinal) in self.units().flat_map(Unit::ordinal_slots) {
            if ordinal == 0 {
                return Err(WorkloadError::UnassignedOrdinal { name: label });
            }
            if let Some(first) = seen.get(&ordinal) {
                return Err(WorkloadError::DuplicateOrdinal {
                    ordinal,
                    first: first.clone(),
                    second: label,
                });
            }
            seen.insert(ordinal, label);
        }
        Ok(())
    }
}
