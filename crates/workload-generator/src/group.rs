//! Generators that advance together and yield tuples.

use crate::generator::Generator;
use crate::permutation::Permutation;
use crate::seed::{permutation_key, sub_seed};
use workload_core::{GroupBinding, Result, Value, WorkloadError};

/// Uniqueness over the Cartesian product of member domains.
#[derive(Debug, Clone)]
struct ProductUnique {
    ordinal: u64,
    /// Member domain sizes, first member most significant
    radices: Vec<u64>,
    permutation: Permutation,
}

impl ProductUnique {
    /// Split a product index into one domain index per member.
    fn decode(&self, mut index: u64) -> Vec<u64> {
        let mut digits = vec![0u64; self.radices.len()];
        for (digit, radix) in digits.iter_mut().zip(&self.radices).rev() {
            *digit = index % radix;
            index /= radix;
        }
        digits
    }
}

/// Ordered `(name, Generator)` pairs drawn in lockstep.
///
/// Every `next()` advances each member by exactly one call, in declared
/// order, whether or not another member failed.
#[derive(Debug, Clone)]
pub struct GroupGenerator {
    name: String,
    names: Vec<String>,
    members: Vec<Generator>,
    product: Option<ProductUnique>,
    call_index: u64,
}

impl GroupGenerator {
    /// Pair `names` with `generators`.
    pub fn new(name: impl Into<String>, names: Vec<String>, generators: Vec<Generator>) -> Result<Self> {
        let name = name.into();
        if names.len() != generators.len() || names.is_empty() {
            return Err(WorkloadError::GroupArityMismatch {
                group: name,
                expected: names.len(),
                actual: generators.len(),
            });
        }
        Ok(Self {
            name,
            names,
            members: generators,
            product: None,
            call_index: 0,
        })
    }

    /// Build the group for a binding, honoring its `unique` flag.
    pub fn from_binding(run_seed: u64, binding: &GroupBinding) -> Result<Self> {
        let names = binding.params.iter().map(|p| p.name.clone()).collect();
        let generators = binding
            .params
            .iter()
            .map(|p| Generator::new(run_seed, p.ordinal, p.rule.clone()))
            .collect::<Result<Vec<_>>>()?;
        let group = Self::new(binding.name.clone(), names, generators)?;
        if binding.unique {
            group.unique_over_product(run_seed, binding.ordinal)
        } else {
            Ok(group)
        }
    }

    /// Make the tuple as a whole unique across the product of member domains.
    pub fn unique_over_product(mut self, run_seed: u64, ordinal: u64) -> Result<Self> {
        let mut radices = Vec::with_capacity(self.members.len());
        for (name, member) in self.names.iter().zip(&self.members) {
            let rule = member.rule();
            if rule.unique || rule.null_percentage > 0 {
                return Err(WorkloadError::invalid_rule(format!(
                    "member '{name}' of unique group '{}' must be a plain enumerable rule",
                    self.name
                )));
            }
            let size = member.domain_size().ok_or_else(|| {
                WorkloadError::invalid_rule(format!(
                    "member '{name}' of unique group '{}' is not enumerable",
                    self.name
                ))
            })?;
            radices.push(size);
        }
        let domain = radices
            .iter()
            .try_fold(1u64, |acc, size| acc.checked_mul(*size))
            .ok_or_else(|| {
                WorkloadError::invalid_rule(format!(
                    "unique group '{}' spans more than {} tuples",
                    self.name,
                    u64::MAX
                ))
            })?;

        self.product = Some(ProductUnique {
            ordinal,
            radices,
            permutation: Permutation::new(domain, permutation_key(sub_seed(run_seed, ordinal))),
        });
        Ok(self)
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member names in tuple order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Groups always have members once built.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of tuples produced so far.
    pub fn call_index(&self) -> u64 {
        self.call_index
    }

    /// Per-member call counters, in tuple order.
    pub fn member_call_indices(&self) -> Vec<u64> {
        self.members.iter().map(Generator::call_index).collect()
    }

    /// Produce the next tuple in declared order.
    pub fn next(&mut self) -> Result<Vec<Value>> {
        let index = self.call_index;
        self.call_index += 1;

        let values = match &self.product {
            Some(product) => {
                for member in &mut self.members {
                    member.skip(1);
                }
                let domain = product.permutation.domain();
                if index >= domain {
                    return Err(WorkloadError::DomainExhausted {
                        ordinal: product.ordinal,
                        domain_size: domain,
                    });
                }
                let digits = product.decode(product.permutation.apply(index));
                self.members
                    .iter()
                    .zip(digits)
                    .map(|(member, digit)| member.synth().value_at(digit))
                    .collect::<Result<Vec<_>>>()?
            }
            None => {
                let mut values = Vec::with_capacity(self.members.len());
                let mut first_error = None;
                for member in &mut self.members {
                    match member.next() {
                        Ok(value) => values.push(value),
                        Err(err) => {
                            first_error.get_or_insert(err);
                        }
                    }
                }
                if let Some(err) = first_error {
                    return Err(err);
                }
                values
            }
        };

        if values.len() != self.names.len() {
            return Err(WorkloadError::GroupArityMismatch {
                group: self.name.clone(),
                expected: self.names.len(),
                actual: values.len(),
            });
        }
        Ok(values)
    }

    /// Next tuple paired with member names.
    pub fn next_named(&mut self) -> Result<Vec<(String, Value)>> {
        let values = self.next()?;
        Ok(self.names.iter().cloned().zip(values).collect())
    }

    /// Go back to the first tuple.
    pub fn reset(&mut self) {
        self.resume_at(0);
    }

    /// Skip `n` tuples.
    pub fn skip(&mut self, n: u64) {
        self.resume_at(self.call_index.saturating_add(n));
    }

    /// Continue from tuple `call_index`.
    pub fn resume_at(&mut self, call_index: u64) {
        self.call_index = call_index;
        for member in &mut self.members {
            member.resume_at(call_index);
        }
    }
}
