//! Stateful per-parameter generator.

use crate::permutation::Permutation;
use crate::seed::{call_rng, permutation_key, sub_seed};
use crate::synth::Synth;
use rand::Rng;
use workload_core::rule::{GenerationRule, RuleKind};
use workload_core::{Result, Value, WorkloadError};

/// Deterministic value source for one logical parameter.
///
/// The value of call `i` depends only on `(run_seed, ordinal, rule, i)`:
/// each call draws from its own random stream, so generators can be
/// rebuilt anywhere and resumed at any call index.
///
/// A generator belongs to one execution context and is never shared.
#[derive(Debug, Clone)]
pub struct Generator {
    /// Ordinal of the binding this generator serves
    ordinal: u64,
    /// Rule as declared
    rule: GenerationRule,
    /// Prepared rule
    synth: Synth,
    /// Seed of this generator's streams
    sub_seed: u64,
    /// Unique-mode permutation over the canonical domain
    permutation: Option<Permutation>,
    /// Index of the next call
    call_index: u64,
}

impl Generator {
    /// Create a generator for `rule` in the sub-stream `ordinal` of `run_seed`.
    pub fn new(run_seed: u64, ordinal: u64, rule: GenerationRule) -> Result<Self> {
        let synth = Synth::new(&rule)?;
        let sub_seed = sub_seed(run_seed, ordinal);

        let permutation = match (&rule.kind, rule.unique) {
            // Unique sequences keep their natural order.
            (RuleKind::SequentialInt { .. }, _) | (_, false) => None,
            (_, true) => {
                let domain = synth.domain_size().ok_or_else(|| {
                    WorkloadError::invalid_rule(format!(
                        "unique is not supported for {}",
                        rule.kind_name()
                    ))
                })?;
                Some(Permutation::new(domain, permutation_key(sub_seed)))
            }
        };

        Ok(Self {
            ordinal,
            rule,
            synth,
            sub_seed,
            permutation,
            call_index: 0,
        })
    }

    /// Ordinal of this generator.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Rule this generator follows.
    pub fn rule(&self) -> &GenerationRule {
        &self.rule
    }

    /// Number of calls made so far (the index of the next call).
    pub fn call_index(&self) -> u64 {
        self.call_index
    }

    /// Size of the canonical domain, if enumerable.
    pub fn domain_size(&self) -> Option<u64> {
        self.synth.domain_size()
    }

    pub(crate) fn synth(&self) -> &Synth {
        &self.synth
    }

    /// Produce the next value.
    ///
    /// The call counter advances even when the call fails, so a group of
    /// generators stays in lockstep.
    pub fn next(&mut self) -> Result<Value> {
        let index = self.call_index;
        self.call_index += 1;
        self.value_for(index)
    }

    /// Value of call `index`, without touching the counter.
    pub fn value_for(&self, index: u64) -> Result<Value> {
        if self.rule.unique {
            let domain = self.domain_size().unwrap_or(0);
            if index >= domain {
                return Err(WorkloadError::DomainExhausted {
                    ordinal: self.ordinal,
                    domain_size: domain,
                });
            }
            let position = match &self.permutation {
                Some(permutation) => permutation.apply(index),
                None => index,
            };
            return self.synth.value_at(position);
        }

        let mut rng = call_rng(self.sub_seed, index);
        if self.rule.null_percentage > 0 && rng.gen_range(0..100u8) < self.rule.null_percentage {
            return Ok(Value::Null);
        }

        match self.rule.kind {
            RuleKind::SequentialInt { .. } => {
                let domain = self.domain_size().unwrap_or(1);
                self.synth.value_at(index % domain)
            }
            _ => self.synth.sample(&mut rng),
        }
    }

    /// Go back to the first call.
    pub fn reset(&mut self) {
        self.call_index = 0;
    }

    /// Skip `n` calls without producing values.
    pub fn skip(&mut self, n: u64) {
        self.call_index = self.call_index.saturating_add(n);
    }

    /// Continue from call `call_index`, as if that many calls had been made.
    pub fn resume_at(&mut self, call_index: u64) {
        self.call_index = call_index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use workload_core::rule::Alphabet;

    fn draw(generator: &mut Generator, n: usize) -> Vec<Value> {
        (0..n).map(|_| generator.next().unwrap()).collect()
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let rule = GenerationRule::string_range(6, 16, Alphabet::ascii_letters());
        let mut a = Generator::new(42, 1, rule.clone()).unwrap();
        let mut b = Generator::new(42, 1, rule.clone()).unwrap();
        assert_eq!(draw(&mut a, 100), draw(&mut b, 100));

        let mut other_seed = Generator::new(43, 1, rule.clone()).unwrap();
        let mut other_ordinal = Generator::new(42, 2, rule).unwrap();
        a.reset();
        let reference = draw(&mut a, 100);
        assert_ne!(reference, draw(&mut other_seed, 100));
        assert_ne!(reference, draw(&mut other_ordinal, 100));
    }

    #[test]
    fn test_unique_is_permutation_then_exhausts() {
        let mut generator = Generator::new(7, 3, GenerationRule::int32_range(1, 100_000).unique())
            .unwrap();
        let mut seen = HashSet::with_capacity(100_000);
        for _ in 0..100_000 {
            let value = generator.next().unwrap().as_i32().unwrap();
            assert!((1..=100_000).contains(&value));
            assert!(seen.insert(value), "duplicate {value}");
        }
        assert_eq!(seen.len(), 100_000);
        assert!(matches!(
            generator.next(),
            Err(WorkloadError::DomainExhausted {
                ordinal: 3,
                domain_size: 100_000
            })
        ));
    }

    #[test]
    fn test_unique_is_not_sorted() {
        let mut generator =
            Generator::new(1, 1, GenerationRule::int32_range(1, 1000).unique()).unwrap();
        let values: Vec<i32> = (0..1000)
            .map(|_| generator.next().unwrap().as_i32().unwrap())
            .collect();
        let sorted: Vec<i32> = (1..=1000).collect();
        assert_ne!(values, sorted);
    }

    #[test]
    fn test_unique_strings() {
        let alphabet = Alphabet::new(vec![workload_core::CharRange::new('a', 'd')]);
        let rule = GenerationRule::string_range(1, 3, alphabet).unique();
        let mut generator = Generator::new(5, 9, rule).unwrap();
        let domain = generator.domain_size().unwrap();
        assert_eq!(domain, 4 + 16 + 64);
        let values: HashSet<String> = (0..domain)
            .map(|_| generator.next().unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len() as u64, domain);
        assert!(generator.next().is_err());
    }

    #[test]
    fn test_sequential_wraps() {
        let mut generator = Generator::new(0, 1, GenerationRule::sequential(1, 3)).unwrap();
        let values: Vec<i64> = (0..7)
            .map(|_| generator.next().unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_unique_sequential_exhausts_in_order() {
        let mut generator =
            Generator::new(0, 1, GenerationRule::sequential(10, 12).unique()).unwrap();
        let values: Vec<i64> = (0..3)
            .map(|_| generator.next().unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![10, 11, 12]);
        assert!(matches!(
            generator.next(),
            Err(WorkloadError::DomainExhausted { .. })
        ));
    }

    #[test]
    fn test_skip_and_resume_match_straight_run() {
        let rule = GenerationRule::int64_range(-1_000_000, 1_000_000);
        let mut straight = Generator::new(11, 4, rule.clone()).unwrap();
        let all = draw(&mut straight, 50);

        let mut skipped = Generator::new(11, 4, rule.clone()).unwrap();
        skipped.skip(20);
        assert_eq!(draw(&mut skipped, 30), all[20..].to_vec());

        let mut resumed = Generator::new(11, 4, rule).unwrap();
        resumed.resume_at(45);
        assert_eq!(resumed.call_index(), 45);
        assert_eq!(draw(&mut resumed, 5), all[45..].to_vec());
    }

    #[test]
    fn test_interleaving_does_not_matter() {
        let rule = GenerationRule::int32_range(0, i32::MAX);
        let mut alone = Generator::new(3, 1, rule.clone()).unwrap();
        let expected = draw(&mut alone, 10);

        let mut a = Generator::new(3, 1, rule.clone()).unwrap();
        let mut noise = Generator::new(3, 2, rule).unwrap();
        let mut got = Vec::new();
        for _ in 0..10 {
            draw(&mut noise, 3);
            got.push(a.next().unwrap());
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn test_null_percentage() {
        let rule = GenerationRule::int32_range(1, 10).with_nulls(30);
        let mut generator = Generator::new(8, 1, rule).unwrap();
        let nulls = draw(&mut generator, 10_000)
            .iter()
            .filter(|v| v.is_null())
            .count();
        assert!((2_500..3_500).contains(&nulls), "{nulls} nulls");

        let always = GenerationRule::int32_range(1, 10).with_nulls(100);
        let mut generator = Generator::new(8, 1, always).unwrap();
        assert!(draw(&mut generator, 100).iter().all(Value::is_null));
    }

    #[test]
    fn test_float_range_wider_than_f64_is_rejected() {
        assert!(matches!(
            Generator::new(1, 1, GenerationRule::float_range(f64::MIN, f64::MAX)),
            Err(WorkloadError::InvalidRule { .. })
        ));
        let mut generator =
            Generator::new(1, 1, GenerationRule::float_range(f64::MIN / 2.0, f64::MAX / 2.0))
                .unwrap();
        assert!(generator.next().unwrap().as_f64().unwrap().is_finite());
    }

    #[test]
    fn test_unique_float_is_rejected() {
        assert!(matches!(
            Generator::new(1, 1, GenerationRule::float_range(0.0, 1.0).unique()),
            Err(WorkloadError::InvalidRule { .. })
        ));
    }
}
