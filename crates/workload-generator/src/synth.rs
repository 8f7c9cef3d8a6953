//! Value synthesis: pure functions from a rule and random input to a value.
//!
//! [`Synth`] is a rule prepared for repeated use. It offers two views of
//! the rule's domain:
//!
//! - [`Synth::sample`] draws a value from a random stream;
//! - [`Synth::value_at`] maps an index in `[0, domain_size)` to a value in
//!   canonical order, which unique mode composes with a permutation.
//!
//! Skewed rules draw an index of the canonical order from a Normal or
//! Zipf distribution and map it through `value_at`; floats are shaped
//! directly.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand_distr::{Distribution as _, Normal, Zipf};
use rust_decimal::Decimal;
use workload_core::rule::{
    bucket_size, scaled_bounds, Alphabet, CharRange, Distribution, GenerationRule, RuleKind,
};
use workload_core::{Result, Value, WorkloadError};

// ============================================================================
// Flattened alphabet
// ============================================================================

/// An alphabet flattened into one contiguous index space.
#[derive(Debug, Clone, Default)]
pub struct FlatAlphabet {
    ranges: Vec<CharRange>,
    /// `starts[i]` is the flat index of `ranges[i].min`
    starts: Vec<u64>,
    size: u64,
}

impl FlatAlphabet {
    /// Merge overlapping ranges and index the result.
    pub fn new(alphabet: &Alphabet) -> Self {
        let ranges = alphabet.normalized();
        let mut starts = Vec::with_capacity(ranges.len());
        let mut size = 0u64;
        for range in &ranges {
            starts.push(size);
            size += range.len();
        }
        Self {
            ranges,
            starts,
            size,
        }
    }

    /// Number of distinct characters.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Character at flat index `index` (must be below [`FlatAlphabet::size`]).
    pub fn char_at(&self, index: u64) -> char {
        let slot = match self.starts.binary_search(&index) {
            Ok(slot) => slot,
            Err(slot) => slot - 1,
        };
        let code = self.ranges[slot].min + (index - self.starts[slot]) as u32;
        char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

// ============================================================================
// Synth
// ============================================================================

/// Prepared sampler for a rule's distribution.
#[derive(Debug, Clone)]
enum Shape {
    Uniform,
    /// Over the canonical index, or over the value for floats
    Normal(Normal<f64>),
    /// Rank `k` in `[1, domain_size]`
    Zipf(Zipf<f64>),
}

impl Shape {
    fn new(rule: &GenerationRule, domain_size: Option<u64>) -> Result<Self> {
        let shape = match rule.distribution {
            Distribution::Uniform => Shape::Uniform,
            Distribution::Normal { deviation } => {
                let (mean, width) = match (&rule.kind, domain_size) {
                    (RuleKind::FloatRange { min, max }, _) => (min / 2.0 + max / 2.0, max - min),
                    (_, Some(domain)) => ((domain - 1) as f64 / 2.0, domain as f64),
                    (_, None) => {
                        return Err(WorkloadError::invalid_rule(format!(
                            "normal distribution needs a bounded range, {} has none",
                            rule.kind_name()
                        )))
                    }
                };
                let normal = Normal::new(mean, deviation * width).map_err(|e| {
                    WorkloadError::invalid_rule(format!("normal distribution: {e}"))
                })?;
                Shape::Normal(normal)
            }
            Distribution::Zipf { skew } => {
                let domain = domain_size.ok_or_else(|| {
                    WorkloadError::invalid_rule(format!(
                        "zipf needs an enumerable domain, {} has none",
                        rule.kind_name()
                    ))
                })?;
                let zipf = Zipf::new(domain, skew)
                    .map_err(|e| WorkloadError::invalid_rule(format!("zipf distribution: {e}")))?;
                Shape::Zipf(zipf)
            }
        };
        Ok(shape)
    }
}

/// A validated rule ready to produce values.
#[derive(Debug, Clone)]
pub struct Synth {
    kind: RuleKind,
    alphabet: FlatAlphabet,
    domain_size: Option<u64>,
    shape: Shape,
    /// Decimal bounds as integers at the rule's scale
    decimal_bounds: (i128, i128),
}

impl Synth {
    /// Validate `rule` and prepare it.
    pub fn new(rule: &GenerationRule) -> Result<Self> {
        rule.validate()?;
        let alphabet = match &rule.kind {
            RuleKind::StringRange { alphabet, .. } => FlatAlphabet::new(alphabet),
            _ => FlatAlphabet::default(),
        };
        let decimal_bounds = match &rule.kind {
            RuleKind::DecimalRange { min, max, scale } => scaled_bounds(*min, *max, *scale)
                .ok_or_else(|| {
                    WorkloadError::invalid_rule(format!(
                        "decimal range [{min}, {max}] has no value at scale {scale}"
                    ))
                })?,
            _ => (0, 0),
        };
        let domain_size = rule.domain_size();
        Ok(Self {
            kind: rule.kind.clone(),
            alphabet,
            domain_size,
            shape: Shape::new(rule, domain_size)?,
            decimal_bounds,
        })
    }

    /// Size of the canonical domain, if the rule is enumerable.
    pub fn domain_size(&self) -> Option<u64> {
        self.domain_size
    }

    /// Draw one value from `rng`, shaped by the rule's distribution.
    ///
    /// `SequentialInt` is driven by the call index in the generator; here
    /// it falls back to a uniform draw over its range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Value> {
        let last = self.domain_size.unwrap_or(1).saturating_sub(1);
        match &self.shape {
            Shape::Uniform => Ok(self.sample_uniform(rng)),
            Shape::Normal(normal) => {
                let draw = normal.sample(rng);
                match &self.kind {
                    RuleKind::FloatRange { min, max } => Ok(Value::Float64(draw.clamp(*min, *max))),
                    _ => {
                        let index = draw.round().clamp(0.0, last as f64) as u64;
                        self.value_at(index.min(last))
                    }
                }
            }
            Shape::Zipf(zipf) => {
                let rank = zipf.sample(rng) as u64;
                self.value_at(rank.saturating_sub(1).min(last))
            }
        }
    }

    fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match &self.kind {
            RuleKind::Int32Range { min, max } => Value::Int32(rng.gen_range(*min..=*max)),
            RuleKind::Int64Range { min, max } | RuleKind::SequentialInt { min, max } => {
                Value::Int64(rng.gen_range(*min..=*max))
            }
            RuleKind::FloatRange { min, max } => {
                let unit: f64 = rng.gen();
                Value::Float64((min + (max - min) * unit).min(*max))
            }
            RuleKind::DecimalRange { scale, .. } => {
                let (lo, hi) = self.decimal_bounds;
                Value::Decimal(Decimal::from_i128_with_scale(rng.gen_range(lo..=hi), *scale))
            }
            RuleKind::StringRange {
                min_len, max_len, ..
            } => {
                let len = rng.gen_range(*min_len..=*max_len);
                let alphabet = &self.alphabet;
                let text: String = (0..len)
                    .map(|_| alphabet.char_at(rng.gen_range(0..alphabet.size())))
                    .collect();
                Value::String(text)
            }
            RuleKind::Constant { value } => value.clone(),
            RuleKind::DateTimeConstant { value } => Value::DateTime(*value),
            RuleKind::DateTimeRange { min, max } => {
                let span = (*max - *min).num_seconds().max(0);
                let offset = rng.gen_range(0..=span);
                Value::DateTime(shift_seconds(min, offset))
            }
            RuleKind::Bool { ratio } => Value::Bool(rng.gen_bool(*ratio)),
            RuleKind::Uuid => {
                let bytes: [u8; 16] = rng.gen();
                Value::Uuid(uuid::Builder::from_random_bytes(bytes).into_uuid())
            }
        }
    }

    /// The `index`-th value of the canonical domain order.
    ///
    /// Integers, decimals and timestamps ascend from `min`. Strings are ordered by
    /// length, then as base-|alphabet| numbers over the flattened
    /// alphabet. `false` precedes `true`.
    pub fn value_at(&self, index: u64) -> Result<Value> {
        let Some(domain) = self.domain_size else {
            return Err(WorkloadError::invalid_rule(
                "rule has no enumerable domain",
            ));
        };
        if index >= domain {
            return Err(WorkloadError::invalid_rule(format!(
                "index {index} is outside a domain of {domain} values"
            )));
        }

        Ok(match &self.kind {
            RuleKind::Int32Range { min, .. } => Value::Int32((*min as i64 + index as i64) as i32),
            RuleKind::Int64Range { min, .. } | RuleKind::SequentialInt { min, .. } => {
                Value::Int64((*min as i128 + index as i128) as i64)
            }
            RuleKind::DateTimeRange { min, .. } => {
                Value::DateTime(shift_seconds(min, index as i64))
            }
            RuleKind::DecimalRange { scale, .. } => Value::Decimal(Decimal::from_i128_with_scale(
                self.decimal_bounds.0 + index as i128,
                *scale,
            )),
            RuleKind::StringRange {
                min_len, max_len, ..
            } => Value::String(self.string_at(*min_len, *max_len, index)),
            RuleKind::Constant { value } => value.clone(),
            RuleKind::DateTimeConstant { value } => Value::DateTime(*value),
            RuleKind::Bool { .. } => Value::Bool(index == 1),
            RuleKind::FloatRange { .. } | RuleKind::Uuid => {
                return Err(WorkloadError::invalid_rule("rule has no enumerable domain"))
            }
        })
    }

    fn string_at(&self, min_len: u32, max_len: u32, mut index: u64) -> String {
        let alphabet = &self.alphabet;
        let base = alphabet.size();
        for len in min_len..=max_len {
            let bucket = bucket_size(len, base);
            if index < bucket {
                let mut digits = vec![0u64; len as usize];
                for digit in digits.iter_mut().rev() {
                    *digit = index % base;
                    index /= base;
                }
                return digits.into_iter().map(|d| alphabet.char_at(d)).collect();
            }
            index -= bucket;
        }
        String::new()
    }
}

fn shift_seconds(base: &DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    base.checked_add_signed(Duration::seconds(seconds))
        .unwrap_or(*base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::call_rng;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn synth(rule: GenerationRule) -> Synth {
        Synth::new(&rule).unwrap()
    }

    #[test]
    fn test_flat_alphabet_merges_overlaps() {
        let alphabet = Alphabet::new(vec![
            CharRange::new('a', 'f'),
            CharRange::new('d', 'z'),
            CharRange::new('A', 'A'),
        ]);
        let flat = FlatAlphabet::new(&alphabet);
        assert_eq!(flat.size(), 27);
        assert_eq!(flat.char_at(0), 'A');
        assert_eq!(flat.char_at(1), 'a');
        assert_eq!(flat.char_at(26), 'z');
    }

    #[test]
    fn test_int_sample_is_inclusive() {
        let s = synth(GenerationRule::int32_range(1, 3));
        let mut seen = HashSet::new();
        for call in 0..200 {
            let value = s.sample(&mut call_rng(9, call)).unwrap().as_i32().unwrap();
            assert!((1..=3).contains(&value));
            seen.insert(value);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_string_conformance() {
        let s = synth(GenerationRule::string_range(6, 16, Alphabet::ascii_letters()));
        for call in 0..500 {
            let value = s.sample(&mut call_rng(1, call)).unwrap();
            let text = value.as_str().unwrap();
            let len = text.chars().count();
            assert!((6..=16).contains(&len), "bad length {len}");
            assert!(text.chars().all(|c| c.is_ascii_alphabetic()));
        }
    }

    #[test]
    fn test_float_range() {
        let s = synth(GenerationRule::float_range(0.5, 0.75));
        for call in 0..100 {
            let value = s.sample(&mut call_rng(2, call)).unwrap().as_f64().unwrap();
            assert!((0.5..=0.75).contains(&value));
        }
    }

    #[test]
    fn test_constants() {
        let s = synth(GenerationRule::constant("fixed"));
        assert_eq!(s.sample(&mut call_rng(0, 0)).unwrap(), Value::from("fixed"));
        assert_eq!(s.value_at(0).unwrap(), Value::from("fixed"));
    }

    #[test]
    fn test_string_canonical_order() {
        let alphabet = Alphabet::new(vec![CharRange::new('a', 'c')]);
        let s = synth(GenerationRule::string_range(1, 2, alphabet));
        assert_eq!(s.domain_size(), Some(3 + 9));
        let values: Vec<String> = (0..12)
            .map(|i| s.value_at(i).unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(&values[..4], &["a", "b", "c", "aa"]);
        assert_eq!(values[11], "cc");
        assert!(s.value_at(12).is_err());
    }

    #[test]
    fn test_empty_string_is_in_domain() {
        let s = synth(GenerationRule::string_range(0, 1, Alphabet::ascii_letters()));
        assert_eq!(s.value_at(0).unwrap(), Value::from(""));
        assert_eq!(s.value_at(1).unwrap(), Value::from("A"));
    }

    #[test]
    fn test_datetime_range() {
        let min = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let max = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        let s = synth(GenerationRule::from(RuleKind::DateTimeRange { min, max }));
        assert_eq!(s.domain_size(), Some(61));
        assert_eq!(s.value_at(60).unwrap(), Value::DateTime(max));
        for call in 0..50 {
            let value = *s.sample(&mut call_rng(3, call)).unwrap().as_datetime().unwrap();
            assert!(value >= min && value <= max);
        }
    }

    #[test]
    fn test_datetime_range_with_fractional_min_stays_below_max() {
        let min = "2024-01-01T00:00:00.500Z".parse::<DateTime<Utc>>().unwrap();
        let max = "2024-01-01T00:00:01.200Z".parse::<DateTime<Utc>>().unwrap();
        let s = synth(GenerationRule::from(RuleKind::DateTimeRange { min, max }));
        assert_eq!(s.domain_size(), Some(1));
        assert_eq!(s.value_at(0).unwrap(), Value::DateTime(min));
        for call in 0..50 {
            let value = *s.sample(&mut call_rng(5, call)).unwrap().as_datetime().unwrap();
            assert!(value >= min && value <= max, "{value} is outside the range");
        }
    }

    #[test]
    fn test_widest_float_range_cannot_be_built() {
        assert!(matches!(
            Synth::new(&GenerationRule::float_range(f64::MIN, f64::MAX)),
            Err(WorkloadError::InvalidRule { .. })
        ));
        let s = synth(GenerationRule::float_range(-1e300, 1e300));
        let value = s.sample(&mut call_rng(6, 0)).unwrap().as_f64().unwrap();
        assert!((-1e300..=1e300).contains(&value));
    }

    #[test]
    fn test_decimal_range() {
        let s = synth(GenerationRule::decimal_range(
            Decimal::new(100, 2),
            Decimal::new(200, 2),
            2,
        ));
        assert_eq!(s.domain_size(), Some(101));
        assert_eq!(s.value_at(0).unwrap(), Value::Decimal(Decimal::new(100, 2)));
        assert_eq!(s.value_at(100).unwrap(), Value::Decimal(Decimal::new(200, 2)));
        for call in 0..200 {
            let value = s.sample(&mut call_rng(7, call)).unwrap().as_decimal().unwrap();
            assert_eq!(value.scale(), 2);
            assert!(value >= Decimal::ONE && value <= Decimal::new(2, 0));
        }
    }

    #[test]
    fn test_zipf_favors_the_first_values() {
        let rule = GenerationRule::int32_range(1, 1000)
            .with_distribution(Distribution::Zipf { skew: 1.1 });
        let s = synth(rule);
        let draws: Vec<i32> = (0..10_000)
            .map(|call| s.sample(&mut call_rng(8, call)).unwrap().as_i32().unwrap())
            .collect();
        assert!(draws.iter().all(|v| (1..=1000).contains(v)));
        let hot = draws.iter().filter(|v| **v <= 10).count();
        let cold = draws.iter().filter(|v| **v > 990).count();
        assert!(hot > 10 * cold.max(1), "hot {hot}, cold {cold}");
    }

    #[test]
    fn test_normal_concentrates_in_the_middle() {
        let rule = GenerationRule::int64_range(0, 999)
            .with_distribution(Distribution::Normal { deviation: 0.1 });
        let s = synth(rule);
        let draws: Vec<i64> = (0..5_000)
            .map(|call| s.sample(&mut call_rng(9, call)).unwrap().as_i64().unwrap())
            .collect();
        assert!(draws.iter().all(|v| (0..=999).contains(v)));
        let middle = draws.iter().filter(|v| (300..700).contains(*v)).count();
        assert!(middle > 4_500, "{middle} draws in the middle");

        let floats = synth(
            GenerationRule::float_range(10.0, 20.0)
                .with_distribution(Distribution::Normal { deviation: 2.0 }),
        );
        for call in 0..500 {
            let value = floats.sample(&mut call_rng(10, call)).unwrap().as_f64().unwrap();
            assert!((10.0..=20.0).contains(&value));
        }
    }

    #[test]
    fn test_skewed_decimal_and_datetime_stay_in_range() {
        let decimals = synth(
            GenerationRule::decimal_range(Decimal::ZERO, Decimal::new(5000, 2), 2)
                .with_distribution(Distribution::Zipf { skew: 0.8 }),
        );
        for call in 0..200 {
            let value = decimals.sample(&mut call_rng(11, call)).unwrap().as_decimal().unwrap();
            assert!(value >= Decimal::ZERO && value <= Decimal::new(5000, 2));
        }

        let min = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let max = "2024-01-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let times = synth(
            GenerationRule::from(RuleKind::DateTimeRange { min, max })
                .with_distribution(Distribution::Normal { deviation: 0.25 }),
        );
        for call in 0..200 {
            let value = *times.sample(&mut call_rng(12, call)).unwrap().as_datetime().unwrap();
            assert!(value >= min && value <= max);
        }
    }

    #[test]
    fn test_uuid_and_float_are_not_enumerable() {
        let s = synth(GenerationRule::from(RuleKind::Uuid));
        assert!(s.value_at(0).is_err());
        let uuid = *s.sample(&mut call_rng(4, 0)).unwrap().as_uuid().unwrap();
        assert_eq!(uuid.get_version_num(), 4);
    }

    #[test]
    fn test_invalid_rule_is_rejected() {
        assert!(matches!(
            Synth::new(&GenerationRule::int32_range(5, 1)),
            Err(WorkloadError::InvalidRule { .. })
        ));
        assert!(Synth::new(&GenerationRule::string_range(
            3,
            2,
            Alphabet::ascii_letters()
        ))
        .is_err());
    }
}
