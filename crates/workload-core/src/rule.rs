//! Generation rules: how to synthesize one parameter value.
//!
//! A [`GenerationRule`] is a closed variant ([`RuleKind`]) plus the flags
//! shared by every kind. In YAML the flags sit next to the `type` tag:
//!
//! ```yaml
//! type: int32_range
//! min: 1
//! max: 100000
//! unique: true
//! ```
//!
//! Skewed draws add a `distribution`:
//!
//! ```yaml
//! type: int32_range
//! min: 1
//! max: 3000
//! distribution: { type: zipf, skew: 1.1 }
//! ```

use crate::error::{Result, WorkloadError};
use crate::value::Value;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Upper bound on the enumerable string domain used by unique string rules.
pub const STRING_DOMAIN_CAP: u64 = 1 << 63;

/// Largest scale a decimal rule may ask for.
pub const MAX_DECIMAL_SCALE: u32 = 18;

const SURROGATE_MIN: u32 = 0xD800;
const SURROGATE_MAX: u32 = 0xDFFF;

// ============================================================================
// Alphabet
// ============================================================================

/// Closed range of character codes `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharRange {
    /// First code point (inclusive)
    pub min: u32,
    /// Last code point (inclusive)
    pub max: u32,
}

impl CharRange {
    /// Create a range from two characters.
    pub fn new(min: char, max: char) -> Self {
        Self {
            min: min as u32,
            max: max as u32,
        }
    }

    /// Number of code points in the range.
    pub fn len(&self) -> u64 {
        (self.max as u64).saturating_sub(self.min as u64) + 1
    }

    /// Ranges are never empty once validated.
    pub fn is_empty(&self) -> bool {
        self.max < self.min
    }
}

/// Ordered set of character ranges a string rule draws from.
///
/// Overlapping or adjacent ranges are merged before use, so every code
/// point is weighted once regardless of how many ranges mention it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alphabet {
    ranges: Vec<CharRange>,
}

impl Alphabet {
    /// Create an alphabet from raw ranges.
    pub fn new(ranges: Vec<CharRange>) -> Self {
        Self { ranges }
    }

    /// `[A-Za-z]`
    pub fn ascii_letters() -> Self {
        Self::new(vec![CharRange::new('A', 'Z'), CharRange::new('a', 'z')])
    }

    /// `[0-9A-Za-z]`
    pub fn alphanumeric() -> Self {
        Self::new(vec![
            CharRange::new('0', '9'),
            CharRange::new('A', 'Z'),
            CharRange::new('a', 'z'),
        ])
    }

    /// Ranges as declared.
    pub fn ranges(&self) -> &[CharRange] {
        &self.ranges
    }

    /// Validate the declared ranges.
    pub fn validate(&self) -> Result<()> {
        if self.ranges.is_empty() {
            return Err(WorkloadError::invalid_rule("alphabet has no ranges"));
        }
        for range in &self.ranges {
            if range.is_empty() {
                return Err(WorkloadError::invalid_rule(format!(
                    "alphabet range {:#x}..={:#x} has min > max",
                    range.min, range.max
                )));
            }
            if range.max > char::MAX as u32 {
                return Err(WorkloadError::invalid_rule(format!(
                    "alphabet range ends past the last code point: {:#x}",
                    range.max
                )));
            }
            if range.min <= SURROGATE_MAX && range.max >= SURROGATE_MIN {
                return Err(WorkloadError::invalid_rule(
                    "alphabet range contains surrogate code points",
                ));
            }
        }
        Ok(())
    }

    /// Sorted, disjoint, non-adjacent ranges covering the same code points.
    pub fn normalized(&self) -> Vec<CharRange> {
        let mut sorted = self.ranges.clone();
        sorted.sort_by_key(|r| (r.min, r.max));
        let mut merged: Vec<CharRange> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match merged.last_mut() {
                Some(last) if range.min <= last.max.saturating_add(1) => {
                    last.max = last.max.max(range.max);
                }
                _ => merged.push(range),
            }
        }
        merged
    }

    /// Number of distinct code points.
    pub fn size(&self) -> u64 {
        self.normalized().iter().map(CharRange::len).sum()
    }
}

// ============================================================================
// Rules
// ============================================================================

fn default_float_min() -> f64 {
    0.0
}

fn default_bool_ratio() -> f64 {
    0.5
}

fn default_decimal_scale() -> u32 {
    2
}

fn default_deviation() -> f64 {
    1.0 / 6.0
}

/// Shape of non-unique draws over a range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distribution {
    /// Every value equally likely
    #[default]
    Uniform,

    /// Bell curve centered on the middle of the range, clamped to it
    Normal {
        /// Standard deviation as a fraction of the range width
        #[serde(default = "default_deviation")]
        deviation: f64,
    },

    /// Zipf over the canonical order: the first values are the hottest
    Zipf {
        /// Exponent; 0 is uniform, larger is more skewed
        skew: f64,
    },
}

impl Distribution {
    /// True for the default uniform shape.
    pub fn is_uniform(&self) -> bool {
        matches!(self, Distribution::Uniform)
    }

    /// Short name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Uniform => "uniform",
            Distribution::Normal { .. } => "normal",
            Distribution::Zipf { .. } => "zipf",
        }
    }
}

/// The kind of value a rule produces, with its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Uniform 32-bit integers in `[min, max]`
    Int32Range {
        /// Minimum value (inclusive)
        min: i32,
        /// Maximum value (inclusive)
        max: i32,
    },

    /// Uniform 64-bit integers in `[min, max]`
    Int64Range {
        /// Minimum value (inclusive)
        min: i64,
        /// Maximum value (inclusive)
        max: i64,
    },

    /// Uniform floats in `[min, max]`
    FloatRange {
        /// Minimum value (inclusive, defaults to 0)
        #[serde(default = "default_float_min")]
        min: f64,
        /// Maximum value (inclusive)
        max: f64,
    },

    /// Exact decimals in `[min, max]` stepping by `10^-scale`
    DecimalRange {
        /// Minimum value, rounded up to `scale`
        min: Decimal,
        /// Maximum value, rounded down to `scale`
        max: Decimal,
        /// Digits after the decimal point
        #[serde(default = "default_decimal_scale")]
        scale: u32,
    },

    /// Strings with a uniform length and uniform characters
    StringRange {
        /// Minimum length (inclusive)
        min_len: u32,
        /// Maximum length (inclusive)
        max_len: u32,
        /// Character set
        alphabet: Alphabet,
    },

    /// Always the same literal
    Constant {
        /// The literal
        value: Value,
    },

    /// Always the same timestamp
    DateTimeConstant {
        /// The literal timestamp
        value: DateTime<Utc>,
    },

    /// Uniform timestamps in `[min, max]` at one-second resolution
    DateTimeRange {
        /// Earliest timestamp (inclusive)
        min: DateTime<Utc>,
        /// Latest timestamp (inclusive)
        max: DateTime<Utc>,
    },

    /// `min, min + 1, ...`, wrapping after `max`
    SequentialInt {
        /// First value
        min: i64,
        /// Last value
        max: i64,
    },

    /// Booleans, `true` with probability `ratio`
    Bool {
        /// Probability of `true`
        #[serde(default = "default_bool_ratio")]
        ratio: f64,
    },

    /// Random v4 UUIDs
    Uuid,
}

/// A rule describing how to synthesize values for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRule {
    /// Kind and bounds
    #[serde(flatten)]
    pub kind: RuleKind,

    /// Every value is drawn at most once
    #[serde(default)]
    pub unique: bool,

    /// Percentage of draws (0-100) replaced by NULL
    #[serde(default)]
    pub null_percentage: u8,

    /// Shape of non-unique draws
    #[serde(default, skip_serializing_if = "Distribution::is_uniform")]
    pub distribution: Distribution,
}

impl From<RuleKind> for GenerationRule {
    fn from(kind: RuleKind) -> Self {
        Self {
            kind,
            unique: false,
            null_percentage: 0,
            distribution: Distribution::Uniform,
        }
    }
}

impl GenerationRule {
    /// Uniform `i32` in `[min, max]`.
    pub fn int32_range(min: i32, max: i32) -> Self {
        RuleKind::Int32Range { min, max }.into()
    }

    /// Uniform `i64` in `[min, max]`.
    pub fn int64_range(min: i64, max: i64) -> Self {
        RuleKind::Int64Range { min, max }.into()
    }

    /// Uniform `f64` in `[min, max]`.
    pub fn float_range(min: f64, max: f64) -> Self {
        RuleKind::FloatRange { min, max }.into()
    }

    /// Decimals in `[min, max]` with `scale` fractional digits.
    pub fn decimal_range(min: Decimal, max: Decimal, scale: u32) -> Self {
        RuleKind::DecimalRange { min, max, scale }.into()
    }

    /// Strings of length `[min_len, max_len]` over `alphabet`.
    pub fn string_range(min_len: u32, max_len: u32, alphabet: Alphabet) -> Self {
        RuleKind::StringRange {
            min_len,
            max_len,
            alphabet,
        }
        .into()
    }

    /// Constant literal.
    pub fn constant(value: impl Into<Value>) -> Self {
        RuleKind::Constant {
            value: value.into(),
        }
        .into()
    }

    /// Sequential integers in `[min, max]`.
    pub fn sequential(min: i64, max: i64) -> Self {
        RuleKind::SequentialInt { min, max }.into()
    }

    /// Mark the rule unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Replace `percent`% of draws with NULL.
    pub fn with_nulls(mut self, percent: u8) -> Self {
        self.null_percentage = percent;
        self
    }

    /// Shape draws with `distribution`.
    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Short name of the rule kind, used in logs.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            RuleKind::Int32Range { .. } => "int32_range",
            RuleKind::Int64Range { .. } => "int64_range",
            RuleKind::FloatRange { .. } => "float_range",
            RuleKind::DecimalRange { .. } => "decimal_range",
            RuleKind::StringRange { .. } => "string_range",
            RuleKind::Constant { .. } => "constant",
            RuleKind::DateTimeConstant { .. } => "date_time_constant",
            RuleKind::DateTimeRange { .. } => "date_time_range",
            RuleKind::SequentialInt { .. } => "sequential_int",
            RuleKind::Bool { .. } => "bool",
            RuleKind::Uuid => "uuid",
        }
    }

    /// Number of distinct values the rule can produce, if enumerable.
    ///
    /// Integer domains wider than `u64::MAX` saturate; string domains are
    /// capped at [`STRING_DOMAIN_CAP`].
    pub fn domain_size(&self) -> Option<u64> {
        match &self.kind {
            RuleKind::Int32Range { min, max } => {
                Some(span(*min as i128, *max as i128))
            }
            RuleKind::Int64Range { min, max } | RuleKind::SequentialInt { min, max } => {
                Some(span(*min as i128, *max as i128))
            }
            RuleKind::DateTimeRange { min, max } => {
                let seconds = (*max - *min).num_seconds().max(0) as u64;
                Some(seconds.saturating_add(1))
            }
            RuleKind::DecimalRange { min, max, scale } => {
                scaled_bounds(*min, *max, *scale).map(|(lo, hi)| span(lo, hi))
            }
            RuleKind::StringRange {
                min_len,
                max_len,
                alphabet,
            } => Some(string_domain_size(*min_len, *max_len, alphabet.size())),
            RuleKind::Constant { .. } | RuleKind::DateTimeConstant { .. } => Some(1),
            RuleKind::Bool { .. } => Some(2),
            RuleKind::FloatRange { .. } | RuleKind::Uuid => None,
        }
    }

    /// Validate bounds and flag combinations.
    pub fn validate(&self) -> Result<()> {
        match &self.kind {
            RuleKind::Int32Range { min, max } if min > max => {
                return Err(bounds_error(min, max));
            }
            RuleKind::Int64Range { min, max } | RuleKind::SequentialInt { min, max }
                if min > max =>
            {
                return Err(bounds_error(min, max));
            }
            RuleKind::FloatRange { min, max } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(WorkloadError::invalid_rule("float bounds must be finite"));
                }
                if min > max {
                    return Err(bounds_error(min, max));
                }
                if !(max - min).is_finite() {
                    return Err(WorkloadError::invalid_rule(format!(
                        "float range [{min}, {max}] is wider than f64 can represent"
                    )));
                }
            }
            RuleKind::DecimalRange { min, max, scale } => {
                if min > max {
                    return Err(bounds_error(min, max));
                }
                if *scale > MAX_DECIMAL_SCALE {
                    return Err(WorkloadError::invalid_rule(format!(
                        "decimal scale {scale} is greater than {MAX_DECIMAL_SCALE}"
                    )));
                }
                if scaled_bounds(*min, *max, *scale).is_none() {
                    return Err(WorkloadError::invalid_rule(format!(
                        "decimal range [{min}, {max}] has no value at scale {scale}"
                    )));
                }
            }
            RuleKind::DateTimeRange { min, max } if min > max => {
                return Err(bounds_error(min, max));
            }
            RuleKind::StringRange {
                min_len,
                max_len,
                alphabet,
            } => {
                if min_len > max_len {
                    return Err(WorkloadError::invalid_rule(format!(
                        "min_len {min_len} is greater than max_len {max_len}"
                    )));
                }
                alphabet.validate()?;
            }
            RuleKind::Bool { ratio } if !(0.0..=1.0).contains(ratio) => {
                return Err(WorkloadError::invalid_rule(format!(
                    "bool ratio {ratio} is outside [0, 1]"
                )));
            }
            _ => {}
        }

        if self.null_percentage > 100 {
            return Err(WorkloadError::invalid_rule(format!(
                "null_percentage {} is greater than 100",
                self.null_percentage
            )));
        }

        self.validate_distribution()?;

        if self.unique {
            if self.domain_size().is_none() {
                return Err(WorkloadError::invalid_rule(format!(
                    "unique is not supported for {} (domain is not enumerable)",
                    self.kind_name()
                )));
            }
            if self.null_percentage > 0 {
                return Err(WorkloadError::invalid_rule(
                    "unique rules cannot produce NULLs",
                ));
            }
        }

        Ok(())
    }

    fn validate_distribution(&self) -> Result<()> {
        let distribution = self.distribution;
        if distribution.is_uniform() {
            return Ok(());
        }
        let shaped = matches!(
            self.kind,
            RuleKind::Int32Range { .. }
                | RuleKind::Int64Range { .. }
                | RuleKind::FloatRange { .. }
                | RuleKind::DecimalRange { .. }
                | RuleKind::DateTimeRange { .. }
        );
        if !shaped {
            return Err(WorkloadError::invalid_rule(format!(
                "{} distribution is not supported for {}",
                distribution.name(),
                self.kind_name()
            )));
        }
        if self.unique {
            return Err(WorkloadError::invalid_rule(format!(
                "unique rules draw every value once and cannot use a {} distribution",
                distribution.name()
            )));
        }
        match distribution {
            Distribution::Normal { deviation } if !(deviation.is_finite() && deviation > 0.0) => {
                Err(WorkloadError::invalid_rule(format!(
                    "normal deviation {deviation} must be a positive number"
                )))
            }
            Distribution::Zipf { skew } if !(skew.is_finite() && skew >= 0.0) => Err(
                WorkloadError::invalid_rule(format!("zipf skew {skew} must be at least 0")),
            ),
            Distribution::Zipf { .. } if self.domain_size().is_none() => {
                Err(WorkloadError::invalid_rule(format!(
                    "zipf needs an enumerable domain, {} has none",
                    self.kind_name()
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Bounds of a decimal range as integers at `scale`, `None` if the
/// rounded range is empty or does not fit.
pub fn scaled_bounds(min: Decimal, max: Decimal, scale: u32) -> Option<(i128, i128)> {
    let mut lo = min.round_dp_with_strategy(scale, RoundingStrategy::ToPositiveInfinity);
    let mut hi = max.round_dp_with_strategy(scale, RoundingStrategy::ToNegativeInfinity);
    lo.rescale(scale);
    hi.rescale(scale);
    if lo.scale() != scale || hi.scale() != scale {
        return None;
    }
    let (lo, hi) = (lo.mantissa(), hi.mantissa());
    (lo <= hi).then_some((lo, hi))
}

fn span(min: i128, max: i128) -> u64 {
    u64::try_from(max - min + 1).unwrap_or(u64::MAX)
}

fn bounds_error(min: impl std::fmt::Display, max: impl std::fmt::Display) -> WorkloadError {
    WorkloadError::invalid_rule(format!("min {min} is greater than max {max}"))
}

/// Count strings with lengths in `[min_len, max_len]` over `alphabet_size`
/// characters, saturating at [`STRING_DOMAIN_CAP`].
pub fn string_domain_size(min_len: u32, max_len: u32, alphabet_size: u64) -> u64 {
    let mut total: u64 = 0;
    for len in min_len..=max_len {
        total = total.saturating_add(bucket_size(len, alphabet_size));
        if total >= STRING_DOMAIN_CAP {
            return STRING_DOMAIN_CAP;
        }
    }
    total
}

/// `alphabet_size ^ len`, saturating at [`STRING_DOMAIN_CAP`].
pub fn bucket_size(len: u32, alphabet_size: u64) -> u64 {
    let mut count: u64 = 1;
    for _ in 0..len {
        count = count.saturating_mul(alphabet_size);
        if count >= STRING_DOMAIN_CAP {
            return STRING_DOMAIN_CAP;
        }
    }
    count
}
