//! Numeric combination rules.
//!
//! Two combination semantics exist: additive accumulation (`sum`, used by
//! AGGREGATE metrics) and last-write-wins replacement (`last_write_wins`,
//! used by ABSOLUTE metrics). The additive rule widens its result instead of
//! overflowing: the promotion table below is exhaustive over the variant
//! pair, so every widening step is visible and checked at compile time.

use crate::core::Result;
use crate::num::value::NumericValue;
use std::collections::HashMap;

/// Additively combine two values, producing the narrowest representation
/// that holds the exact result.
///
/// Promotion rules, in precedence order:
/// - either side decimal: both promoted to decimal, decimal result;
/// - both arbitrary-precision integers: exact integer addition;
/// - one arbitrary-precision integer: the other side promoted to decimal;
/// - either side float: float addition, promoted to decimal if the sum
///   would exceed the float range;
/// - 64-bit integers: checked addition, promoted to decimal on overflow;
/// - 32-bit integers: checked addition, widened to 64-bit on overflow
///   (two 32-bit operands cannot overflow a 64-bit sum).
pub fn sum(a: &NumericValue, b: &NumericValue) -> Result<NumericValue> {
    use NumericValue::*;

    match (a, b) {
        (BigDecimal(_), _) | (_, BigDecimal(_)) => decimal_sum(a, b),
        (BigInt(x), BigInt(y)) => Ok(NumericValue::BigInt(x + y)),
        (BigInt(_), _) | (_, BigInt(_)) => decimal_sum(a, b),
        (Float64(_), _) | (_, Float64(_)) => {
            let x = a.as_f64_lossy();
            let y = b.as_f64_lossy();
            let total = x + y;
            if total.is_infinite() && x.is_finite() && y.is_finite() {
                // Finite operands whose sum escapes the float range.
                decimal_sum(a, b)
            } else {
                Ok(NumericValue::Float64(total))
            }
        },
        (Int64(x), Int64(y)) => checked_i64_sum(*x, *y, a, b),
        (Int64(x), Int32(y)) => checked_i64_sum(*x, i64::from(*y), a, b),
        (Int32(x), Int64(y)) => checked_i64_sum(i64::from(*x), *y, a, b),
        (Int32(x), Int32(y)) => Ok(match x.checked_add(*y) {
            Some(total) => NumericValue::Int32(total),
            None => NumericValue::Int64(i64::from(*x) + i64::from(*y)),
        }),
    }
}

/// `sum` with a missing operand treated as the additive identity.
pub fn sum_opt(a: Option<&NumericValue>, b: Option<&NumericValue>) -> Result<NumericValue> {
    match (a, b) {
        (Some(a), Some(b)) => sum(a, b),
        (Some(a), None) => Ok(a.clone()),
        (None, Some(b)) => Ok(b.clone()),
        (None, None) => Ok(NumericValue::Int32(0)),
    }
}

/// Last-write-wins combination: the later operand replaces the earlier one
/// whenever it is present.
pub fn last_write_wins(
    earlier: Option<&NumericValue>,
    later: Option<&NumericValue>,
) -> Option<NumericValue> {
    later.or(earlier).cloned()
}

fn decimal_sum(a: &NumericValue, b: &NumericValue) -> Result<NumericValue> {
    Ok(NumericValue::BigDecimal(a.to_big_decimal()? + b.to_big_decimal()?))
}

fn checked_i64_sum(x: i64, y: i64, a: &NumericValue, b: &NumericValue) -> Result<NumericValue> {
    match x.checked_add(y) {
        Some(total) => Ok(NumericValue::Int64(total)),
        None => decimal_sum(a, b),
    }
}

/// Stateful running total fed one value at a time.
///
/// Single-owner: not internally synchronized.
#[derive(Debug, Clone)]
pub struct RunningCount {
    total: NumericValue,
}

impl RunningCount {
    /// Create a count starting at zero.
    pub fn new() -> Self {
        Self {
            total: NumericValue::Int32(0),
        }
    }

    /// Accumulate one value into the total.
    pub fn feed(&mut self, value: &NumericValue) -> Result<()> {
        self.total = sum(&self.total, value)?;
        Ok(())
    }

    /// Current total.
    pub fn value(&self) -> &NumericValue {
        &self.total
    }
}

impl Default for RunningCount {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-key occurrence counts, mergeable key-wise with additive semantics.
#[derive(Debug, Clone, Default)]
pub struct FrequencyMap {
    counts: HashMap<String, NumericValue>,
}

impl FrequencyMap {
    /// Create an empty frequency map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `key`.
    pub fn feed(&mut self, key: impl Into<String>) -> Result<()> {
        self.add(key, &NumericValue::Int32(1))
    }

    /// Add `value` to the count for `key`, with 0 as the default for an
    /// absent key.
    pub fn add(&mut self, key: impl Into<String>, value: &NumericValue) -> Result<()> {
        let key = key.into();
        let combined = sum_opt(self.counts.get(&key), Some(value))?;
        self.counts.insert(key, combined);
        Ok(())
    }

    /// Union another frequency map into this one, combining shared keys
    /// additively.
    pub fn merge(&mut self, other: FrequencyMap) -> Result<()> {
        for (key, value) in other.counts {
            self.add(key, &value)?;
        }
        Ok(())
    }

    /// Count for a single key, if present.
    pub fn get(&self, key: &str) -> Option<&NumericValue> {
        self.counts.get(key)
    }

    /// All counts.
    pub fn counts(&self) -> &HashMap<String, NumericValue> {
        &self.counts
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when no key has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
