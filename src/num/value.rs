//! The closed set of numeric representations a metric value may take.

use crate::core::{Result, TallyError};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A numeric measurement value.
///
/// The five variants are ordered by representational width. Combination
/// (see [`crate::num::combine`]) always produces the narrowest variant that
/// holds the exact result, widening on overflow rather than wrapping or
/// truncating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NumericValue {
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// Arbitrary-precision decimal
    BigDecimal(BigDecimal),
}

impl NumericValue {
    /// Short name of the representation, for errors and logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NumericValue::Int32(_) => "int32",
            NumericValue::Int64(_) => "int64",
            NumericValue::Float64(_) => "float64",
            NumericValue::BigInt(_) => "bigint",
            NumericValue::BigDecimal(_) => "bigdecimal",
        }
    }

    /// Promote this value to an arbitrary-precision decimal.
    ///
    /// Fails for non-finite floats, which have no decimal representation.
    pub fn to_big_decimal(&self) -> Result<BigDecimal> {
        match self {
            NumericValue::Int32(v) => Ok(BigDecimal::from(*v)),
            NumericValue::Int64(v) => Ok(BigDecimal::from(*v)),
            NumericValue::Float64(v) => {
                BigDecimal::try_from(*v).map_err(|_| TallyError::NonFiniteFloat)
            },
            NumericValue::BigInt(v) => Ok(BigDecimal::from(v.clone())),
            NumericValue::BigDecimal(v) => Ok(v.clone()),
        }
    }

    /// Lossy view as f64. Only meaningful for the fixed-width variants;
    /// the combination algebra uses it on the floating-point path.
    pub(crate) fn as_f64_lossy(&self) -> f64 {
        match self {
            NumericValue::Int32(v) => f64::from(*v),
            NumericValue::Int64(v) => *v as f64,
            NumericValue::Float64(v) => *v,
            NumericValue::BigInt(_) | NumericValue::BigDecimal(_) => {
                debug_assert!(false, "arbitrary-precision values take the decimal path");
                0.0
            },
        }
    }

    /// True for the arbitrary-precision variants.
    pub fn is_arbitrary_precision(&self) -> bool {
        matches!(self, NumericValue::BigInt(_) | NumericValue::BigDecimal(_))
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Int32(v) => write!(f, "{}", v),
            NumericValue::Int64(v) => write!(f, "{}", v),
            NumericValue::Float64(v) => write!(f, "{}", v),
            NumericValue::BigInt(v) => write!(f, "{}", v),
            NumericValue::BigDecimal(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for NumericValue {
    fn from(v: i32) -> Self {
        NumericValue::Int32(v)
    }
}

impl From<i64> for NumericValue {
    fn from(v: i64) -> Self {
        NumericValue::Int64(v)
    }
}

impl From<f64> for NumericValue {
    fn from(v: f64) -> Self {
        NumericValue::Float64(v)
    }
}

impl From<BigInt> for NumericValue {
    fn from(v: BigInt) -> Self {
        NumericValue::BigInt(v)
    }
}

impl From<BigDecimal> for NumericValue {
    fn from(v: BigDecimal) -> Self {
        NumericValue::BigDecimal(v)
    }
}
