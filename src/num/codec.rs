//! Tagged binary encoding for numeric values.
//!
//! This is the persisted byte-level contract for every stored metric value:
//! a one-byte type tag followed by a type-specific big-endian payload. The
//! tag values and the two's-complement/scale conventions must never change,
//! or previously stored data becomes unreadable.
//!
//! Arbitrary-precision decimals are encoded as `(scale, unscaled)` where the
//! value equals `unscaled * 10^-scale`; no conversion through floating point
//! happens anywhere on the encode or decode path.

use crate::core::{Result, TallyError};
use crate::num::value::NumericValue;
use bigdecimal::BigDecimal;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_bigint::BigInt;

const TAG_INT32: u8 = 0x01;
const TAG_INT64: u8 = 0x02;
const TAG_FLOAT64: u8 = 0x03;
const TAG_BIGINT: u8 = 0x04;
const TAG_BIGDECIMAL: u8 = 0x05;

/// Encode a numeric value into its tagged binary form.
pub fn encode(value: &NumericValue) -> Bytes {
    let mut buf = BytesMut::with_capacity(16);
    match value {
        NumericValue::Int32(v) => {
            buf.put_u8(TAG_INT32);
            buf.put_i32(*v);
        },
        NumericValue::Int64(v) => {
            buf.put_u8(TAG_INT64);
            buf.put_i64(*v);
        },
        NumericValue::Float64(v) => {
            buf.put_u8(TAG_FLOAT64);
            buf.put_f64(*v);
        },
        NumericValue::BigInt(v) => {
            buf.put_u8(TAG_BIGINT);
            put_signed_magnitude(&mut buf, v);
        },
        NumericValue::BigDecimal(v) => {
            let (unscaled, scale) = v.as_bigint_and_exponent();
            buf.put_u8(TAG_BIGDECIMAL);
            buf.put_i64(scale);
            put_signed_magnitude(&mut buf, &unscaled);
        },
    }
    buf.freeze()
}

/// Decode a tagged binary record back into the exact numeric value.
///
/// Rejects unknown tags, truncated payloads, and trailing bytes; corrupt
/// data is surfaced, never coerced to a default.
pub fn decode(bytes: &[u8]) -> Result<NumericValue> {
    let mut buf = bytes;
    need(buf.remaining(), 1, "type tag")?;
    let tag = buf.get_u8();

    let value = match tag {
        TAG_INT32 => {
            need(buf.remaining(), 4, "int32 payload")?;
            NumericValue::Int32(buf.get_i32())
        },
        TAG_INT64 => {
            need(buf.remaining(), 8, "int64 payload")?;
            NumericValue::Int64(buf.get_i64())
        },
        TAG_FLOAT64 => {
            need(buf.remaining(), 8, "float64 payload")?;
            NumericValue::Float64(buf.get_f64())
        },
        TAG_BIGINT => NumericValue::BigInt(get_signed_magnitude(&mut buf)?),
        TAG_BIGDECIMAL => {
            need(buf.remaining(), 8, "decimal scale")?;
            let scale = buf.get_i64();
            let unscaled = get_signed_magnitude(&mut buf)?;
            NumericValue::BigDecimal(BigDecimal::new(unscaled, scale))
        },
        other => {
            return Err(TallyError::decode(format!("unknown value tag 0x{:02x}", other)));
        },
    };

    if buf.has_remaining() {
        return Err(TallyError::decode(format!(
            "{} trailing bytes after {} value",
            buf.remaining(),
            value.kind_name()
        )));
    }
    Ok(value)
}

fn put_signed_magnitude(buf: &mut BytesMut, value: &BigInt) {
    let bytes = value.to_signed_bytes_be();
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(&bytes);
}

fn get_signed_magnitude(buf: &mut &[u8]) -> Result<BigInt> {
    need(buf.remaining(), 4, "magnitude length")?;
    let len = buf.get_u32() as usize;
    if len == 0 {
        return Err(TallyError::decode("zero-length magnitude"));
    }
    need(buf.remaining(), len, "magnitude bytes")?;
    let magnitude = BigInt::from_signed_bytes_be(&buf[..len]);
    buf.advance(len);
    Ok(magnitude)
}

fn need(remaining: usize, wanted: usize, what: &str) -> Result<()> {
    if remaining < wanted {
        return Err(TallyError::decode(format!(
            "truncated record: need {} bytes for {}, have {}",
            wanted, what, remaining
        )));
    }
    Ok(())
}
