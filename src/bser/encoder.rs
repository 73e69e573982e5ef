//! SPDX-License-Identifier: MIT

//! Recursive value dumper writing a complete PDU.

use super::{
    PDU_HEADER, TAG_ARRAY, TAG_FALSE, TAG_INT64, TAG_INT32, TAG_NULL, TAG_OBJECT, TAG_REAL,
    TAG_STRING, TAG_TRUE, error::EncodeError,
};
use crate::{accumulator::Accumulator, value::Value};

/// Encodes `value` as a complete PDU: header, back-patched INT32 length,
/// then the value's own serialization.
pub fn encode(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut acc = Accumulator::with_capacity(64);
    acc.append(&PDU_HEADER);
    acc.append(&[TAG_INT32]);
    let len_offset = acc.write_offset();
    acc.write_int(0, 4);

    encode_value(&mut acc, value)?;

    let total = acc.write_offset();
    acc.patch_int(len_offset, (total - 7) as i64, 4);
    Ok(acc.written().to_vec())
}

fn encode_int(acc: &mut Accumulator, v: i64) {
    let abs = v.unsigned_abs();
    if abs <= 127 {
        acc.append(&[super::TAG_INT8]);
        acc.write_int(v, 1);
    } else if abs <= 32_767 {
        acc.append(&[super::TAG_INT16]);
        acc.write_int(v, 2);
    } else if abs <= 2_147_483_647 {
        acc.append(&[TAG_INT32]);
        acc.write_int(v, 4);
    } else {
        acc.append(&[TAG_INT64]);
        acc.write_int(v, 8);
    }
}

fn encode_string(acc: &mut Accumulator, s: &str) {
    acc.append(&[TAG_STRING]);
    encode_int(acc, s.len() as i64);
    acc.append(s.as_bytes());
}

fn encode_value(acc: &mut Accumulator, value: &Value) -> Result<(), EncodeError> {
    match value {
        Value::Undefined => Err(EncodeError::UnsupportedType("undefined".to_owned())),
        Value::Null => {
            acc.append(&[TAG_NULL]);
            Ok(())
        },
        Value::Bool(true) => {
            acc.append(&[TAG_TRUE]);
            Ok(())
        },
        Value::Bool(false) => {
            acc.append(&[TAG_FALSE]);
            Ok(())
        },
        Value::Int(v) => {
            encode_int(acc, *v);
            Ok(())
        },
        Value::Int64(v) => {
            acc.append(&[TAG_INT64]);
            acc.write_int(v.get(), 8);
            Ok(())
        },
        Value::Real(v) => {
            if v.is_finite() && v.fract() == 0.0 && is_i64_range(*v) {
                encode_int(acc, *v as i64);
            } else {
                acc.append(&[TAG_REAL]);
                acc.write_double(*v);
            }
            Ok(())
        },
        Value::String(s) => {
            encode_string(acc, s);
            Ok(())
        },
        Value::Array(items) => {
            acc.append(&[TAG_ARRAY]);
            encode_int(acc, items.len() as i64);
            for item in items {
                encode_value(acc, item)?;
            }
            Ok(())
        },
        Value::Object(map) => {
            acc.append(&[TAG_OBJECT]);
            let present: Vec<_> = map
                .iter()
                .filter(|(_, v)| !matches!(v, Value::Undefined))
                .collect();
            encode_int(acc, present.len() as i64);
            for (key, value) in present {
                encode_string(acc, key);
                encode_value(acc, value).map_err(|inner| EncodeError::Property {
                    key: key.clone(),
                    inner: Box::new(inner),
                })?;
            }
            Ok(())
        },
    }
}

fn is_i64_range(v: f64) -> bool {
    v >= i64::MIN as f64 && v <= i64::MAX as f64
}
