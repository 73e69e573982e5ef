//! SPDX-License-Identifier: MIT

//! Stateful PDU framer and recursive value decoder.
//!
//! [`Decoder`] is fed raw bytes as they arrive off the wire and hands back
//! zero or more complete [`Value`]s. It never emits a value before it has
//! consumed the entire PDU for that value, and it never blocks: a call to
//! [`Decoder::try_decode_one`] returns `Ok(None)` as soon as the buffered
//! bytes run out, leaving the decoder ready to resume on the next feed.

use super::{
    TAG_ARRAY, TAG_FALSE, TAG_INT8, TAG_INT16, TAG_INT32, TAG_INT64, TAG_NULL, TAG_OBJECT,
    TAG_REAL, TAG_SKIP, TAG_STRING, TAG_TEMPLATE, TAG_TRUE, error::DecodeError,
};
use crate::{accumulator::Accumulator, int64::Int64, value::Value};

#[derive(Debug, Clone, Copy)]
enum State {
    NeedPdu,
    FillPdu { pdu_len: usize },
}

/// Incremental BSER decoder. Owns an internal [`Accumulator`]; bytes fed in
/// via [`Decoder::feed`] are consumed as complete PDUs become available.
#[derive(Debug)]
pub struct Decoder {
    acc: Accumulator,
    state: State,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Decoder {
            acc: Accumulator::new(),
            state: State::NeedPdu,
        }
    }

    /// Appends raw inbound bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.acc.append(bytes);
    }

    /// Bytes buffered but not yet consumed into a decoded value.
    pub fn read_avail(&self) -> usize {
        self.acc.read_avail()
    }

    /// Attempts to decode one complete PDU from the buffered bytes.
    ///
    /// Returns `Ok(None)` if the buffer doesn't yet contain a full PDU.
    /// Callers that want to drain a burst of back-to-back PDUs should call
    /// this repeatedly, yielding to the scheduler between calls so a large
    /// burst can't starve other work.
    pub fn try_decode_one(&mut self) -> Result<Option<Value>, DecodeError> {
        loop {
            match self.state {
                State::NeedPdu => {
                    if !self.advance_need_pdu()? {
                        return Ok(None);
                    }
                },
                State::FillPdu { pdu_len } => {
                    if self.acc.read_avail() < pdu_len {
                        return Ok(None);
                    }
                    let value = decode_value(&mut self.acc)?;
                    self.state = State::NeedPdu;
                    return Ok(Some(value));
                },
            }
        }
    }

    /// Reads the two header bytes and the PDU length. Returns `Ok(false)`
    /// (after rewinding) when there isn't yet enough data to complete the
    /// header.
    fn advance_need_pdu(&mut self) -> Result<bool, DecodeError> {
        if self.acc.read_avail() < 2 {
            return Ok(false);
        }
        let header: [u8; 2] = self
            .acc
            .peek_bytes(2)?
            .try_into()
            .unwrap_or_default();
        if header != super::PDU_HEADER {
            return Err(DecodeError::BadHeader(header));
        }
        self.acc.read_advance(2)?;

        match try_decode_bser_int(&mut self.acc)? {
            Some(len) => {
                let pdu_len = usize::try_from(len).unwrap_or(0);
                self.acc.reserve(pdu_len);
                self.state = State::FillPdu { pdu_len };
                Ok(true)
            },
            None => {
                self.acc.read_advance(-2)?;
                Ok(false)
            },
        }
    }
}

fn integer_short_read(acc: &Accumulator, wanted: usize) -> DecodeError {
    let available = acc.read_avail();
    let dump_len = available.min(32);
    let next = acc.peek_bytes(dump_len).unwrap_or_default().to_vec();
    DecodeError::Integer {
        wanted,
        available,
        buf_len: acc.buf_len(),
        read_offset: acc.read_offset(),
        next,
    }
}

/// Attempts to decode a BSER integer (tag + sized payload) without
/// erroring on insufficient data — used only for the PDU length field,
/// which may legitimately still be in flight.
fn try_decode_bser_int(acc: &mut Accumulator) -> Result<Option<i64>, DecodeError> {
    if acc.read_avail() < 1 {
        return Ok(None);
    }
    let tag = acc.peek_bytes(1)?[0];
    let size = match int_tag_size(tag) {
        Some(size) => size,
        None => return Err(DecodeError::UnknownTag(tag)),
    };
    if acc.read_avail() < 1 + size {
        return Ok(None);
    }
    acc.read_advance(1)?;
    Ok(Some(acc.read_int(size)?))
}

/// Decodes a BSER integer once its tag and payload are known to be fully
/// buffered.
fn decode_bser_int(acc: &mut Accumulator) -> Result<i64, DecodeError> {
    if acc.read_avail() < 1 {
        return Err(integer_short_read(acc, 1));
    }
    let tag = acc.peek_bytes(1)?[0];
    let size = match int_tag_size(tag) {
        Some(size) => size,
        None => return Err(DecodeError::UnknownTag(tag)),
    };
    if acc.read_avail() < 1 + size {
        return Err(integer_short_read(acc, 1 + size));
    }
    acc.read_advance(1)?;
    Ok(acc.read_int(size)?)
}

fn int_tag_size(tag: u8) -> Option<usize> {
    match tag {
        TAG_INT8 => Some(1),
        TAG_INT16 => Some(2),
        TAG_INT32 => Some(4),
        TAG_INT64 => Some(8),
        _ => None,
    }
}

fn decode_len(acc: &mut Accumulator) -> Result<usize, DecodeError> {
    let v = decode_bser_int(acc)?;
    Ok(usize::try_from(v).unwrap_or(0))
}

fn decode_string(acc: &mut Accumulator) -> Result<String, DecodeError> {
    let tag = acc.read_bytes(1)?[0];
    if tag != TAG_STRING {
        return Err(DecodeError::ExpectedStringKey(tag));
    }
    let len = decode_len(acc)?;
    let bytes = acc.read_bytes(len)?;
    Ok(bytes_to_string(bytes))
}

fn bytes_to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(&e.into_bytes()).into_owned())
}

fn decode_template(acc: &mut Accumulator) -> Result<Value, DecodeError> {
    let keys_tag = acc.read_bytes(1)?[0];
    if keys_tag != TAG_ARRAY {
        return Err(DecodeError::TemplateKeysNotArray);
    }
    let key_count = decode_len(acc)?;
    let mut keys = Vec::with_capacity(key_count);
    for _ in 0..key_count {
        let tag = acc.read_bytes(1)?[0];
        if tag != TAG_STRING {
            return Err(DecodeError::TemplateKeyNotString);
        }
        let len = decode_len(acc)?;
        keys.push(bytes_to_string(acc.read_bytes(len)?));
    }

    let row_count = decode_len(acc)?;
    let mut rows = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        let mut obj = crate::value::Object::new();
        for key in &keys {
            let tag = acc.peek_bytes(1)?[0];
            if tag == TAG_SKIP {
                acc.read_advance(1)?;
                continue;
            }
            obj.insert(key.clone(), decode_value(acc)?);
        }
        rows.push(Value::Object(obj));
    }
    Ok(Value::Array(rows))
}

/// Recursively decodes one [`Value`], dispatching on the leading tag byte.
fn decode_value(acc: &mut Accumulator) -> Result<Value, DecodeError> {
    let tag = acc.read_bytes(1)?[0];
    match tag {
        TAG_ARRAY => {
            let count = decode_len(acc)?;
            let mut items = Vec::with_capacity(count.min(4096));
            for _ in 0..count {
                items.push(decode_value(acc)?);
            }
            Ok(Value::Array(items))
        },
        TAG_OBJECT => {
            let count = decode_len(acc)?;
            let mut obj = crate::value::Object::new();
            for _ in 0..count {
                let key = decode_string(acc)?;
                let value = decode_value(acc)?;
                obj.insert(key, value);
            }
            Ok(Value::Object(obj))
        },
        TAG_STRING => {
            let len = decode_len(acc)?;
            Ok(Value::String(bytes_to_string(acc.read_bytes(len)?)))
        },
        TAG_INT8 => Ok(Value::Int(acc.read_int(1)?)),
        TAG_INT16 => Ok(Value::Int(acc.read_int(2)?)),
        TAG_INT32 => Ok(Value::Int(acc.read_int(4)?)),
        TAG_INT64 => Ok(Value::Int64(Int64::new(acc.read_int(8)?))),
        TAG_REAL => Ok(Value::Real(acc.read_double()?)),
        TAG_TRUE => Ok(Value::Bool(true)),
        TAG_FALSE => Ok(Value::Bool(false)),
        TAG_NULL => Ok(Value::Null),
        TAG_TEMPLATE => decode_template(acc),
        TAG_SKIP => Err(DecodeError::UnexpectedSkip),
        other => Err(DecodeError::UnknownTag(other)),
    }
}
