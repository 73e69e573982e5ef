//! SPDX-License-Identifier: MIT

//! The BSER wire format: tag bytes, the PDU envelope, and the
//! encoder/decoder pair that move [`crate::value::Value`]s across it.

pub mod decoder;
pub mod encoder;
pub mod error;

pub use decoder::Decoder;
pub use encoder::encode;
pub use error::{DecodeError, EncodeError};

pub(crate) const TAG_ARRAY: u8 = 0x00;
pub(crate) const TAG_OBJECT: u8 = 0x01;
pub(crate) const TAG_STRING: u8 = 0x02;
pub(crate) const TAG_INT8: u8 = 0x03;
pub(crate) const TAG_INT16: u8 = 0x04;
pub(crate) const TAG_INT32: u8 = 0x05;
pub(crate) const TAG_INT64: u8 = 0x06;
pub(crate) const TAG_REAL: u8 = 0x07;
pub(crate) const TAG_TRUE: u8 = 0x08;
pub(crate) const TAG_FALSE: u8 = 0x09;
pub(crate) const TAG_NULL: u8 = 0x0a;
pub(crate) const TAG_TEMPLATE: u8 = 0x0b;
pub(crate) const TAG_SKIP: u8 = 0x0c;

/// The two fixed bytes that open every PDU.
pub(crate) const PDU_HEADER: [u8; 2] = [0x00, 0x01];

/// Decodes exactly one PDU from a byte slice, failing if the slice
/// contains anything other than exactly one complete, valid PDU.
pub fn load_from_buffer(bytes: &[u8]) -> Result<crate::value::Value, DecodeError> {
    let mut decoder = Decoder::new();
    decoder.feed(bytes);
    let value = decoder.try_decode_one()?.ok_or(DecodeError::Incomplete)?;
    let trailing = decoder.read_avail();
    if trailing > 0 {
        return Err(DecodeError::TrailingBytes(trailing));
    }
    Ok(value)
}
