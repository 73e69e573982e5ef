//! SPDX-License-Identifier: MIT

use thiserror::Error;

/// Failures raised while decoding BSER bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected PDU header 00 01, got {0:02x?}")]
    BadHeader([u8; 2]),

    #[error("unknown BSER tag byte 0x{0:02x}")]
    UnknownTag(u8),

    #[error("expected a BSER string for an object key, got tag 0x{0:02x}")]
    ExpectedStringKey(u8),

    #[error("template key list must be a BSER array")]
    TemplateKeysNotArray,

    #[error("template key list must contain only strings")]
    TemplateKeyNotString,

    #[error("SKIP tag encountered outside of a template row")]
    UnexpectedSkip,

    #[error(
        "short read while decoding an integer: wanted {wanted} byte(s), \
         {available} available (buf_len={buf_len}, read_offset={read_offset}, \
         next={next:02x?})"
    )]
    Integer {
        wanted: usize,
        available: usize,
        buf_len: usize,
        read_offset: usize,
        next: Vec<u8>,
    },

    #[error(transparent)]
    ShortRead(#[from] crate::accumulator::ShortReadError),

    #[error("{0} trailing byte(s) after decoding one PDU")]
    TrailingBytes(usize),

    #[error("buffer does not yet contain a complete PDU")]
    Incomplete,
}

/// Failures raised while encoding a [`crate::value::Value`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("cannot serialize type {0}")]
    UnsupportedType(String),

    #[error("{inner} (while serializing object property with name '{key}')")]
    Property {
        key: String,
        #[source]
        inner: Box<EncodeError>,
    },
}
