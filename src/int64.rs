//! SPDX-License-Identifier: MIT

//! Carrier for 64-bit signed integers that may fall outside the safe
//! integer range of smaller numeric types used elsewhere in a program.
//!
//! BSER transports integers up to 64 bits wide. A value that arrived (or
//! must be sent) as an `INT64` on the wire is wrapped in [`Int64`] so the
//! encoder can round-trip it at full width instead of guessing a smaller
//! tag from its magnitude (see [`crate::value::Value::Int64`]).

use std::fmt;

/// A 64-bit signed integer that rides the wire as `INT64` regardless of
/// whether its value would fit in a narrower tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Int64(pub i64);

impl Int64 {
    /// Wraps a raw `i64`.
    pub const fn new(v: i64) -> Self {
        Int64(v)
    }

    /// Returns the underlying `i64`.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Converts to `i32` if the value fits, otherwise `None`.
    ///
    /// Used by callers that want the smallest convenient native type
    /// rather than the wire-preserving carrier.
    pub fn to_fitting(self) -> FittingInt {
        if let Ok(v) = i8::try_from(self.0) {
            FittingInt::I8(v)
        } else if let Ok(v) = i16::try_from(self.0) {
            FittingInt::I16(v)
        } else if let Ok(v) = i32::try_from(self.0) {
            FittingInt::I32(v)
        } else {
            FittingInt::I64(self.0)
        }
    }
}

/// The smallest native integer type that can hold an [`Int64`]'s value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FittingInt {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
}

impl FittingInt {
    /// Widens to `i64` regardless of which variant was chosen.
    pub const fn as_i64(self) -> i64 {
        match self {
            FittingInt::I8(v) => v as i64,
            FittingInt::I16(v) => v as i64,
            FittingInt::I32(v) => v as i64,
            FittingInt::I64(v) => v,
        }
    }
}

impl From<i64> for Int64 {
    fn from(v: i64) -> Self {
        Int64(v)
    }
}

impl From<Int64> for i64 {
    fn from(v: Int64) -> Self {
        v.0
    }
}

impl fmt::Display for Int64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
