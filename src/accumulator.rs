//! SPDX-License-Identifier: MIT

//! Growable byte buffer with separate read/write cursors.
//!
//! The decoder needs to speculatively peek a value's tag, discover it can't
//! complete yet, and rewind without an auxiliary save/restore buffer —
//! that's what [`Accumulator::read_advance`]'s negative deltas are for.

use thiserror::Error;

/// Failure reading a fixed-size field out of an [`Accumulator`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "short read: wanted {wanted} bytes but only {available} available (buf \
     len {buf_len}, read_offset {read_offset})"
)]
pub struct ShortReadError {
    pub wanted: usize,
    pub available: usize,
    pub buf_len: usize,
    pub read_offset: usize,
}

/// A byte buffer with independent read and write cursors.
///
/// Invariant: `0 <= read_offset <= write_offset <= buf.len()`.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    buf: Vec<u8>,
    read_offset: usize,
    write_offset: usize,
}

impl Accumulator {
    /// Creates an empty accumulator with no preallocated capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an accumulator with at least `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Accumulator {
            buf: vec![0u8; capacity],
            read_offset: 0,
            write_offset: 0,
        }
    }

    /// Bytes of backing storage not yet written to.
    pub fn write_avail(&self) -> usize {
        self.buf.len() - self.write_offset
    }

    /// Bytes written but not yet read.
    pub fn read_avail(&self) -> usize {
        self.write_offset - self.read_offset
    }

    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn buf_len(&self) -> usize {
        self.buf.len()
    }

    /// The unread slice `[read_offset, write_offset)`.
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.read_offset..self.write_offset]
    }

    /// Ensures at least `n` bytes of write capacity, first by shunting
    /// unread bytes down to offset 0, then by doubling the backing store
    /// to the next power of two.
    pub fn reserve(&mut self, n: usize) {
        if self.write_avail() > n {
            return;
        }

        let unread = self.read_avail();
        self.buf.copy_within(self.read_offset..self.write_offset, 0);
        self.read_offset = 0;
        self.write_offset = unread;

        if self.write_avail() > n {
            return;
        }

        let needed = self.buf.len() + n - self.write_avail();
        let new_cap = needed.next_power_of_two().max(1);
        self.buf.resize(new_cap, 0);
    }

    /// Appends raw bytes, growing the buffer if necessary.
    pub fn append(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        let start = self.write_offset;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        self.write_offset += bytes.len();
    }

    /// Moves the read cursor by `delta`, which may be negative to
    /// backtrack after a speculative peek. Panics-free: returns `Err` if
    /// the result would fall outside `[0, write_offset]`.
    pub fn read_advance(&mut self, delta: isize) -> Result<(), ShortReadError> {
        if delta >= 0 {
            let delta = delta as usize;
            if self.read_avail() < delta {
                return Err(ShortReadError {
                    wanted: delta,
                    available: self.read_avail(),
                    buf_len: self.buf.len(),
                    read_offset: self.read_offset,
                });
            }
            self.read_offset += delta;
        } else {
            let back = delta.unsigned_abs();
            if back > self.read_offset {
                return Err(ShortReadError {
                    wanted: back,
                    available: self.read_offset,
                    buf_len: self.buf.len(),
                    read_offset: self.read_offset,
                });
            }
            self.read_offset -= back;
        }
        Ok(())
    }

    fn check_avail(&self, n: usize) -> Result<(), ShortReadError> {
        if self.read_avail() < n {
            return Err(ShortReadError {
                wanted: n,
                available: self.read_avail(),
                buf_len: self.buf.len(),
                read_offset: self.read_offset,
            });
        }
        Ok(())
    }

    /// Peeks `n` raw bytes without advancing the read cursor.
    pub fn peek_bytes(&self, n: usize) -> Result<&[u8], ShortReadError> {
        self.check_avail(n)?;
        Ok(&self.buf[self.read_offset..self.read_offset + n])
    }

    /// Reads `n` raw bytes, advancing the read cursor.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ShortReadError> {
        let out = self.peek_bytes(n)?.to_vec();
        self.read_offset += n;
        Ok(out)
    }

    /// Peeks an `n`-byte (1/2/4/8) signed integer in host endianness,
    /// without advancing the read cursor.
    pub fn peek_int(&self, size: usize) -> Result<i64, ShortReadError> {
        let bytes = self.peek_bytes(size)?;
        Ok(match size {
            1 => i8::from_ne_bytes(bytes.try_into().expect("size 1")) as i64,
            2 => i16::from_ne_bytes(bytes.try_into().expect("size 2")) as i64,
            4 => i32::from_ne_bytes(bytes.try_into().expect("size 4")) as i64,
            8 => i64::from_ne_bytes(bytes.try_into().expect("size 8")),
            other => unreachable!("unsupported integer width {other}"),
        })
    }

    /// Reads an `n`-byte signed integer in host endianness, advancing the
    /// read cursor.
    pub fn read_int(&mut self, size: usize) -> Result<i64, ShortReadError> {
        let v = self.peek_int(size)?;
        self.read_offset += size;
        Ok(v)
    }

    /// Peeks an 8-byte host-endian IEEE-754 double without advancing.
    pub fn peek_double(&self) -> Result<f64, ShortReadError> {
        let bytes = self.peek_bytes(8)?;
        Ok(f64::from_ne_bytes(bytes.try_into().expect("size 8")))
    }

    /// Reads an 8-byte host-endian IEEE-754 double, advancing the cursor.
    pub fn read_double(&mut self) -> Result<f64, ShortReadError> {
        let v = self.peek_double()?;
        self.read_offset += 8;
        Ok(v)
    }

    /// Writes an `n`-byte (1/2/4/8) signed integer in host endianness.
    pub fn write_int(&mut self, value: i64, size: usize) {
        match size {
            1 => self.append(&(value as i8).to_ne_bytes()),
            2 => self.append(&(value as i16).to_ne_bytes()),
            4 => self.append(&(value as i32).to_ne_bytes()),
            8 => self.append(&value.to_ne_bytes()),
            other => unreachable!("unsupported integer width {other}"),
        }
    }

    /// Writes an 8-byte host-endian IEEE-754 double.
    pub fn write_double(&mut self, value: f64) {
        self.append(&value.to_ne_bytes());
    }

    /// Overwrites `size` bytes at `offset` with a host-endian integer.
    /// Used by the encoder to back-patch the PDU length after the payload
    /// has been serialized.
    pub fn patch_int(&mut self, offset: usize, value: i64, size: usize) {
        let bytes: Vec<u8> = match size {
            1 => (value as i8).to_ne_bytes().to_vec(),
            2 => (value as i16).to_ne_bytes().to_vec(),
            4 => (value as i32).to_ne_bytes().to_vec(),
            8 => value.to_ne_bytes().to_vec(),
            other => unreachable!("unsupported integer width {other}"),
        };
        self.buf[offset..offset + size].copy_from_slice(&bytes);
    }

    /// The full written region, from byte 0 (not just the unread tail) —
    /// used by the encoder to hand a complete PDU to the socket.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.write_offset]
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shunt_reclaims_read_bytes() {
        let mut acc = Accumulator::with_capacity(8);
        acc.append(&[1, 2, 3, 4, 5]);
        acc.read_advance(3).expect("advance");
        assert_eq!(acc.read_offset(), 3);

        acc.reserve(5);

        assert_eq!(acc.read_offset(), 0);
        assert_eq!(acc.read_avail(), 2);
        assert_eq!(acc.write_avail(), 6);
        assert_eq!(acc.unread(), &[4, 5]);
    }

    #[test]
    fn negative_advance_backtracks() {
        let mut acc = Accumulator::with_capacity(4);
        acc.append(&[1, 2, 3, 4]);
        acc.read_advance(2).expect("advance");
        acc.read_advance(-2).expect("backtrack");
        assert_eq!(acc.read_offset(), 0);
        assert!(acc.read_advance(-1).is_err());
    }

    #[test]
    fn short_read_reports_counts() {
        let acc = Accumulator::with_capacity(4);
        let err = acc.peek_int(4).expect_err("should be short");
        assert_eq!(err.wanted, 4);
        assert_eq!(err.available, 0);
    }

    #[test]
    fn round_trips_integers_and_doubles() {
        let mut acc = Accumulator::with_capacity(16);
        acc.write_int(-42, 2);
        acc.write_double(1.5);
        assert_eq!(acc.read_int(2).expect("int"), -42);
        assert_eq!(acc.read_double().expect("double"), 1.5);
    }
}
