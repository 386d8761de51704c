//! Minimal big-endian binary helpers over `bytes::{Buf, BufMut}`.
//!
//! The wire format here only ever needs fixed-width big-endian `u32`s, so
//! this is a small slice of what a general-purpose binary-reader trait would
//! offer — no varints, no endianness choice, no UTF-8 strings.

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Errors raised while reading fixed-width fields out of a buffer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BinaryError {
    #[error("not enough bytes in buffer: needed {needed}, remaining {remaining}")]
    UnexpectedEof { needed: usize, remaining: usize },
}

pub type Result<T> = std::result::Result<T, BinaryError>;

macro_rules! check_remaining {
    ($buf:expr, $len:expr) => {
        let needed = $len;
        let remaining = $buf.remaining();
        if remaining < needed {
            return Err(BinaryError::UnexpectedEof { needed, remaining });
        }
    };
}

/// Extension trait for reading big-endian fixed-width fields from a [`Buf`].
pub trait BinaryReader: Buf {
    #[inline]
    fn read_u32_be(&mut self) -> Result<u32> {
        check_remaining!(self, 4);
        Ok(self.get_u32())
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> Result<bytes::Bytes>
    where
        Self: Sized,
    {
        check_remaining!(self, len);
        Ok(self.copy_to_bytes(len))
    }
}

impl<T: Buf> BinaryReader for T {}

/// Extension trait for writing big-endian fixed-width fields to a [`BufMut`].
pub trait BinaryWriter: BufMut {
    #[inline]
    fn write_u32_be(&mut self, value: u32) {
        self.put_u32(value);
    }
}

impl<T: BufMut> BinaryWriter for T {}
