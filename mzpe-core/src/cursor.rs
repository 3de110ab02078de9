use std::io::{self, Read};

use byteorder::{ReadBytesExt, LE};

use crate::error::{Error, Result};

/// Forward-only little-endian reader over an immutable byte buffer.
///
/// Every read checks the remaining length first and fails with
/// [`Error::TruncatedInput`] carrying the current offset and `what` was being
/// read. A failed read never moves the cursor.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    inner: io::Cursor<&'a [u8]>,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            inner: io::Cursor::new(bytes),
        }
    }

    /// Offset of the next unread byte, relative to the start of the buffer.
    pub fn offset(&self) -> usize {
        self.inner.position() as usize
    }

    /// Length of the whole underlying buffer.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.offset())
    }

    /// Checks that at least `len` bytes are left without consuming them.
    pub fn ensure(&self, len: usize, what: &'static str) -> Result<()> {
        if self.remaining() < len {
            return Err(Error::truncated(what, self.offset()));
        }
        Ok(())
    }

    /// Like [`Cursor::ensure`] for `count` records of `size` bytes each.
    pub fn ensure_records(&self, count: usize, size: usize, what: &'static str) -> Result<()> {
        match count.checked_mul(size) {
            Some(total) => self.ensure(total, what),
            None => Err(Error::truncated(what, self.offset())),
        }
    }

    fn read_with<T>(
        &mut self,
        size: usize,
        what: &'static str,
        read: impl FnOnce(&mut io::Cursor<&'a [u8]>) -> io::Result<T>,
    ) -> Result<T> {
        self.ensure(size, what)?;
        let offset = self.offset();
        read(&mut self.inner).map_err(|_| Error::truncated(what, offset))
    }

    pub fn u8(&mut self, what: &'static str) -> Result<u8> {
        self.read_with(1, what, |c| c.read_u8())
    }

    pub fn u16(&mut self, what: &'static str) -> Result<u16> {
        self.read_with(2, what, |c| c.read_u16::<LE>())
    }

    pub fn u32(&mut self, what: &'static str) -> Result<u32> {
        self.read_with(4, what, |c| c.read_u32::<LE>())
    }

    pub fn u64(&mut self, what: &'static str) -> Result<u64> {
        self.read_with(8, what, |c| c.read_u64::<LE>())
    }

    pub fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        self.read_with(N, what, |c| {
            let mut out = [0u8; N];
            c.read_exact(&mut out)?;
            Ok(out)
        })
    }

    pub fn u16_array<const N: usize>(&mut self, what: &'static str) -> Result<[u16; N]> {
        self.read_with(N * 2, what, |c| {
            let mut out = [0u16; N];
            c.read_u16_into::<LE>(&mut out)?;
            Ok(out)
        })
    }

    /// Borrows the next `len` bytes from the buffer.
    pub fn bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8]> {
        self.ensure(len, what)?;
        let start = self.offset();
        let buf: &'a [u8] = *self.inner.get_ref();
        let span = &buf[start..start + len];
        self.inner.set_position((start + len) as u64);
        Ok(span)
    }

    /// Moves forward to `target`. Targets behind the cursor are ignored.
    pub fn skip_to(&mut self, target: usize, what: &'static str) -> Result<()> {
        if target <= self.offset() {
            return Ok(());
        }
        self.ensure(target - self.offset(), what)?;
        self.inner.set_position(target as u64);
        Ok(())
    }
}
