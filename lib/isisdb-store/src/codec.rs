//! Endian-explicit readers and writers for the packed on-disk structures.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use isisdb_core::config::ByteOrder;

/// Sequential reader over a byte slice with a configured byte order.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, pos: 0, order }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let chunk = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(chunk)
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        self.take(4).map(|b| match self.order {
            ByteOrder::Little => LittleEndian::read_i32(b),
            ByteOrder::Big => BigEndian::read_i32(b),
        })
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_i32().map(|v| v as u32)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| match self.order {
            ByteOrder::Little => LittleEndian::read_u16(b),
            ByteOrder::Big => BigEndian::read_u16(b),
        })
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }
}

/// Growable buffer writer with a configured byte order.
pub struct Writer {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl Writer {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    pub fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            order,
        }
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut b = [0u8; 4];
        match self.order {
            ByteOrder::Little => LittleEndian::write_i32(&mut b, value),
            ByteOrder::Big => BigEndian::write_i32(&mut b, value),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_i32(value as i32);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut b = [0u8; 2];
        match self.order {
            ByteOrder::Little => LittleEndian::write_u16(&mut b, value),
            ByteOrder::Big => BigEndian::write_u16(&mut b, value),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn pad_to(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
