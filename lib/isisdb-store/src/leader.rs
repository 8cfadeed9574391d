//! Record leaders and directory entries, in both the standard and the
//! extra-large ("xl") widths. A database uses one variant globally.

use isisdb_core::config::ByteOrder;
use isisdb_core::record::RecordStatus;

use crate::codec::{Reader, Writer};
use crate::{Error, Result};

pub const LEADER_SIZE: usize = 20;
pub const DIR_SIZE_SMALL: usize = 6;
pub const DIR_SIZE_WIDE: usize = 12;

/// Fixed-size prologue of every stored record.
///
/// `mfrl` is the packed total length (leader + directory + data); `base` the
/// offset of the data region within the record, which must always equal
/// `LEADER_SIZE + dir_size * nvf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    pub mfn: u32,
    pub mfrl: u16,
    pub mfbwb: u32,
    pub mfbwp: u16,
    pub base: u16,
    pub nvf: u16,
    pub status: RecordStatus,
}

impl Leader {
    pub fn encode(&self, order: ByteOrder, xl: bool) -> Vec<u8> {
        let mut w = Writer::with_capacity(order, LEADER_SIZE);
        w.write_u32(self.mfn);
        w.write_u16(self.mfrl);
        if xl {
            w.write_u16(1);
            w.write_u32(self.mfbwb);
        } else {
            w.write_i32(1);
            w.write_u16(self.mfbwb as u16);
        }
        w.write_u16(self.mfbwp);
        w.write_u16(self.base);
        w.write_u16(self.nvf);
        w.write_u16(self.status.as_raw());
        w.into_bytes()
    }

    pub fn decode(bytes: &[u8], order: ByteOrder, xl: bool, mfn_hint: u32) -> Result<Self> {
        let mut r = Reader::new(bytes, order);
        let leader = (|| {
            let mfn = r.read_u32()?;
            let mfrl = r.read_u16()?;
            let mfbwb = if xl {
                r.read_u16()?;
                r.read_u32()?
            } else {
                r.read_i32()?;
                u32::from(r.read_u16()?)
            };
            let mfbwp = r.read_u16()?;
            let base = r.read_u16()?;
            let nvf = r.read_u16()?;
            let status = RecordStatus::from_raw(r.read_u16()?);
            Some(Self {
                mfn,
                mfrl,
                mfbwb,
                mfbwp,
                base,
                nvf,
                status,
            })
        })();
        leader.ok_or(Error::Corrupted {
            mfn: mfn_hint,
            reason: "unreadable leader".to_owned(),
        })
    }

    /// Offset of the status word inside the encoded leader, used to patch
    /// deletion state in place.
    pub fn status_offset() -> usize {
        LEADER_SIZE - 2
    }
}

/// One `(tag, relative offset, length)` directory triple. Offsets are
/// relative to the data region that follows the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub tag: u32,
    pub offset: usize,
    pub len: usize,
}

impl DirEntry {
    pub fn encode(&self, w: &mut Writer, wide: bool) {
        if wide {
            w.write_i32(self.tag as i32);
            w.write_i32(self.offset as i32);
            w.write_i32(self.len as i32);
        } else {
            w.write_u16(self.tag as u16);
            w.write_u16(self.offset as u16);
            w.write_u16(self.len as u16);
        }
    }

    pub fn decode(r: &mut Reader<'_>, wide: bool) -> Option<Self> {
        let (tag, offset, len) = if wide {
            (
                r.read_i32()? as u32,
                r.read_i32()? as usize,
                r.read_i32()? as usize,
            )
        } else {
            (
                u32::from(r.read_u16()?),
                usize::from(r.read_u16()?),
                usize::from(r.read_u16()?),
            )
        };
        Some(Self {
            // tags are 16-bit on disk regardless of entry width
            tag: tag & 0xffff,
            offset,
            len,
        })
    }

    pub fn size(wide: bool) -> usize {
        if wide {
            DIR_SIZE_WIDE
        } else {
            DIR_SIZE_SMALL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_round_trip_both_variants() {
        let leader = Leader {
            mfn: 42,
            mfrl: 180,
            mfbwb: 3,
            mfbwp: 128,
            base: 44,
            nvf: 4,
            status: RecordStatus::Active,
        };
        for xl in [false, true] {
            let bytes = leader.encode(ByteOrder::Little, xl);
            assert_eq!(bytes.len(), LEADER_SIZE);
            let decoded = Leader::decode(&bytes, ByteOrder::Little, xl, 42).unwrap();
            assert_eq!(decoded, leader);
        }
    }

    #[test]
    fn status_patch_offset() {
        let mut leader = Leader {
            mfn: 1,
            mfrl: 26,
            mfbwb: 0,
            mfbwp: 0,
            base: 26,
            nvf: 1,
            status: RecordStatus::Active,
        };
        let mut bytes = leader.encode(ByteOrder::Little, true);
        bytes[Leader::status_offset()] = RecordStatus::LogicallyDeleted.as_raw() as u8;
        leader.status = RecordStatus::LogicallyDeleted;
        assert_eq!(
            Leader::decode(&bytes, ByteOrder::Little, true, 1).unwrap(),
            leader
        );
    }

    #[test]
    fn dir_entry_masks_tag() {
        let mut w = Writer::new(ByteOrder::Little);
        DirEntry {
            tag: 0x1_0026,
            offset: 10,
            len: 5,
        }
        .encode(&mut w, true);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes, ByteOrder::Little);
        let entry = DirEntry::decode(&mut r, true).unwrap();
        assert_eq!(entry.tag, 0x26);
        assert_eq!((entry.offset, entry.len), (10, 5));
    }
}
