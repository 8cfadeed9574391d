//! The master file's control header: the first `CTRL_SIZE` bytes at offset
//! zero, tracking the next MFN to allocate and the current file tail.

use isisdb_core::config::ByteOrder;

use crate::codec::{Reader, Writer};
use crate::{Error, Result};

/// Packed fields of the control block. `nxtmfb` is the last block in use
/// (1-based); `nxtmfp` the next free offset inside it (initially 64, right
/// past the header itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlHeader {
    pub ctlmfn: i32,
    pub nxtmfn: u32,
    pub nxtmfb: u32,
    pub nxtmfp: u32,
    pub mftype: u8,
    pub reccnt: i32,
    pub mfcxx1: i32,
    pub mfcxx2: i32,
    pub mfcxx3: i32,
}

impl Default for ControlHeader {
    fn default() -> Self {
        Self {
            ctlmfn: 0,
            nxtmfn: 1,
            nxtmfb: 1,
            nxtmfp: 64,
            mftype: 0,
            reccnt: 0,
            mfcxx1: 0,
            mfcxx2: 0,
            mfcxx3: 0,
        }
    }
}

impl ControlHeader {
    /// Serialize to exactly `ctrl_size` bytes, zero padded.
    pub fn encode(&self, order: ByteOrder, ctrl_size: usize) -> Vec<u8> {
        let mut w = Writer::with_capacity(order, ctrl_size);
        w.write_i32(self.ctlmfn);
        w.write_u32(self.nxtmfn);
        w.write_u32(self.nxtmfb);
        w.write_u32(self.nxtmfp);
        w.write_u16(0);
        w.write_u8(self.mftype);
        w.write_u8(0);
        w.write_i32(self.reccnt);
        w.write_i32(self.mfcxx1);
        w.write_i32(self.mfcxx2);
        w.write_i32(self.mfcxx3);
        w.pad_to(ctrl_size);
        w.into_bytes()
    }

    pub fn decode(bytes: &[u8], order: ByteOrder) -> Result<Self> {
        let mut r = Reader::new(bytes, order);
        let header = (|| {
            let ctlmfn = r.read_i32()?;
            let nxtmfn = r.read_u32()?;
            let nxtmfb = r.read_u32()?;
            let nxtmfp = r.read_u32()?;
            r.read_u16()?;
            let mftype = r.read_u8()?;
            r.read_u8()?;
            let reccnt = r.read_i32()?;
            let mfcxx1 = r.read_i32()?;
            let mfcxx2 = r.read_i32()?;
            let mfcxx3 = r.read_i32()?;
            Some(Self {
                ctlmfn,
                nxtmfn,
                nxtmfb,
                nxtmfp,
                mftype,
                reccnt,
                mfcxx1,
                mfcxx2,
                mfcxx3,
            })
        })();
        header.ok_or(Error::Corrupted {
            mfn: 0,
            reason: "control header truncated".to_owned(),
        })
    }

    /// Extra-large code: databases declaring `mftype > 1` widen their XRF
    /// packing by this amount of bits.
    pub fn extra_large(&self) -> u8 {
        if self.mftype > 1 {
            self.mftype
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let header = ControlHeader {
            nxtmfn: 151,
            nxtmfb: 12,
            nxtmfp: 320,
            reccnt: 150,
            ..Default::default()
        };
        let bytes = header.encode(ByteOrder::Little, 64);
        assert_eq!(bytes.len(), 64);
        assert_eq!(ControlHeader::decode(&bytes, ByteOrder::Little).unwrap(), header);
    }

    #[test]
    fn extra_large_code() {
        let mut header = ControlHeader::default();
        assert_eq!(header.extra_large(), 0);
        header.mftype = 1;
        assert_eq!(header.extra_large(), 0);
        header.mftype = 3;
        assert_eq!(header.extra_large(), 3);
    }

    #[test]
    fn truncated_header_is_corruption() {
        assert!(ControlHeader::decode(&[0u8; 10], ByteOrder::Little).is_err());
    }
}
