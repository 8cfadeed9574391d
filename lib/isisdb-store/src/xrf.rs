//! The cross-reference file: a paged index mapping each MFN to the block
//! and offset of its record in the master file, plus status bits.
//!
//! Each block starts with a signed block id (negative marks the last
//! block), followed by packed 32-bit entries. Blocks are read whole on
//! demand and cached; single entries are written back immediately.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use isisdb_core::config::{ByteOrder, Config};

use crate::codec::{Reader, Writer};
use crate::{Error, Result};

/// Record state as derived from an entry's block and offset signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrfStatus {
    Active,
    LogicallyDeleted,
    PhysicallyDeleted,
    Inexistent,
    Invalid,
}

/// One unpacked cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XrfEntry {
    pub block: i32,
    pub offset: i32,
    pub new_flag: bool,
    pub modified_flag: bool,
}

impl XrfEntry {
    pub fn status(&self) -> XrfStatus {
        if self.block > 0 {
            XrfStatus::Active
        } else if self.block < 0 && self.offset > 0 {
            XrfStatus::LogicallyDeleted
        } else if self.block == -1 && self.offset == 0 {
            XrfStatus::PhysicallyDeleted
        } else if self.block == 0 && self.offset == 0 {
            XrfStatus::Inexistent
        } else {
            XrfStatus::Invalid
        }
    }

    /// Absolute byte position of the referenced record.
    pub fn position(&self, block_power: u32) -> u64 {
        let block = self.block.unsigned_abs() as u64;
        ((block - 1) << block_power) + self.offset as u64
    }

    /// Point this entry at an active record stored at `pos`.
    pub fn set_position(&mut self, pos: u64, block_size: usize, new: bool, modified: bool) {
        self.block = (pos / block_size as u64) as i32 + 1;
        self.offset = (pos % block_size as u64) as i32;
        self.new_flag = new;
        self.modified_flag = modified;
    }

    pub fn mark_logically_deleted(&mut self) {
        self.block = -self.block.abs();
    }

    pub fn mark_active(&mut self) {
        self.block = self.block.abs();
    }

    /// Pack into the stored 32-bit word. A logically deleted entry stores
    /// the negation of its positive encoding. `xl` is the extra-large
    /// shift (0 for regular databases).
    pub fn encode(&self, config: &Config, xl: u8) -> i32 {
        match self.status() {
            XrfStatus::Inexistent => return 0,
            XrfStatus::PhysicallyDeleted => return -config.xrf_block,
            _ => {}
        }

        let mut low = if xl > 0 {
            (self.offset >> xl) & (config.xrf_offset_mask >> xl)
        } else {
            self.offset & config.xrf_offset_mask
        };
        if self.new_flag {
            low |= config.xrf_new_flag >> xl;
        }
        if self.modified_flag {
            low |= config.xrf_modified_flag >> xl;
        }

        let word = (self.block.abs() * (config.xrf_block >> xl)) | low;
        if self.block < 0 {
            -word
        } else {
            word
        }
    }

    /// Reverse of [`encode`](Self::encode).
    pub fn decode(word: i32, config: &Config, xl: u8) -> Self {
        if word == 0 {
            return Self::default();
        }
        if word == -config.xrf_block {
            return Self {
                block: -1,
                offset: 0,
                new_flag: false,
                modified_flag: false,
            };
        }

        let magnitude = word.unsigned_abs() as i32;
        let block = magnitude / (config.xrf_block >> xl);
        let offset = (magnitude & (config.xrf_offset_mask >> xl)) << xl;
        let new_flag = magnitude & (config.xrf_new_flag >> xl) != 0;
        let modified_flag = magnitude & (config.xrf_modified_flag >> xl) != 0;

        Self {
            block: if word < 0 { -block } else { block },
            offset,
            new_flag,
            modified_flag,
        }
    }
}

/// Paged reader/writer over a `.xrf` file.
pub struct XrfFile {
    path: PathBuf,
    file: File,
    readonly: bool,
    order: ByteOrder,
    block_size: usize,
    xl: u8,
    cache: HashMap<u32, XrfEntry>,
}

impl XrfFile {
    /// Open `<base>/<name>.xrf`, creating it with a single empty block when
    /// missing or empty.
    pub fn open(path: &Path, config: &Config, xl: u8, readonly: bool) -> Result<Self> {
        let file = if readonly {
            OpenOptions::new().read(true).open(path)
        } else {
            OpenOptions::new().read(true).write(true).open(path)
        };

        let (file, fresh) = match file {
            Ok(file) => {
                let empty = file.metadata()?.len() == 0;
                (file, empty)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "creating cross-reference file");
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(path)?;
                (file, true)
            }
            Err(err) => return Err(err.into()),
        };

        let mut xrf = Self {
            path: path.to_owned(),
            file,
            readonly,
            order: config.byte_order,
            block_size: config.block_size,
            xl,
            cache: HashMap::new(),
        };
        if fresh {
            xrf.append_block()?;
        }
        Ok(xrf)
    }

    fn pointers_per_block(&self) -> u32 {
        (self.block_size / 4 - 1) as u32
    }

    /// Block index (1-based), slot within the block (0-based) and absolute
    /// byte offset of the entry for `mfn`.
    fn locate(&self, mfn: u32) -> (u32, u32, u64) {
        let per_block = self.pointers_per_block();
        let block_idx = (mfn - 1) / per_block;
        let slot = (mfn - 1) % per_block;
        let abs = block_idx as u64 * self.block_size as u64 + (slot as u64 + 1) * 4;
        (block_idx + 1, slot, abs)
    }

    /// Look up an MFN, reading and caching its whole block on first access.
    /// Positions beyond the end of the file synthesize `inexistent`.
    pub fn entry(&mut self, mfn: u32, config: &Config) -> Result<XrfEntry> {
        if let Some(entry) = self.cache.get(&mfn) {
            return Ok(*entry);
        }

        let (block_idx, _, _) = self.locate(mfn);
        let start = (block_idx as u64 - 1) * self.block_size as u64;
        if start >= self.file.metadata()?.len() {
            return Ok(XrfEntry::default());
        }

        self.file.seek(SeekFrom::Start(start))?;
        let mut raw = vec![0u8; self.block_size];
        let read = read_up_to(&mut self.file, &mut raw)?;
        if read < self.block_size {
            raw.truncate(read);
            raw.resize(self.block_size, 0);
        }

        let mut r = Reader::new(&raw, self.order);
        let _block_id = r.read_i32();
        let first_mfn = self.pointers_per_block() * (block_idx - 1) + 1;
        for i in 0..self.pointers_per_block() {
            let word = r.read_i32().unwrap_or(0);
            self.cache
                .insert(first_mfn + i, XrfEntry::decode(word, config, self.xl));
        }

        Ok(self.cache.get(&mfn).copied().unwrap_or_default())
    }

    /// Write one entry at its slot and flush, extending the file with fresh
    /// blocks when the MFN lies beyond the current tail.
    pub fn set(&mut self, mfn: u32, entry: XrfEntry, config: &Config) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly(self.path.display().to_string()));
        }

        let (block_idx, _, abs) = self.locate(mfn);
        while self.block_count()? < u64::from(block_idx) {
            self.append_block()?;
        }

        self.file.seek(SeekFrom::Start(abs))?;
        let mut w = Writer::with_capacity(self.order, 4);
        w.write_i32(entry.encode(config, self.xl));
        self.file.write_all(&w.into_bytes())?;
        self.flush()?;

        self.cache.insert(mfn, entry);
        Ok(())
    }

    fn block_count(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len() / self.block_size as u64)
    }

    /// Append one empty block (header slot plus zeroed pointers) and patch
    /// the previous block's header from "last" to its positive index.
    pub fn append_block(&mut self) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly(self.path.display().to_string()));
        }

        let end = self.file.seek(SeekFrom::End(0))?;
        let block_number = end / self.block_size as u64 + 1;
        debug!(block = block_number, "appending cross-reference block");

        let mut w = Writer::with_capacity(self.order, self.block_size);
        w.write_i32(-(block_number as i32));
        w.pad_to(self.block_size);
        self.file.write_all(&w.into_bytes())?;

        if block_number > 1 {
            let prev = (block_number - 2) * self.block_size as u64;
            self.file.seek(SeekFrom::Start(prev))?;
            let mut w = Writer::with_capacity(self.order, 4);
            w.write_i32(block_number as i32 - 1);
            self.file.write_all(&w.into_bytes())?;
        }
        self.flush()?;
        Ok(())
    }

    /// Flush pending writes. On read-only handles I/O errors are dropped.
    pub fn flush(&mut self) -> Result<()> {
        match self.file.flush() {
            Ok(()) => Ok(()),
            Err(err) if self.readonly => {
                warn!(path = %self.path.display(), %err, "flush on read-only file ignored");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Raw signed header of a block (1-based index), for integrity checks.
    pub fn block_header(&mut self, block_idx: u32) -> Result<i32> {
        let start = (u64::from(block_idx) - 1) * self.block_size as u64;
        self.file.seek(SeekFrom::Start(start))?;
        let mut raw = [0u8; 4];
        self.file.read_exact(&mut raw)?;
        let mut r = Reader::new(&raw, self.order);
        Ok(r.read_i32().unwrap_or(0))
    }

    pub fn blocks(&self) -> Result<u64> {
        self.block_count()
    }
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(block: i32, offset: i32, new: bool, modified: bool) -> XrfEntry {
        XrfEntry {
            block,
            offset,
            new_flag: new,
            modified_flag: modified,
        }
    }

    #[test]
    fn status_derivation() {
        assert_eq!(entry(3, 64, false, false).status(), XrfStatus::Active);
        assert_eq!(
            entry(-3, 64, false, false).status(),
            XrfStatus::LogicallyDeleted
        );
        assert_eq!(
            entry(-1, 0, false, false).status(),
            XrfStatus::PhysicallyDeleted
        );
        assert_eq!(entry(0, 0, false, false).status(), XrfStatus::Inexistent);
        assert_eq!(entry(0, 12, false, false).status(), XrfStatus::Invalid);
    }

    #[test]
    fn encode_decode_round_trip() {
        let config = Config::default();
        let cases = vec![
            entry(1, 64, true, false),
            entry(7, 500, false, true),
            entry(12, 0, false, false),
            entry(-4, 320, true, true),
            entry(-1, 0, false, false),
            entry(0, 0, false, false),
        ];
        for case in cases {
            let word = case.encode(&config, 0);
            assert_eq!(XrfEntry::decode(word, &config, 0), case, "word {word}");
        }
    }

    #[test]
    fn extra_large_round_trip() {
        let config = Config::default();
        for xl in [2u8, 3] {
            // offsets must be aligned to the widened granularity
            let case = entry(9, 256, true, false);
            let word = case.encode(&config, xl);
            assert_eq!(XrfEntry::decode(word, &config, xl), case);
        }
    }

    #[test]
    fn known_packing() {
        let config = Config::default();
        // block 1, offset 64, new: 1*2048 + 1024 + 64
        assert_eq!(entry(1, 64, true, false).encode(&config, 0), 3136);
        // logical deletion stores the negated word
        assert_eq!(entry(-1, 64, true, false).encode(&config, 0), -3136);
    }

    #[test]
    fn paged_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cds.xrf");
        let config = Config::default();
        let mut xrf = XrfFile::open(&path, &config, 0, false).unwrap();

        // beyond the tail reads as inexistent
        assert_eq!(
            xrf.entry(500, &config).unwrap().status(),
            XrfStatus::Inexistent
        );

        let mut e = XrfEntry::default();
        e.set_position(64, config.block_size, true, false);
        xrf.set(1, e, &config).unwrap();

        // an mfn in the fourth block forces appends
        xrf.set(400, e, &config).unwrap();
        assert_eq!(xrf.blocks().unwrap(), 4);

        // reopen and observe both entries
        drop(xrf);
        let mut xrf = XrfFile::open(&path, &config, 0, false).unwrap();
        assert_eq!(xrf.entry(1, &config).unwrap(), e);
        assert_eq!(xrf.entry(400, &config).unwrap(), e);
        assert_eq!(
            xrf.entry(2, &config).unwrap().status(),
            XrfStatus::Inexistent
        );
    }

    #[test]
    fn block_headers_negative_only_on_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hdr.xrf");
        let config = Config::default();
        let mut xrf = XrfFile::open(&path, &config, 0, false).unwrap();
        assert_eq!(xrf.block_header(1).unwrap(), -1);

        xrf.append_block().unwrap();
        xrf.append_block().unwrap();
        assert_eq!(xrf.block_header(1).unwrap(), 1);
        assert_eq!(xrf.block_header(2).unwrap(), 2);
        assert_eq!(xrf.block_header(3).unwrap(), -3);
    }
}
