//! The master file: variable-length records addressed through the
//! cross-reference file.
//!
//! Records are appended at the file tail; an update logically deletes the
//! old image in place and appends the new one, keeping a backward pointer
//! to the previous version. Records may cross block boundaries, but one
//! whose leader would start in the last few bytes of a block is pushed to
//! the next boundary (the classic `MSNVSPLT` split thresholds).

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use isisdb_core::config::Config;
use isisdb_core::record::{Record, RecordStatus};

use crate::codec::Writer;
use crate::control::ControlHeader;
use crate::fdt::FieldTable;
use crate::leader::{DirEntry, Leader, LEADER_SIZE};
use crate::xrf::{XrfFile, XrfStatus};
use crate::{Error, Result};

/// An open CDS/ISIS database: `<dir>/<name>.mst` plus its `.xrf`, with
/// optional `.ini` overrides and `.fdt` name table picked up from the same
/// directory.
pub struct MasterFile {
    pub name: String,
    pub path: PathBuf,
    pub base_dir: PathBuf,
    pub config: Config,
    file: File,
    readonly: bool,
    control: ControlHeader,
    xrf: XrfFile,
    fdt: Option<FieldTable>,
}

impl MasterFile {
    /// Open or create a database. A missing `.mst` is created with one
    /// zeroed block holding a fresh control header; a permission error
    /// falls back to a read-only handle.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let mut path = path.as_ref().to_owned();
        if path.extension().is_none() {
            path.set_extension("mst");
        }
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_owned();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut config = config.clone();
        let ini = base_dir.join(format!("{name}.ini"));
        if ini.exists() {
            config.load(&ini)?;
        }

        let fdt_path = base_dir.join(format!("{name}.fdt"));
        let fdt = if fdt_path.exists() {
            Some(FieldTable::load(&fdt_path)?)
        } else {
            None
        };

        let mut readonly = false;
        let mut fresh = false;
        let mut file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                warn!(path = %path.display(), "opening database read-only");
                readonly = true;
                OpenOptions::new().read(true).open(&path)?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "creating master file");
                fresh = true;
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(&path)?
            }
            Err(err) => return Err(err.into()),
        };

        let control = if fresh {
            let control = ControlHeader::default();
            let mut block = vec![0u8; config.block_size];
            let header = control.encode(config.byte_order, config.ctrl_size);
            block[..header.len()].copy_from_slice(&header);
            file.write_all(&block)?;
            control
        } else {
            file.seek(SeekFrom::Start(0))?;
            let mut raw = vec![0u8; config.ctrl_size];
            file.read_exact(&mut raw)?;
            ControlHeader::decode(&raw, config.byte_order)?
        };
        let xl_shift = control.extra_large();

        let xrf = XrfFile::open(
            &base_dir.join(format!("{name}.xrf")),
            &config,
            xl_shift,
            readonly,
        )?;

        let mut mst = Self {
            name,
            base_dir,
            config,
            file,
            readonly,
            control,
            xrf,
            fdt,
            path,
        };
        mst.flush()?;
        Ok(mst)
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn next_mfn(&self) -> u32 {
        self.control.nxtmfn
    }

    pub fn mftype(&self) -> u8 {
        self.control.mftype
    }

    pub fn fdt(&self) -> Option<&FieldTable> {
        self.fdt.as_ref()
    }

    /// Resolve a textual tag key: integer (optionally `v`-prefixed), then
    /// the FDT name table.
    pub fn resolve_tag(&self, key: &str) -> Option<u32> {
        Record::tag_from_key(key)
            .or_else(|| self.fdt.as_ref().and_then(|t| t.tag_for_name(key)))
    }

    fn leader_xl(&self) -> bool {
        self.config.leader_xl
    }

    fn dir_size(&self) -> usize {
        DirEntry::size(self.config.wide_directory)
    }

    fn write_control(&mut self) -> Result<()> {
        let raw = self
            .control
            .encode(self.config.byte_order, self.config.ctrl_size);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&raw)?;
        Ok(())
    }

    /// Byte position where the next record will be appended.
    fn tail_position(&self) -> u64 {
        ((u64::from(self.control.nxtmfb) - 1) << self.config.block_power())
            + u64::from(self.control.nxtmfp)
    }

    /// Status and byte position for an MFN, per the cross-reference file.
    fn record_position(&mut self, mfn: u32) -> Result<(XrfStatus, u64)> {
        let entry = self.xrf.entry(mfn, &self.config)?;
        match entry.status() {
            XrfStatus::Active | XrfStatus::LogicallyDeleted => {
                Ok((entry.status(), entry.position(self.config.block_power())))
            }
            XrfStatus::Inexistent | XrfStatus::PhysicallyDeleted => {
                Ok((entry.status(), self.tail_position()))
            }
            XrfStatus::Invalid => Err(Error::InvalidXrf(mfn)),
        }
    }

    /// Fetch a record. `None` for inexistent or physically deleted MFNs;
    /// logically deleted records come back with their status set.
    pub fn get(&mut self, mfn: u32) -> Result<Option<Record>> {
        let (status, pos) = self.record_position(mfn)?;
        match status {
            XrfStatus::Active | XrfStatus::LogicallyDeleted => {
                let mut record = self.read_record_at(pos, mfn)?;
                if status == XrfStatus::LogicallyDeleted {
                    record.status = RecordStatus::LogicallyDeleted;
                }
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }

    fn read_record_at(&mut self, pos: u64, mfn: u32) -> Result<Record> {
        self.file.seek(SeekFrom::Start(pos))?;
        let mut raw_leader = [0u8; LEADER_SIZE];
        self.file.read_exact(&mut raw_leader)?;
        let leader = Leader::decode(&raw_leader, self.config.byte_order, self.leader_xl(), mfn)?;

        let expected_base = LEADER_SIZE + self.dir_size() * usize::from(leader.nvf);
        if usize::from(leader.base) != expected_base || leader.base == 0 {
            return Err(Error::Corrupted {
                mfn,
                reason: format!("base {} != {}", leader.base, expected_base),
            });
        }

        let body_len = usize::from(leader.mfrl).saturating_sub(LEADER_SIZE);
        let mut body = vec![0u8; body_len];
        self.file.read_exact(&mut body)?;

        let dir_len = self.dir_size() * usize::from(leader.nvf);
        if body.len() < dir_len {
            return Err(Error::Corrupted {
                mfn,
                reason: "directory truncated".to_owned(),
            });
        }
        let (dir_bytes, data) = body.split_at(dir_len);

        let mut r = crate::codec::Reader::new(dir_bytes, self.config.byte_order);
        let mut pairs = Vec::with_capacity(usize::from(leader.nvf));
        for _ in 0..leader.nvf {
            let entry =
                DirEntry::decode(&mut r, self.config.wide_directory).ok_or(Error::Corrupted {
                    mfn,
                    reason: "directory truncated".to_owned(),
                })?;
            let end = entry.offset.saturating_add(entry.len);
            let slice = data.get(entry.offset..end).ok_or(Error::Corrupted {
                mfn,
                reason: format!("field {} outside data region", entry.tag),
            })?;
            let text = self.config.input_encoding.decode(slice)?;
            pairs.push((entry.tag, text));
        }

        let mut record = Record::from_pairs(pairs);
        record.mfn = leader.mfn;
        record.status = leader.status;
        record.mfbwb = leader.mfbwb;
        record.mfbwp = u32::from(leader.mfbwp);
        Ok(record)
    }

    /// Serialize a record and append it, updating the control header and
    /// the cross-reference entry. Assigns a fresh MFN when the record has
    /// none. With `reset_flags` the new/modified bits are cleared and no
    /// backward pointer is recorded (used by reindexing sweeps).
    pub fn save(&mut self, record: &mut Record, reset_flags: bool) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly(self.name.clone()));
        }

        if record.mfn == 0 {
            record.mfn = self.control.nxtmfn;
        }
        let mfn = record.mfn;

        let (status, old_pos) = self.record_position(mfn)?;
        let mut new_flag = false;
        let mut modified_flag = false;

        match status {
            XrfStatus::Inexistent | XrfStatus::PhysicallyDeleted => {
                new_flag = true;
                record.mfbwb = 0;
                record.mfbwp = 0;
                if mfn >= self.control.nxtmfn {
                    self.control.nxtmfn = mfn + 1;
                }
            }
            XrfStatus::Active | XrfStatus::LogicallyDeleted => {
                let xrf_entry = self.xrf.entry(mfn, &self.config)?;
                if reset_flags {
                    record.mfbwb = 0;
                    record.mfbwp = 0;
                } else if xrf_entry.new_flag {
                    new_flag = true;
                    record.mfbwb = 0;
                    record.mfbwp = 0;
                } else {
                    modified_flag = true;
                    if record.mfbwb == 0 {
                        record.mfbwb = (old_pos / self.config.block_size as u64) as u32 + 1;
                        record.mfbwp = (old_pos % self.config.block_size as u64) as u32;
                    }
                }

                if status == XrfStatus::Active {
                    self.patch_status(old_pos, RecordStatus::LogicallyDeleted)?;
                }
            }
            XrfStatus::Invalid => return Err(Error::InvalidXrf(mfn)),
        }

        // encode directory and data
        let fields: Vec<_> = record.fields().cloned().collect();
        let nvf = fields.len();
        let base = LEADER_SIZE + self.dir_size() * nvf;

        let mut dir = Writer::with_capacity(self.config.byte_order, self.dir_size() * nvf);
        let mut data = Vec::new();
        for field in &fields {
            let bytes = self.config.input_encoding.encode(&field.data)?;
            DirEntry {
                tag: field.tag,
                offset: data.len(),
                len: bytes.len(),
            }
            .encode(&mut dir, self.config.wide_directory);
            data.extend_from_slice(&bytes);
        }
        let mfrl = LEADER_SIZE + dir.len() + data.len();
        if mfrl > usize::from(u16::MAX) {
            return Err(Error::Corrupted {
                mfn,
                reason: format!("record length {mfrl} exceeds the packed width"),
            });
        }

        let leader = Leader {
            mfn,
            mfrl: mfrl as u16,
            mfbwb: record.mfbwb,
            mfbwp: record.mfbwp as u16,
            base: base as u16,
            nvf: nvf as u16,
            status: RecordStatus::Active,
        };
        let mut image = leader.encode(self.config.byte_order, self.leader_xl());
        image.extend_from_slice(&dir.into_bytes());
        image.extend_from_slice(&data);

        // records that would begin in the split window move to the next block
        let mut pos = self.tail_position();
        let threshold: u64 = if self.dir_size() == crate::leader::DIR_SIZE_WIDE {
            493
        } else {
            497
        };
        let in_block = pos % self.config.block_size as u64;
        if in_block >= threshold && in_block <= 511 {
            pos = (pos / self.config.block_size as u64 + 1) * self.config.block_size as u64;
        }

        // zero-extend by whole blocks when the record passes the tail
        let file_len = self.file.metadata()?.len();
        if pos + image.len() as u64 >= file_len {
            self.file.seek(SeekFrom::Start(file_len))?;
            self.file.write_all(&vec![0u8; self.config.block_size])?;
        }

        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(&image)?;
        debug!(mfn, pos, len = image.len(), "record written");

        let end = pos + image.len() as u64;
        self.control.nxtmfb = (end / self.config.block_size as u64) as u32 + 1;
        let offset = (end % self.config.block_size as u64) as u32;
        self.control.nxtmfp = if offset == 0 { 1 } else { offset };
        self.write_control()?;
        self.flush()?;

        let mut entry = self.xrf.entry(mfn, &self.config)?;
        entry.set_position(pos, self.config.block_size, new_flag, modified_flag);
        self.xrf.set(mfn, entry, &self.config)?;

        record.status = RecordStatus::Active;
        Ok(())
    }

    /// Overwrite the status word of the leader stored at `pos`.
    fn patch_status(&mut self, pos: u64, status: RecordStatus) -> Result<()> {
        if self.readonly {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        self.file
            .seek(SeekFrom::Start(pos + Leader::status_offset() as u64))?;
        let mut w = Writer::with_capacity(self.config.byte_order, 2);
        w.write_u16(status.as_raw());
        self.file.write_all(&w.into_bytes())?;
        Ok(())
    }

    /// Mark an active record logically deleted, in the leader and the
    /// cross-reference entry.
    pub fn delete(&mut self, mfn: u32) -> Result<()> {
        let (status, pos) = self.record_position(mfn)?;
        if status != XrfStatus::Active {
            return Err(Error::WrongStatus {
                mfn,
                status: status_name(status),
                operation: "delete",
            });
        }
        self.patch_status(pos, RecordStatus::LogicallyDeleted)?;
        self.flush()?;

        let mut entry = self.xrf.entry(mfn, &self.config)?;
        entry.mark_logically_deleted();
        self.xrf.set(mfn, entry, &self.config)
    }

    /// Bring a logically deleted record back to active.
    pub fn undelete(&mut self, mfn: u32) -> Result<()> {
        let (status, pos) = self.record_position(mfn)?;
        if status != XrfStatus::LogicallyDeleted {
            return Err(Error::WrongStatus {
                mfn,
                status: status_name(status),
                operation: "undelete",
            });
        }
        self.patch_status(pos, RecordStatus::Active)?;
        self.flush()?;

        let mut entry = self.xrf.entry(mfn, &self.config)?;
        entry.mark_active();
        self.xrf.set(mfn, entry, &self.config)
    }

    /// The version of a record prior to its last update, reached through
    /// the backward pointer. `None` when the record was never updated.
    pub fn previous(&mut self, record: &Record) -> Result<Option<Record>> {
        if record.mfbwb == 0 && record.mfbwp == 0 {
            return Ok(None);
        }
        let pos = (u64::from(record.mfbwb) - 1) * self.config.block_size as u64
            + u64::from(record.mfbwp);
        self.read_record_at(pos, record.mfn).map(Some)
    }

    /// Visit every MFN slot from 1 to `nxtmfn - 1`; slots without a
    /// readable record yield `None`.
    pub fn records(&mut self) -> impl Iterator<Item = Result<Option<Record>>> + '_ {
        let last = self.control.nxtmfn;
        (1..last).map(move |mfn| self.get(mfn))
    }

    /// Count of active records (wakes every cross-reference block).
    pub fn active_count(&mut self) -> Result<usize> {
        let mut count = 0;
        for mfn in 1..self.control.nxtmfn {
            let entry = self.xrf.entry(mfn, &self.config)?;
            if entry.status() == XrfStatus::Active {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Flush both the master file and the cross-reference file.
    pub fn flush(&mut self) -> Result<()> {
        match self.file.flush() {
            Ok(()) => {}
            Err(err) if self.readonly => {
                warn!(name = %self.name, %err, "flush on read-only master ignored");
            }
            Err(err) => return Err(err.into()),
        }
        self.xrf.flush()
    }
}

impl Drop for MasterFile {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(name = %self.name, %err, "flush on close failed");
        }
    }
}

fn status_name(status: XrfStatus) -> &'static str {
    match status {
        XrfStatus::Active => "active",
        XrfStatus::LogicallyDeleted => "logically deleted",
        XrfStatus::PhysicallyDeleted => "physically deleted",
        XrfStatus::Inexistent => "inexistent",
        XrfStatus::Invalid => "invalid",
    }
}
