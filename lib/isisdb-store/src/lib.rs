//! The CDS/ISIS record store: master file (`.mst`), cross-reference file
//! (`.xrf`), field-definition table (`.fdt`) and the inverted-file
//! contract.
//!
//! The master file holds variable-length records keyed by MFN; the
//! cross-reference file is a fixed-size block index mapping each MFN to its
//! byte position and status bits. Every packed structure goes through the
//! explicit [`codec`] layer so byte order is a per-database setting rather
//! than an accident of the host.

pub mod codec;
pub mod control;
pub mod fdt;
pub mod inverted;
pub mod leader;
pub mod master;
pub mod xrf;

pub use control::ControlHeader;
pub use fdt::FieldTable;
pub use inverted::{InvertedIndex, MemoryIndex, Posting};
pub use leader::{DirEntry, Leader};
pub use master::MasterFile;
pub use xrf::{XrfEntry, XrfFile, XrfStatus};

/// Errors shared by the storage layer.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] isisdb_core::config::ConfigError),

    #[error(transparent)]
    Encoding(#[from] isisdb_core::encoding::Error),

    #[error("database {0} is open read-only")]
    ReadOnly(String),

    #[error("corrupted record mfn {mfn}: {reason}")]
    Corrupted { mfn: u32, reason: String },

    #[error("invalid cross-reference entry for mfn {0}")]
    InvalidXrf(u32),

    #[error("record mfn {mfn} is {status}, cannot {operation}")]
    WrongStatus {
        mfn: u32,
        status: &'static str,
        operation: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
