//! Reader, writer and formatter for CDS/ISIS bibliographic databases.
//!
//! A database is a master file of variable-length records (`.mst`) indexed
//! by a cross-reference file (`.xrf`), optionally described by a field
//! table (`.fdt`) and searched through an inverted file. Records are
//! projected to text with the PFT formatting language.
//!
//! ```no_run
//! use isisdb::{Collection, Config, Record, Session};
//!
//! let collection = Collection::open("library", &["./data"], Config::default()).unwrap();
//! let ctx = collection.context("cds").unwrap();
//! let mut session = Session::new();
//!
//! let mut record = Record::new();
//! record.set(24, "Methodology of plant eco-physiology");
//! let text = session.format(&ctx, &mut record, "mfn(4), ' - ', v24").unwrap();
//! println!("{text}");
//! ```

mod collection;
mod session;

pub use collection::{Collection, DatabaseContext};
pub use session::Session;

pub use isisdb_core::{ByteOrder, Config, Field, FieldContainer, FieldEntry, Record, RecordStatus};
pub use isisdb_store::{FieldTable, InvertedIndex, MasterFile, MemoryIndex, Posting};
pub use pft_lang::{Database, DatabaseError, NullDatabase, Program};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] pft_lang::Error),

    #[error(transparent)]
    Store(#[from] isisdb_store::Error),

    #[error(transparent)]
    Encoding(#[from] isisdb_core::encoding::Error),

    #[error("include file {0} not found")]
    IncludeNotFound(std::path::PathBuf),

    #[error("include expansion did not terminate")]
    IncludeLoop,

    #[error("cannot read include file {path}")]
    IncludeRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
