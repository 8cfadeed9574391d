//! Core data model for CDS/ISIS databases: typed configuration, text
//! encodings, fields with subfields, and in-memory records.
//!
//! Binary file handling lives in `isisdb-store`; the formatting language in
//! `pft-lang`. Both build on the types defined here.

pub mod config;
pub mod encoding;
pub mod field;
pub mod record;

pub use config::{ByteOrder, Config};
pub use encoding::TextEncoding;
pub use field::{Field, FieldContainer};
pub use record::{FieldEntry, FieldInput, Record, RecordStatus};
