//! The CDS/ISIS formatting language (PFT): lexer, parser, and evaluator.
//!
//! A format is compiled once into a [`Program`] and evaluated many times,
//! each run against one record. Evaluation emits text fragments into a
//! [`workarea::Workarea`] under the language's line-break discipline.
//!
//! The evaluator reaches databases only through the [`Database`] trait:
//! same- and cross-database record loads for `ref()`, inverted-file lookups
//! for `l()` and `npost()`, and gizmo tables for `proc()`. The storage
//! crate provides the real implementation; [`NullDatabase`] serves
//! record-only formatting.

pub mod expression;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod runtime;
pub mod value;
pub mod workarea;

use std::path::{Path, PathBuf};

pub use expression::{Context, Expr, Expression, Flow};
pub use program::Program;
pub use value::Value;

use isisdb_core::record::Record;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("lex error: {0}")]
    Lex(#[from] lexer::Error),

    #[error("parse error: {0}")]
    Parse(#[from] parser::Error),

    #[error("evaluation error: {0}")]
    Eval(#[from] expression::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DatabaseError {
    #[error("database {0} does not exist")]
    UnknownDatabase(String),

    #[error("{0}")]
    Storage(String),
}

/// What the evaluator needs from the hosting database layer.
///
/// `db: None` means the database the record under evaluation belongs to;
/// `Some(name)` a cross-database reference (`collection.database` names are
/// allowed). Implementations are expected to memoize `record` lookups per
/// `(database, mfn)` pair for the lifetime of a session.
pub trait Database {
    /// Database name, as printed by `mstname`.
    fn name(&self) -> &str;

    /// Directory the database lives in; `cat()` paths resolve against it.
    fn base_dir(&self) -> &Path;

    fn max_line_width(&self) -> usize;

    fn subfield_delimiter(&self) -> char;

    /// Load a record, from this or a named database.
    fn record(&self, db: Option<&str>, mfn: u32) -> std::result::Result<Option<Record>, DatabaseError>;

    /// MFN of the first posting of a key in the inverted file, 0 when the
    /// key is absent.
    fn first_posting_mfn(&self, db: Option<&str>, key: &str)
        -> std::result::Result<u32, DatabaseError>;

    /// Posting count of a key, 0 when absent.
    fn posting_count(&self, db: Option<&str>, key: &str)
        -> std::result::Result<usize, DatabaseError>;

    /// Search/replace pairs of an auxiliary gizmo database: each record's
    /// field 1 is the text to find, field 2 the replacement.
    fn gizmo(&self, name: &str) -> std::result::Result<Vec<(String, String)>, DatabaseError>;
}

/// A database handle carrying only configuration, for formatting records
/// that belong to no open database.
#[derive(Debug, Clone)]
pub struct NullDatabase {
    pub max_line_width: usize,
    pub subfield_delimiter: char,
    pub base_dir: PathBuf,
}

impl Default for NullDatabase {
    fn default() -> Self {
        Self {
            max_line_width: 79,
            subfield_delimiter: '^',
            base_dir: PathBuf::from("."),
        }
    }
}

impl Database for NullDatabase {
    fn name(&self) -> &str {
        ""
    }

    fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn max_line_width(&self) -> usize {
        self.max_line_width
    }

    fn subfield_delimiter(&self) -> char {
        self.subfield_delimiter
    }

    fn record(&self, db: Option<&str>, _mfn: u32) -> std::result::Result<Option<Record>, DatabaseError> {
        match db {
            None => Ok(None),
            Some(name) => Err(DatabaseError::UnknownDatabase(name.to_owned())),
        }
    }

    fn first_posting_mfn(
        &self,
        db: Option<&str>,
        _key: &str,
    ) -> std::result::Result<u32, DatabaseError> {
        match db {
            None => Ok(0),
            Some(name) => Err(DatabaseError::UnknownDatabase(name.to_owned())),
        }
    }

    fn posting_count(
        &self,
        db: Option<&str>,
        _key: &str,
    ) -> std::result::Result<usize, DatabaseError> {
        match db {
            None => Ok(0),
            Some(name) => Err(DatabaseError::UnknownDatabase(name.to_owned())),
        }
    }

    fn gizmo(&self, name: &str) -> std::result::Result<Vec<(String, String)>, DatabaseError> {
        Err(DatabaseError::UnknownDatabase(name.to_owned()))
    }
}
