//! Compile-once, evaluate-many formatting sessions.
//!
//! A session expands `@file` includes to a fixpoint, memoizes compiled
//! programs keyed by the fully-expanded source, and evaluates them over
//! records. Line width and separator overrides made by a format (`lw(n)`,
//! `newline(s)`) never outlive one call: each evaluation gets a fresh
//! workarea seeded from the database configuration.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use isisdb_core::record::Record;
use pft_lang::{runtime, Database, Program};

use crate::{DatabaseContext, Error, Result};

static INCLUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[\w./]+").expect("static pattern"));

#[derive(Default)]
pub struct Session {
    programs: HashMap<String, Rc<Program>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format a record with the given expression.
    pub fn format(
        &mut self,
        db: &dyn Database,
        record: &mut Record,
        expr: &str,
    ) -> Result<String> {
        let expr = expand_includes(expr.trim(), db.base_dir())?;
        let program = self.compiled(&expr)?;
        Ok(runtime::format(db, record, &program)?)
    }

    /// Format and encode with the database's output encoding.
    pub fn format_encoded(
        &mut self,
        db: &DatabaseContext,
        record: &mut Record,
        expr: &str,
    ) -> Result<Vec<u8>> {
        let text = self.format(db, record, expr)?;
        Ok(db.config().output_encoding.encode(&text)?)
    }

    fn compiled(&mut self, expr: &str) -> Result<Rc<Program>> {
        if let Some(program) = self.programs.get(expr) {
            return Ok(program.clone());
        }
        debug!(expr, "compiling format");
        let program = Rc::new(Program::compile(expr)?);
        self.programs
            .insert(expr.to_owned(), program.clone());
        Ok(program)
    }

    pub fn cached_programs(&self) -> usize {
        self.programs.len()
    }
}

/// Replace every `@file` directive with the file's contents, repeatedly, so
/// included formats may include further files. Paths resolve as given or
/// relative to the database directory.
fn expand_includes(expr: &str, base_dir: &Path) -> Result<String> {
    const MAX_DEPTH: usize = 32;

    let mut expr = expr.to_owned();
    for _ in 0..MAX_DEPTH {
        let Some(found) = INCLUDE.find(&expr) else {
            return Ok(expr);
        };
        let name = &found.as_str()[1..];
        let direct = Path::new(name);
        let path = if direct.exists() {
            direct.to_owned()
        } else {
            let relative = base_dir.join(name);
            if !relative.exists() {
                return Err(Error::IncludeNotFound(relative));
            }
            relative
        };
        let content = std::fs::read_to_string(&path).map_err(|source| Error::IncludeRead {
            path: path.clone(),
            source,
        })?;
        expr.replace_range(found.range(), content.trim());
    }
    Err(Error::IncludeLoop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pft_lang::NullDatabase;

    #[test]
    fn caches_compiled_programs() {
        let mut session = Session::new();
        let db = NullDatabase::default();
        let mut record = Record::new();
        record.set(24, "title");

        assert_eq!(session.format(&db, &mut record, "v24").unwrap(), "title");
        assert_eq!(session.format(&db, &mut record, " v24 ").unwrap(), "title");
        assert_eq!(session.cached_programs(), 1);
    }

    #[test]
    fn expands_includes_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("inner.pft"), "'deep'").unwrap();
        std::fs::write(dir.path().join("outer.pft"), "@inner.pft, '-out'").unwrap();

        let db = NullDatabase {
            base_dir: dir.path().to_owned(),
            ..NullDatabase::default()
        };
        let mut session = Session::new();
        let mut record = Record::new();
        assert_eq!(
            session.format(&db, &mut record, "@outer.pft").unwrap(),
            "deep-out"
        );
    }

    #[test]
    fn missing_include_is_an_error() {
        let mut session = Session::new();
        let db = NullDatabase::default();
        let mut record = Record::new();
        assert!(matches!(
            session.format(&db, &mut record, "@nope.pft"),
            Err(Error::IncludeNotFound(_))
        ));
    }

    #[test]
    fn line_width_restored_between_calls() {
        let mut session = Session::new();
        let db = NullDatabase::default();
        let mut record = Record::new();
        record.set(24, "a text that is longer than ten characters");

        let narrow = session.format(&db, &mut record, "lw(10), v24").unwrap();
        assert!(narrow.lines().count() > 1);
        let wide = session.format(&db, &mut record, "v24").unwrap();
        assert_eq!(wide.lines().count(), 1);
    }
}
