//! Driving a compiled program over one record.

use isisdb_core::record::Record;

use crate::expression::{Context, Expression, Flow};
use crate::workarea::Workarea;
use crate::{Database, Program, Result};

/// Evaluate `program` against `record`, emitting through a fresh workarea
/// sized from the database's configured line width. `lw(n)` and
/// `newline(s)` only live for the duration of the call.
///
/// `proc(...)` may mutate the record; callers that care keep their own
/// copy. A stray `break`/`continue` outside any loop ends the run quietly,
/// discarding nothing already emitted.
pub fn format(db: &dyn Database, record: &mut Record, program: &Program) -> Result<String> {
    let mut workarea = Workarea::new(db.max_line_width());
    let mut ctx = Context::new(record, db, &mut workarea);
    let _signal: Flow = program.chain().format(&mut ctx)?;
    Ok(workarea.into_string())
}

/// Compile and evaluate in one step, without a program cache.
pub fn format_source(db: &dyn Database, record: &mut Record, source: &str) -> Result<String> {
    let program = Program::compile(source.trim())?;
    format(db, record, &program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullDatabase;

    fn record() -> Record {
        let mut record = Record::new();
        record.mfn = 12;
        record.set(24, "Methodology of plant eco-physiology");
        record.set(70, "Smith, J.^bEd.");
        record.set(90, vec!["alpha", "beta", "gamma"]);
        record
    }

    fn run(source: &str) -> String {
        let db = NullDatabase::default();
        let mut record = record();
        format_source(&db, &mut record, source).unwrap()
    }

    #[test]
    fn plain_field() {
        assert_eq!(run("v24"), "Methodology of plant eco-physiology");
    }

    #[test]
    fn missing_field_is_silent() {
        assert_eq!(run("v999"), "");
    }

    #[test]
    fn literals_compose() {
        assert_eq!(run("'a: ', v70^b"), "a: Ed.");
    }

    #[test]
    fn spacing() {
        assert_eq!(run("'a'#'b'"), "a\nb");
        assert_eq!(run("'a'/'b'"), "a\nb");
        assert_eq!(run("/'b'"), "b");
    }
}
