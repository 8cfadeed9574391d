//! Conditional (`"..."`) and inconditional (`'...'`) literals. Repeatable
//! literals never reach the chain: the parser folds them into their field.

use super::field::{FieldKind, FieldSelector};
use super::{Context, Expression, Flow, Result};
use crate::value::Value;

/// A conditional literal bound forward to a field: it emits only when the
/// field resolves to text (for `v`/`d`) or when the `n`-dummy's selection
/// is empty. A literal the parser could not bind never emits.
#[derive(Debug, Clone, PartialEq)]
pub struct CondLiteral {
    pub text: String,
    pub field: Option<FieldSelector>,
}

impl CondLiteral {
    fn active(&self, ctx: &mut Context<'_>) -> Result<bool> {
        let Some(sel) = &self.field else {
            return Ok(false);
        };
        let present = sel.is_present(ctx)?;
        Ok(match sel.kind {
            FieldKind::Data | FieldKind::DummyPresent => present,
            FieldKind::DummyAbsent => !present,
        })
    }
}

impl Expression for CondLiteral {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        if self.active(ctx)? {
            Ok(Flow::Done(Value::Str(ctx.fold_case(self.text.clone()))))
        } else {
            Ok(Flow::empty())
        }
    }
}

/// An inconditional literal: always emitted, case-folded, and subject to
/// the width discipline unless it is feeding a function argument.
#[derive(Debug, Clone, PartialEq)]
pub struct IncondLiteral {
    pub text: String,
}

impl Expression for IncondLiteral {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Done(Value::Str(ctx.fold_case(self.text.clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workarea::Workarea;
    use crate::NullDatabase;
    use isisdb_core::record::Record;

    #[test]
    fn conditional_follows_field_presence() {
        let mut record = Record::new();
        record.set(10, "value");
        let db = NullDatabase::default();
        let mut wa = Workarea::new(79);
        let mut ctx = Context::new(&mut record, &db, &mut wa);

        let bound = CondLiteral {
            text: "[".to_owned(),
            field: Some(FieldSelector::new(FieldKind::Data, 10)),
        };
        assert_eq!(bound.eval(&mut ctx).unwrap(), Flow::Done(Value::from("[")));

        let absent = CondLiteral {
            text: "[".to_owned(),
            field: Some(FieldSelector::new(FieldKind::Data, 99)),
        };
        assert_eq!(absent.eval(&mut ctx).unwrap(), Flow::empty());

        let dummy_absent = CondLiteral {
            text: "none".to_owned(),
            field: Some(FieldSelector::new(FieldKind::DummyAbsent, 99)),
        };
        assert_eq!(
            dummy_absent.eval(&mut ctx).unwrap(),
            Flow::Done(Value::from("none"))
        );

        let dangling = CondLiteral {
            text: "x".to_owned(),
            field: None,
        };
        assert_eq!(dangling.eval(&mut ctx).unwrap(), Flow::empty());
    }

    #[test]
    fn inconditional_case_folds() {
        let mut record = Record::new();
        let db = NullDatabase::default();
        let mut wa = Workarea::new(79);
        let mut ctx = Context::new(&mut record, &db, &mut wa);
        ctx.upper = true;
        let lit = IncondLiteral {
            text: "abc".to_owned(),
        };
        assert_eq!(lit.eval(&mut ctx).unwrap(), Flow::Done(Value::from("ABC")));
    }
}
