//! Repeatable groups: `( ... )` iterates its body once per occurrence of
//! the widest repeatable field inside it.

use isisdb_core::record::Record;

use super::{Context, Expr, Expression, Flow, Result, Sequence};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct RepeatableGroup {
    pub body: Sequence,
}

impl RepeatableGroup {
    fn contains_continue(&self) -> bool {
        self.body
            .iter()
            .any(|node| matches!(node, Expr::ContinueNode(_)))
    }
}

impl Expression for RepeatableGroup {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let mark = ctx.workarea.mark();
        self.format(ctx)?;
        Ok(Flow::Done(Value::Str(ctx.workarea.take_from(mark))))
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let occs = self.body.max_repeat(ctx.record);
        // a `continue` in the body iterates one slot past the data, so a
        // trailing index can still render
        let limit = if self.contains_continue() {
            occs + 1
        } else {
            occs
        };

        let outer_occ = ctx.occ;
        'outer: for occ in 1..=limit {
            ctx.occ = occ;
            for child in self.body.iter() {
                let flow = child.format(ctx)?;
                if !matches!(child, Expr::Field(_)) {
                    ctx.last_field_present = None;
                }
                match flow {
                    Flow::Done(_) => {}
                    Flow::Break(text) => {
                        if !text.is_empty() {
                            ctx.workarea.emit(&text);
                        }
                        break 'outer;
                    }
                    Flow::Continue(text) => {
                        if !text.is_empty() {
                            ctx.workarea.emit(&text);
                        }
                        continue 'outer;
                    }
                }
            }
        }
        ctx.occ = outer_occ;
        Ok(Flow::empty())
    }

    fn max_repeat(&self, _record: &Record) -> usize {
        // nested repeatable groups are rejected at parse time; a group
        // inside anything repeatable counts once
        1
    }
}
