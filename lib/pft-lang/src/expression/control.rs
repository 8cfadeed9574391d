//! Control flow: `if/then/else/fi`, `while`, `select/case/elsecase/endsel`,
//! and the `break`/`continue` signal nodes.

use isisdb_core::record::Record;

use super::{value_of, Context, Expression, Flow, Result, Sequence};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Box<super::Expr>,
    pub on_true: Sequence,
    pub on_false: Option<Sequence>,
}

impl Expression for Branch {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let condition = value_of!(self.condition.eval(ctx)?);
        if condition.is_truthy() {
            self.on_true.eval(ctx)
        } else if let Some(arm) = &self.on_false {
            arm.eval(ctx)
        } else {
            Ok(Flow::empty())
        }
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let condition = value_of!(self.condition.eval(ctx)?);
        if condition.is_truthy() {
            self.on_true.format(ctx)
        } else if let Some(arm) = &self.on_false {
            arm.format(ctx)
        } else {
            Ok(Flow::empty())
        }
    }

    fn max_repeat(&self, record: &Record) -> usize {
        let mut max = self.condition.max_repeat(record).max(self.on_true.max_repeat(record));
        if let Some(arm) = &self.on_false {
            max = max.max(arm.max_repeat(record));
        }
        max
    }
}

/// `while <bool> ( body )`; the body shares the caller's variable scope.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoop {
    pub condition: Box<super::Expr>,
    pub body: Sequence,
}

impl Expression for WhileLoop {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let mut acc = String::new();
        loop {
            let condition = value_of!(self.condition.eval(ctx)?);
            if !condition.is_truthy() {
                break;
            }
            match self.body.eval(ctx)? {
                Flow::Done(value) => acc.push_str(&value.to_string()),
                Flow::Break(text) => {
                    acc.push_str(&text);
                    break;
                }
                Flow::Continue(text) => {
                    acc.push_str(&text);
                    continue;
                }
            }
        }
        Ok(Flow::Done(Value::Str(acc)))
    }

    fn max_repeat(&self, record: &Record) -> usize {
        self.condition.max_repeat(record)
    }
}

/// First exact match on the stringified option wins; no match falls through
/// to `elsecase`.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub selector: Box<super::Expr>,
    pub cases: Vec<(super::Expr, Sequence)>,
    pub fallback: Option<Sequence>,
}

impl Expression for Select {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let wanted = value_of!(super::eval_plain(&self.selector, ctx)?).to_string();
        for (option, body) in &self.cases {
            let option = value_of!(super::eval_plain(option, ctx)?).to_string();
            if option == wanted {
                return body.eval(ctx);
            }
        }
        match &self.fallback {
            Some(body) => body.eval(ctx),
            None => Ok(Flow::empty()),
        }
    }

    fn max_repeat(&self, record: &Record) -> usize {
        self.selector.max_repeat(record)
    }
}

/// `break`: unwind the enclosing repeatable group or while loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakNode;

impl Expression for BreakNode {
    fn eval(&self, _ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Break(String::new()))
    }
}

/// `continue`: skip to the next group occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinueNode;

impl Expression for ContinueNode {
    fn eval(&self, _ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Continue(String::new()))
    }
}
