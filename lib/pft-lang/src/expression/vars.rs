//! Variables, assignment, modes and record metadata.

use super::{value_of, Context, Expression, Flow, Mode, Result};
use crate::value::Value;

/// `S<N>` (string) and `E<N>` (numeric) variables. A string read folds with
/// the current case; a numeric read forces an integer. Unset variables read
/// as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
}

impl Variable {
    pub fn is_numeric(&self) -> bool {
        self.name.starts_with(['e', 'E'])
    }

    pub fn key(&self) -> String {
        self.name.to_uppercase()
    }
}

impl Expression for Variable {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let Some(value) = ctx.vars.get(&self.key()).cloned() else {
            return Ok(Flow::empty());
        };
        let value = if self.is_numeric() {
            Value::Int(value.as_int()?)
        } else {
            Value::Str(ctx.fold_case(value.to_string()))
        };
        Ok(Flow::Done(value))
    }
}

/// `s1 := <expr>`: evaluate and store; emits nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub var: Variable,
    pub value: Box<super::Expr>,
}

impl Expression for Attr {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let value = value_of!(super::eval_plain(&self.value, ctx)?);
        ctx.vars.insert(self.var.key(), value.clone());
        Ok(Flow::Done(value))
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        match self.eval(ctx)? {
            Flow::Done(_) => Ok(Flow::empty()),
            signal => Ok(signal),
        }
    }
}

/// `mpu`/`mpl`/`mhu`/`mhl`/`mdu`/`mdl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSet {
    pub mode: Mode,
    pub upper: bool,
}

impl Expression for ModeSet {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        ctx.mode = self.mode;
        ctx.upper = self.upper;
        Ok(Flow::empty())
    }
}

/// `mfn` / `mfn(w)`: the record number zero-padded to `w` digits (6 when
/// unspecified).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mfn {
    pub width: usize,
    /// `mfn/` form: a line break follows the number.
    pub newline: bool,
}

impl Expression for Mfn {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Done(Value::Int(i64::from(ctx.record.mfn))))
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = format!("{:0width$}", ctx.record.mfn, width = self.width);
        ctx.workarea.emit(&text);
        if self.newline {
            ctx.workarea.newline();
        }
        Ok(Flow::empty())
    }
}

/// `mstname`: the current database name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MstName;

impl Expression for MstName {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let name = ctx.fold_case(ctx.db.name().to_owned());
        Ok(Flow::Done(Value::Str(name)))
    }
}

/// `iocc`: the current occurrence inside a repeatable group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iocc;

impl Expression for Iocc {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Done(Value::Int(ctx.occ as i64)))
    }
}
