//! Spacing commands: `#`, `/`, `%`, `Xn`, `Cn`.

use super::{Context, Expression, Flow, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacerKind {
    /// `#`: unconditional line break.
    Newline,
    /// `/`: break only when the current line holds text.
    ConditionalNewline,
    /// `%`: squeeze runs of blank lines.
    SqueezeBlank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spacer {
    pub kind: SpacerKind,
}

impl Expression for Spacer {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        // when evaluated for its text (inside conditions or arguments) a
        // spacer contributes a separator at most
        let text = match self.kind {
            SpacerKind::Newline => ctx.workarea.linesep.clone(),
            SpacerKind::ConditionalNewline if !ctx.workarea.last_line().is_empty() => {
                ctx.workarea.linesep.clone()
            }
            _ => String::new(),
        };
        Ok(Flow::Done(Value::Str(text)))
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        // a spacer right after a field that produced nothing is dropped
        if ctx.last_field_present == Some(false) {
            return Ok(Flow::empty());
        }
        match self.kind {
            SpacerKind::Newline => ctx.workarea.newline(),
            SpacerKind::ConditionalNewline => ctx.workarea.conditional_newline(),
            SpacerKind::SqueezeBlank => ctx.workarea.squeeze_blank_lines(),
        }
        Ok(Flow::empty())
    }
}

/// `Xn`: n spaces, unless they would overflow the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XSpacer {
    pub count: usize,
}

impl Expression for XSpacer {
    fn eval(&self, _ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Done(Value::Str(" ".repeat(self.count))))
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        ctx.workarea.spaces(self.count);
        Ok(Flow::empty())
    }
}

/// `Cn`: tabulate to column n.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CSpacer {
    pub column: usize,
}

impl Expression for CSpacer {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        self.format(ctx)
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        ctx.workarea.tab_to(self.column);
        Ok(Flow::empty())
    }
}
