//! The AST: a tagged variant per node kind, each with an `eval` producing a
//! value (or a control signal) and a `format` that emits into the workarea.
//!
//! `break` and `continue` travel as [`Flow`] variants, never as errors;
//! repeatable groups and while loops consume them, everything else passes
//! them upward. A node's `format` defaults to evaluating and emitting the
//! result under the line-break discipline.

use std::collections::HashMap;

use isisdb_core::record::Record;

use crate::value::Value;
use crate::workarea::Workarea;
use crate::{Database, DatabaseError};

pub mod control;
pub mod field;
pub mod func;
pub mod group;
pub mod literal;
pub mod ops;
pub mod proc;
pub mod refs;
pub mod spacer;
pub mod vars;

pub use control::{Branch, BreakNode, ContinueNode, Select, WhileLoop};
pub use field::{BoolFunc, FieldExpr, FieldKind, FieldSelector, Nocc, OccBound, RepeatLit};
pub use func::{
    Aggregate, AggregateKind, Cat, Date, DateKind, Datex, FFunc, Instr, Left, LineWidth, Mid,
    Newline, NumberLit, Replace, Right, SFunc, Seconds, SizeOf, TypeOf, Val,
};
pub use group::RepeatableGroup;
pub use literal::{CondLiteral, IncondLiteral};
pub use ops::{BinOp, Minus, Not, Operator};
pub use proc::Proc;
pub use refs::{DbRef, Npost, Ref, Search};
pub use spacer::{CSpacer, Spacer, SpacerKind, XSpacer};
pub use vars::{Attr, Iocc, Mfn, ModeSet, MstName, Variable};

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("unknown variable {0}")]
    UnknownVariable(String),

    #[error("{0:?} is not numeric")]
    NonNumeric(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid date text {0:?}")]
    InvalidDate(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Output mode: proof, heading or data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Proof,
    Heading,
    Data,
}

/// The result of evaluating one node: a value, or a control signal carrying
/// the text accumulated before the signal fired.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Done(Value),
    Break(String),
    Continue(String),
}

impl Flow {
    pub fn empty() -> Self {
        Flow::Done(Value::empty())
    }
}

/// Extract a value, passing signals through to the caller.
macro_rules! value_of {
    ($flow:expr) => {
        match $flow {
            $crate::expression::Flow::Done(value) => value,
            signal => return Ok(signal),
        }
    };
}
pub(crate) use value_of;

/// Per-call evaluation state, threaded through the whole tree.
pub struct Context<'a> {
    pub record: &'a mut Record,
    pub db: &'a dyn Database,
    pub workarea: &'a mut Workarea,
    pub mode: Mode,
    pub upper: bool,
    pub vars: HashMap<String, Value>,
    /// Current occurrence inside a repeatable group, 0 outside.
    pub occ: usize,
    /// Evaluate literals and fields verbatim (function arguments, `proc`).
    pub plain: bool,
    /// Whether the immediately preceding node was a field, and whether it
    /// produced text. Spacers after an empty field are suppressed.
    pub last_field_present: Option<bool>,
}

impl<'a> Context<'a> {
    pub fn new(record: &'a mut Record, db: &'a dyn Database, workarea: &'a mut Workarea) -> Self {
        Self {
            record,
            db,
            workarea,
            mode: Mode::Proof,
            upper: false,
            vars: HashMap::new(),
            occ: 0,
            plain: false,
            last_field_present: None,
        }
    }

    pub fn fold_case(&self, text: String) -> String {
        if self.upper {
            text.to_uppercase()
        } else {
            text
        }
    }
}

pub trait Expression {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow>;

    /// Emit into the workarea. The default evaluates and pushes the text
    /// under the width discipline; nodes with their own emission rules
    /// (fields, spacers, mfn) override it.
    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        match self.eval(ctx)? {
            Flow::Done(value) => {
                let text = value.to_string();
                if !text.is_empty() {
                    let text = ctx.fold_case(text);
                    ctx.workarea.emit(&text);
                }
                Ok(Flow::empty())
            }
            signal => Ok(signal),
        }
    }

    /// How many times a repeatable group containing this node iterates.
    fn max_repeat(&self, _record: &Record) -> usize {
        1
    }
}

macro_rules! expression_dispatch {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        /// The list of implemented node kinds, dispatched as a plain enum
        /// instead of trait objects.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Expr {
            $($variant($ty)),+
        }

        impl Expression for Expr {
            fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
                match self {
                    $(Expr::$variant(node) => node.eval(ctx)),+
                }
            }

            fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
                match self {
                    $(Expr::$variant(node) => node.format(ctx)),+
                }
            }

            fn max_repeat(&self, record: &Record) -> usize {
                match self {
                    $(Expr::$variant(node) => node.max_repeat(record)),+
                }
            }
        }

        $(
            impl From<$ty> for Expr {
                fn from(node: $ty) -> Self {
                    Expr::$variant(node)
                }
            }
        )+
    };
}

expression_dispatch![
    Sequence(Sequence),
    Field(FieldExpr),
    CondLiteral(CondLiteral),
    IncondLiteral(IncondLiteral),
    Number(NumberLit),
    Spacer(Spacer),
    XSpacer(XSpacer),
    CSpacer(CSpacer),
    Group(RepeatableGroup),
    Branch(Branch),
    While(WhileLoop),
    Select(Select),
    BreakNode(BreakNode),
    ContinueNode(ContinueNode),
    BinOp(BinOp),
    Not(Not),
    Minus(Minus),
    BoolFunc(BoolFunc),
    Nocc(Nocc),
    Iocc(Iocc),
    Mfn(Mfn),
    MstName(MstName),
    ModeSet(ModeSet),
    Variable(Variable),
    Attr(Attr),
    Mid(Mid),
    Left(Left),
    Right(Right),
    Replace(Replace),
    SFunc(SFunc),
    TypeOf(TypeOf),
    SizeOf(SizeOf),
    Val(Val),
    Aggregate(Aggregate),
    FFunc(FFunc),
    Instr(Instr),
    Date(Date),
    Datex(Datex),
    Seconds(Seconds),
    Cat(Cat),
    Newline(Newline),
    LineWidth(LineWidth),
    Ref(Ref),
    Search(Search),
    Npost(Npost),
    Proc(Proc),
];

/// A flat run of nodes: the compiled chain itself, group bodies, branch
/// arms and function argument lists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence(pub Vec<Expr>);

impl Sequence {
    pub fn new(nodes: Vec<Expr>) -> Self {
        Self(nodes)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Format every child into the live workarea, tracking field presence
    /// for spacer gating. Signals interrupt the run and carry upward.
    fn format_children(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        for child in &self.0 {
            let flow = child.format(ctx)?;
            if !matches!(child, Expr::Field(_)) {
                ctx.last_field_present = None;
            }
            match flow {
                Flow::Done(_) => {}
                signal => return Ok(signal),
            }
        }
        Ok(Flow::empty())
    }
}

impl Expression for Sequence {
    /// Evaluate by formatting into a scratch region and carving the text
    /// back out, so nested emission still sees the real last line. In data
    /// mode the carved text gains the closing punctuation.
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        if ctx.plain {
            // verbatim evaluation: concatenate child values, no workarea
            let mut acc = String::new();
            for child in &self.0 {
                match child.eval(ctx)? {
                    Flow::Done(value) => acc.push_str(&ctx.fold_case(value.to_string())),
                    Flow::Break(s) => return Ok(Flow::Break(format!("{acc}{s}"))),
                    Flow::Continue(s) => return Ok(Flow::Continue(format!("{acc}{s}"))),
                }
            }
            return Ok(Flow::Done(Value::Str(acc)));
        }

        let mark = ctx.workarea.mark();
        let flow = self.format_children(ctx)?;
        let mut text = ctx.workarea.take_from(mark);
        match flow {
            Flow::Done(_) => {}
            Flow::Break(s) => return Ok(Flow::Break(format!("{text}{s}"))),
            Flow::Continue(s) => return Ok(Flow::Continue(format!("{text}{s}"))),
        }
        if ctx.mode == Mode::Data && !text.is_empty() && text != ctx.workarea.linesep {
            text = close_data_mode(&text, &ctx.workarea.linesep);
        }
        Ok(Flow::Done(Value::Str(text)))
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        self.format_children(ctx)
    }

    fn max_repeat(&self, record: &Record) -> usize {
        self.0
            .iter()
            .map(|node| node.max_repeat(record))
            .max()
            .unwrap_or(1)
    }
}

/// Evaluate a node verbatim: literals and fields skip the width logic, as
/// when they feed function arguments or search keys.
pub(crate) fn eval_plain(expr: &Expr, ctx: &mut Context<'_>) -> Result<Flow> {
    let was = ctx.plain;
    ctx.plain = true;
    let result = expr.eval(ctx);
    ctx.plain = was;
    result
}

/// Data-mode closing: a final `.` unless the text already ends in
/// punctuation, then two spaces. Applies to any non-empty text, however
/// short.
pub(crate) fn close_data_mode(text: &str, linesep: &str) -> String {
    let (body, sep) = match text.strip_suffix(linesep) {
        Some(body) => (body, linesep),
        None => (text, ""),
    };
    let trimmed = body.trim_end();
    if !trimmed.is_empty() && !trimmed.ends_with(['.', ',', ';']) {
        format!("{body}.  {sep}")
    } else {
        format!("{body}  {sep}")
    }
}
