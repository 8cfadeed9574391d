//! The function library: substrings, sizes and types, numeric extraction
//! and aggregation, dates, files and output control.

use chrono::{Local, TimeZone};

use super::{eval_plain, value_of, Context, Error, Expr, Expression, Flow, Result, Sequence};
use crate::value::Value;

/// The ISISAC.TAB alphabet: characters `type()` accepts as alphabetic.
const ISISAC_TAB: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
    'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '\u{80}',
    '\u{81}', '\u{82}', '\u{83}', '\u{84}', '\u{85}', '\u{86}', '\u{87}', '\u{88}', '\u{89}',
    '\u{8a}', '\u{8b}', '\u{8c}', '\u{8d}', '\u{8e}', '\u{8f}', '\u{90}', '\u{91}', '\u{92}',
    '\u{93}', '\u{94}', '\u{95}', '\u{96}', '\u{97}', '\u{98}', '\u{99}', '\u{9a}', '\u{a0}',
    '\u{a1}', '\u{a2}', '\u{a3}', '\u{a4}', '\u{a5}', ' ',
];

fn plain_text(expr: &Expr, ctx: &mut Context<'_>) -> Result<Flow> {
    eval_plain(expr, ctx)
}

/// A numeric literal from the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberLit {
    pub value: Value,
}

impl Expression for NumberLit {
    fn eval(&self, _ctx: &mut Context<'_>) -> Result<Flow> {
        Ok(Flow::Done(self.value.clone()))
    }
}

/// `mid(s, start, len)`: 1-based substring; a start below 1 coerces to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Mid {
    pub text: Box<Expr>,
    pub start: Box<Expr>,
    pub len: Box<Expr>,
}

impl Expression for Mid {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = value_of!(plain_text(&self.text, ctx)?).to_string();
        let start = value_of!(self.start.eval(ctx)?).as_int()?.max(1) as usize;
        let len = value_of!(self.len.eval(ctx)?).as_int()?.max(0) as usize;
        let result: String = text.chars().skip(start - 1).take(len).collect();
        Ok(Flow::Done(Value::Str(result)))
    }
}

/// `left(s, n)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Left {
    pub text: Box<Expr>,
    pub len: Box<Expr>,
}

impl Expression for Left {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = value_of!(plain_text(&self.text, ctx)?).to_string();
        let len = value_of!(self.len.eval(ctx)?).as_int()?.max(0) as usize;
        Ok(Flow::Done(Value::Str(text.chars().take(len).collect())))
    }
}

/// `right(s, n)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Right {
    pub text: Box<Expr>,
    pub len: Box<Expr>,
}

impl Expression for Right {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = value_of!(plain_text(&self.text, ctx)?).to_string();
        let len = value_of!(self.len.eval(ctx)?).as_int()?.max(0) as usize;
        let total = text.chars().count();
        let skip = total.saturating_sub(len);
        Ok(Flow::Done(Value::Str(text.chars().skip(skip).collect())))
    }
}

/// `replace(s, from, to)`; an empty search text leaves the string alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Replace {
    pub text: Box<Expr>,
    pub from: Box<Expr>,
    pub to: Box<Expr>,
}

impl Expression for Replace {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = value_of!(plain_text(&self.text, ctx)?).to_string();
        // the search pattern is matched verbatim, untouched by mode case
        let upper = std::mem::replace(&mut ctx.upper, false);
        let from = value_of!(plain_text(&self.from, ctx)?).to_string();
        let to = value_of!(plain_text(&self.to, ctx)?).to_string();
        ctx.upper = upper;

        if from.is_empty() {
            return Ok(Flow::Done(Value::Str(text)));
        }
        Ok(Flow::Done(Value::Str(text.replace(&from, &to))))
    }
}

/// `s(...)`: concatenation of its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SFunc {
    pub args: Sequence,
}

impl Expression for SFunc {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        eval_plain(&Expr::Sequence(self.args.clone()), ctx)
    }
}

/// `type(s)`: `N` for integers, `A` for the ISIS alphabet, `X` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeOf {
    pub arg: Box<Expr>,
}

impl Expression for TypeOf {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = value_of!(plain_text(&self.arg, ctx)?).to_string();
        let kind = if text.trim().parse::<i64>().is_ok() {
            "N"
        } else if text.chars().all(|c| ISISAC_TAB.contains(&c)) {
            "A"
        } else {
            "X"
        };
        Ok(Flow::Done(Value::from(kind)))
    }
}

/// `size(...)`: summed display length of its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeOf {
    pub args: Sequence,
}

impl Expression for SizeOf {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let mut total = 0usize;
        for node in self.args.iter() {
            let value = value_of!(eval_plain(node, ctx)?);
            total += value.to_string().chars().count();
        }
        Ok(Flow::Done(Value::Int(total as i64)))
    }
}

/// `val(s)`: the first numeric token, 0 when none.
#[derive(Debug, Clone, PartialEq)]
pub struct Val {
    pub arg: Box<Expr>,
}

impl Expression for Val {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = value_of!(plain_text(&self.arg, ctx)?).to_string();
        let number = Value::scan_number(&text);
        if number.fract() == 0.0 {
            Ok(Flow::Done(Value::Int(number as i64)))
        } else {
            Ok(Flow::Done(Value::Float(number)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Sum,
    Max,
    Min,
    Avg,
}

/// `rsum`/`rmax`/`rmin`/`ravr`: aggregate every numeric leaf of the
/// argument format. Booleans and spacers contribute nothing; text nodes
/// contribute every number found in their output.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub args: Sequence,
}

impl Aggregate {
    fn collect(&self, node: &Expr, ctx: &mut Context<'_>, into: &mut Vec<f64>) -> Result<()> {
        match node {
            Expr::Sequence(seq) => {
                for child in seq.iter() {
                    self.collect(child, ctx, into)?;
                }
            }
            Expr::BoolFunc(_) | Expr::Spacer(_) | Expr::XSpacer(_) | Expr::CSpacer(_) => {}
            Expr::Number(_)
            | Expr::BinOp(_)
            | Expr::Minus(_)
            | Expr::Val(_)
            | Expr::SizeOf(_)
            | Expr::Nocc(_)
            | Expr::Iocc(_)
            | Expr::Instr(_)
            | Expr::Seconds(_)
            | Expr::Aggregate(_) => {
                if let Flow::Done(value) = node.eval(ctx)? {
                    into.push(value.as_number()?);
                }
            }
            other => {
                if let Flow::Done(value) = eval_plain(other, ctx)? {
                    into.extend(Value::scan_numbers(&value.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl Expression for Aggregate {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let mut values = Vec::new();
        for node in self.args.iter() {
            self.collect(node, ctx, &mut values)?;
        }
        if values.is_empty() {
            return Ok(Flow::empty());
        }
        let result = match self.kind {
            AggregateKind::Sum => values.iter().sum(),
            AggregateKind::Max => values.iter().cloned().fold(f64::MIN, f64::max),
            AggregateKind::Min => values.iter().cloned().fold(f64::MAX, f64::min),
            AggregateKind::Avg => values.iter().sum::<f64>() / values.len() as f64,
        };
        Ok(Flow::Done(Value::Float(result)))
    }
}

/// `f(value, width, decimals)`: fixed-format numeric rendering. Without
/// decimals the value renders in scientific notation; `decimals = 0`
/// renders an integer.
#[derive(Debug, Clone, PartialEq)]
pub struct FFunc {
    pub value: Box<Expr>,
    pub width: Option<Box<Expr>>,
    pub decimals: Option<Box<Expr>>,
}

impl Expression for FFunc {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let value = value_of!(self.value.eval(ctx)?).as_number()?;
        let width = match &self.width {
            Some(expr) => value_of!(expr.eval(ctx)?).as_int()?.max(0) as usize,
            None => 16,
        };
        let rendered = match &self.decimals {
            None => scientific(value, width),
            Some(expr) => {
                let decimals = value_of!(expr.eval(ctx)?).as_int()?.max(0) as usize;
                if decimals == 0 {
                    format!("{:>width$}", value.trunc() as i64)
                } else {
                    format!("{value:>width$.decimals$}")
                }
            }
        };
        Ok(Flow::Done(Value::Str(rendered)))
    }
}

/// Six-decimal scientific notation with a signed two-digit exponent.
fn scientific(value: f64, width: usize) -> String {
    let raw = format!("{value:.6e}");
    let rendered = match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{mantissa}E{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs())
        }
        None => raw,
    };
    format!("{rendered:>width$}")
}

/// `instr(s, sub)`: 1-based position of the first match, 0 when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub text: Box<Expr>,
    pub needle: Box<Expr>,
}

impl Expression for Instr {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let upper = std::mem::replace(&mut ctx.upper, false);
        let text = value_of!(plain_text(&self.text, ctx)?).to_string();
        let needle = value_of!(plain_text(&self.needle, ctx)?).to_string();
        ctx.upper = upper;

        if text.is_empty() || needle.is_empty() {
            return Ok(Flow::Done(Value::Int(0)));
        }
        let position = text
            .find(&needle)
            .map(|byte| text[..byte].chars().count() + 1)
            .unwrap_or(0);
        Ok(Flow::Done(Value::Int(position as i64)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    /// `date`: `%Y%m%d %H%M%S %w %j`.
    Full,
    /// `date(DATEONLY)`: `%d/%m/%y`.
    DateOnly,
    /// `date(DATETIME)`: `%d/%m/%y %H:%M:%S`.
    DateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Date {
    pub kind: DateKind,
}

impl Expression for Date {
    fn eval(&self, _ctx: &mut Context<'_>) -> Result<Flow> {
        let now = Local::now();
        let text = match self.kind {
            DateKind::Full => now.format("%Y%m%d %H%M%S %w %j"),
            DateKind::DateOnly => now.format("%d/%m/%y"),
            DateKind::DateTime => now.format("%d/%m/%y %H:%M:%S"),
        };
        Ok(Flow::Done(Value::Str(text.to_string())))
    }
}

/// `datex(seconds)`: the full date format for an epoch timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Datex {
    pub seconds: Box<Expr>,
}

impl Expression for Datex {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let seconds = value_of!(self.seconds.eval(ctx)?).as_int()?;
        let stamp = Local
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| Error::InvalidDate(seconds.to_string()))?;
        Ok(Flow::Done(Value::Str(
            stamp.format("%Y%m%d %H%M%S %w %j").to_string(),
        )))
    }
}

/// `seconds('yyyymmdd hhmmss')`: epoch seconds of a local timestamp; the
/// time-of-day part is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Seconds {
    pub text: Box<Expr>,
}

impl Expression for Seconds {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let text = value_of!(plain_text(&self.text, ctx)?).to_string();
        let digits = |range: std::ops::Range<usize>| -> Option<u32> {
            text.get(range).and_then(|s| s.parse().ok())
        };
        let (Some(year), Some(month), Some(day)) =
            (digits(0..4), digits(4..6), digits(6..8))
        else {
            return Err(Error::InvalidDate(text.clone()));
        };
        let hour = digits(9..11).unwrap_or(0);
        let minute = digits(11..13).unwrap_or(0);
        let second = digits(13..15).unwrap_or(0);

        let stamp = Local
            .with_ymd_and_hms(year as i32, month, day, hour, minute, second)
            .single()
            .ok_or_else(|| Error::InvalidDate(text.clone()))?;
        Ok(Flow::Done(Value::Int(stamp.timestamp())))
    }
}

/// `cat(path)`: file contents relative to the database directory; empty on
/// any error.
#[derive(Debug, Clone, PartialEq)]
pub struct Cat {
    pub path: Box<Expr>,
}

impl Expression for Cat {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let name = value_of!(plain_text(&self.path, ctx)?).to_string();
        let path = ctx.db.base_dir().join(name);
        let content = std::fs::read_to_string(path).unwrap_or_default();
        Ok(Flow::Done(Value::Str(content)))
    }
}

/// `newline(s)`: the line separator for subsequent emissions.
#[derive(Debug, Clone, PartialEq)]
pub struct Newline {
    pub text: Box<Expr>,
}

impl Expression for Newline {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let sep = value_of!(plain_text(&self.text, ctx)?).to_string();
        ctx.workarea.linesep = sep;
        Ok(Flow::empty())
    }
}

/// `lw(n)`: the line width for subsequent emissions; restored by the
/// session wrapper after the call.
#[derive(Debug, Clone, PartialEq)]
pub struct LineWidth {
    pub width: Box<Expr>,
}

impl Expression for LineWidth {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let width = value_of!(self.width.eval(ctx)?).as_int()?.max(0) as usize;
        ctx.workarea.max_width = width;
        Ok(Flow::empty())
    }
}

