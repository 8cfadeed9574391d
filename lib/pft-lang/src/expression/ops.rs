//! Binary and unary operators.

use isisdb_core::record::Record;

use super::{eval_plain, value_of, Context, Expression, Flow, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Multiply,
    Divide,
    Remainder,
    Add,
    Subtract,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinOp {
    pub op: Operator,
    pub lhs: Box<super::Expr>,
    pub rhs: Box<super::Expr>,
}

impl Expression for BinOp {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let mut lhs = value_of!(eval_plain(&self.lhs, ctx)?);
        let mut rhs = value_of!(eval_plain(&self.rhs, ctx)?);

        if ctx.upper {
            if let Value::Str(s) = &lhs {
                lhs = Value::Str(s.to_uppercase());
            }
            if let Value::Str(s) = &rhs {
                rhs = Value::Str(s.to_uppercase());
            }
        }

        use std::cmp::Ordering;
        let value = match self.op {
            Operator::Multiply => lhs.mul(rhs)?,
            Operator::Divide => lhs.div(rhs)?,
            Operator::Remainder => lhs.rem(rhs)?,
            Operator::Add => lhs.add(rhs)?,
            Operator::Subtract => lhs.sub(rhs)?,
            Operator::Equal => Value::Bool(lhs.compare(&rhs)? == Ordering::Equal),
            Operator::NotEqual => Value::Bool(lhs.compare(&rhs)? != Ordering::Equal),
            Operator::Less => Value::Bool(lhs.compare(&rhs)? == Ordering::Less),
            Operator::LessOrEqual => Value::Bool(lhs.compare(&rhs)? != Ordering::Greater),
            Operator::Greater => Value::Bool(lhs.compare(&rhs)? == Ordering::Greater),
            Operator::GreaterOrEqual => Value::Bool(lhs.compare(&rhs)? != Ordering::Less),
            Operator::Contains => Value::Bool(lhs.contains(&rhs)),
            Operator::And => Value::Bool(lhs.is_truthy() && rhs.is_truthy()),
            Operator::Or => Value::Bool(lhs.is_truthy() || rhs.is_truthy()),
            Operator::Xor => Value::Bool(lhs.is_truthy() != rhs.is_truthy()),
        };
        Ok(Flow::Done(value))
    }

    fn max_repeat(&self, record: &Record) -> usize {
        self.lhs
            .max_repeat(record)
            .max(self.rhs.max_repeat(record))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Not {
    pub inner: Box<super::Expr>,
}

impl Expression for Not {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let value = value_of!(self.inner.eval(ctx)?);
        Ok(Flow::Done(Value::Bool(!value.is_truthy())))
    }

    fn max_repeat(&self, record: &Record) -> usize {
        self.inner.max_repeat(record)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minus {
    pub inner: Box<super::Expr>,
}

impl Expression for Minus {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let value = value_of!(self.inner.eval(ctx)?);
        let negated = match value {
            Value::Int(i) => Value::Int(-i),
            other => Value::Float(-other.as_number()?),
        };
        Ok(Flow::Done(negated))
    }

    fn max_repeat(&self, record: &Record) -> usize {
        self.inner.max_repeat(record)
    }
}
