//! Cross-record dereference and inverted-file lookups.

use tracing::debug;

use super::{eval_plain, value_of, Context, Expr, Expression, Flow, Result, Sequence};
use crate::value::Value;

/// How a foreign database is named: statically (`ref->db(...)`) or through
/// an expression (`ref([expr] ...)`).
#[derive(Debug, Clone, PartialEq)]
pub enum DbRef {
    Name(String),
    Expr(Box<Expr>),
}

impl DbRef {
    fn resolve(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        match self {
            DbRef::Name(name) => Ok(Flow::Done(Value::Str(name.clone()))),
            DbRef::Expr(expr) => {
                let upper = std::mem::replace(&mut ctx.upper, false);
                let flow = eval_plain(expr, ctx);
                ctx.upper = upper;
                flow
            }
        }
    }
}

/// `ref(n, fmt)` and its cross-database variants: load record `n` and
/// evaluate `fmt` in its context, emitting against the caller's workarea.
#[derive(Debug, Clone, PartialEq)]
pub struct Ref {
    pub mfn: Box<Expr>,
    pub body: Sequence,
    pub db: Option<DbRef>,
}

impl Expression for Ref {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let mfn = value_of!(self.mfn.eval(ctx)?).as_int()?.max(0) as u32;
        let db_name = match &self.db {
            None => None,
            Some(db) => Some(value_of!(db.resolve(ctx)?).to_string().trim().to_owned()),
        };

        debug!(mfn, db = db_name.as_deref().unwrap_or("<self>"), "ref dereference");
        let mut target = ctx
            .db
            .record(db_name.as_deref(), mfn)?
            .unwrap_or_default();

        // the referenced record formats with fresh style state but shares
        // the caller's workarea, so line breaking stays coherent
        let mark = ctx.workarea.mark();
        {
            let mut sub = Context::new(&mut target, ctx.db, &mut *ctx.workarea);
            sub.plain = ctx.plain;
            self.body.format(&mut sub)?;
        }
        let text = ctx.workarea.take_from(mark);
        Ok(Flow::Done(Value::Str(text)))
    }
}

/// `l('key')`: MFN of the first posting for a key, 0 when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub key: Sequence,
    pub db: Option<DbRef>,
}

impl Expression for Search {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let key = value_of!(eval_plain(&Expr::Sequence(self.key.clone()), ctx)?).to_string();
        let db_name = match &self.db {
            None => None,
            Some(db) => Some(value_of!(db.resolve(ctx)?).to_string().trim().to_owned()),
        };
        let mfn = ctx.db.first_posting_mfn(db_name.as_deref(), &key)?;
        Ok(Flow::Done(Value::Int(i64::from(mfn))))
    }
}

/// `npost('key')`: number of postings for a key, 0 when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Npost {
    pub key: Sequence,
    pub db: Option<DbRef>,
}

impl Expression for Npost {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let key = value_of!(eval_plain(&Expr::Sequence(self.key.clone()), ctx)?)
            .to_string()
            .to_uppercase();
        let db_name = match &self.db {
            None => None,
            Some(db) => Some(value_of!(db.resolve(ctx)?).to_string().trim().to_owned()),
        };
        let count = ctx.db.posting_count(db_name.as_deref(), &key)?;
        Ok(Flow::Done(Value::Int(count as i64)))
    }
}
