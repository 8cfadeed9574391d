//! Parser: token stream to AST, with operator-precedence expression
//! climbing and the literal-binding rules of the formatting language.
//!
//! Format lists are comma-tolerant: commas are separators that may appear
//! freely. A conditional literal binds forward to the next field when one
//! follows (through further literals and commas), otherwise backward as the
//! suffix of the field it trails.

use crate::expression::{
    Aggregate, AggregateKind, Attr, BinOp, BoolFunc, Branch, BreakNode, CSpacer, Cat,
    CondLiteral, ContinueNode, Date, DateKind, Datex, DbRef, Expr, FFunc, FieldExpr,
    FieldSelector, IncondLiteral, Instr, Iocc, Left, LineWidth, Mfn, Mid, Minus, Mode, ModeSet,
    MstName, Newline, Nocc, Not, Npost, NumberLit, Operator, Proc, Ref, RepeatLit,
    RepeatableGroup, Replace, Right, SFunc, Search, Seconds, Select, Sequence, SizeOf, Spacer,
    SpacerKind, TypeOf, Val, Variable, WhileLoop, XSpacer,
};
use crate::lexer::{FieldToken, Func, Keyword, Spanned, Token};
use crate::value::Value;

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token {token:?} at {at}")]
    UnexpectedToken { at: usize, token: String },

    #[error("{func} expects {expected} arguments, got {got} (at {at})")]
    Arity {
        at: usize,
        func: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("repeatable groups cannot nest (at {at})")]
    NestedGroup { at: usize },
}

pub struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    group_depth: usize,
}

pub fn parse(tokens: &[Spanned]) -> Result<Sequence, Error> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        group_depth: 0,
    };
    let chain = parser.format_list(&[])?;
    if let Some((at, token)) = parser.current() {
        return Err(Error::UnexpectedToken {
            at,
            token: format!("{token:?}"),
        });
    }
    Ok(chain)
}

impl<'t> Parser<'t> {
    fn current(&self) -> Option<(usize, &'t Token)> {
        self.tokens.get(self.pos).map(|(at, t)| (*at, t))
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + ahead).map(|(_, t)| t)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(at, _)| *at)
            .or_else(|| self.tokens.last().map(|(at, _)| *at))
            .unwrap_or(0)
    }

    fn unexpected(&self) -> Error {
        match self.current() {
            Some((at, token)) => Error::UnexpectedToken {
                at,
                token: format!("{token:?}"),
            },
            None => Error::UnexpectedEnd,
        }
    }

    fn expect(&mut self, wanted: &Token) -> Result<(), Error> {
        if self.peek() == Some(wanted) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), Error> {
        self.expect(&Token::Keyword(keyword))
    }

    fn skip_commas(&mut self) {
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
        }
    }

    fn at_terminator(&self, terminators: &[Keyword]) -> bool {
        match self.peek() {
            None => true,
            Some(Token::RParen) => true,
            Some(Token::Keyword(k)) => terminators.contains(k),
            _ => false,
        }
    }

    /// A comma-tolerant run of format elements, stopped by `)` or any of
    /// the given keywords (both left unconsumed).
    fn format_list(&mut self, terminators: &[Keyword]) -> Result<Sequence, Error> {
        let mut nodes = Vec::new();
        loop {
            self.skip_commas();
            if self.at_terminator(terminators) {
                break;
            }
            self.element(&mut nodes)?;
        }
        Ok(Sequence::new(nodes))
    }

    fn element(&mut self, out: &mut Vec<Expr>) -> Result<(), Error> {
        match self.peek().ok_or(Error::UnexpectedEnd)? {
            Token::Mode { heading, upper } => {
                let node = ModeSet {
                    mode: match heading {
                        'h' => Mode::Heading,
                        'd' => Mode::Data,
                        _ => Mode::Proof,
                    },
                    upper: *upper,
                };
                self.bump();
                out.push(node.into());
            }

            Token::Sharp => {
                self.bump();
                out.push(Spacer { kind: SpacerKind::Newline }.into());
            }
            Token::Slash => {
                self.bump();
                out.push(Spacer { kind: SpacerKind::ConditionalNewline }.into());
            }
            Token::Percent => {
                self.bump();
                out.push(Spacer { kind: SpacerKind::SqueezeBlank }.into());
            }
            Token::XSpacer(count) => {
                let count = *count;
                self.bump();
                out.push(XSpacer { count }.into());
            }
            Token::CSpacer(column) => {
                let column = *column;
                self.bump();
                out.push(CSpacer { column }.into());
            }

            Token::SVar(_) | Token::EVar(_) if self.peek_at(1) == Some(&Token::Assign) => {
                let name = match self.bump() {
                    Some(Token::SVar(name)) | Some(Token::EVar(name)) => name.clone(),
                    _ => unreachable!("peeked variable"),
                };
                self.bump();
                let value = self.expr()?;
                out.push(
                    Attr {
                        var: Variable { name },
                        value: Box::new(value),
                    }
                    .into(),
                );
            }

            Token::LParen => {
                let at = self.offset();
                if self.group_depth > 0 {
                    return Err(Error::NestedGroup { at });
                }
                self.bump();
                self.group_depth += 1;
                let body = self.format_list(&[])?;
                self.group_depth -= 1;
                self.expect(&Token::RParen)?;
                out.push(RepeatableGroup { body }.into());
            }

            Token::Keyword(Keyword::If) => {
                self.bump();
                let condition = self.expr()?;
                self.expect_keyword(Keyword::Then)?;
                let on_true = self.format_list(&[Keyword::Else, Keyword::Fi])?;
                let on_false = if self.peek() == Some(&Token::Keyword(Keyword::Else)) {
                    self.bump();
                    Some(self.format_list(&[Keyword::Fi])?)
                } else {
                    None
                };
                self.expect_keyword(Keyword::Fi)?;
                out.push(
                    Branch {
                        condition: Box::new(condition),
                        on_true,
                        on_false,
                    }
                    .into(),
                );
            }

            Token::Keyword(Keyword::While) => {
                self.bump();
                let condition = self.expr()?;
                self.expect(&Token::LParen)?;
                let body = self.format_list(&[])?;
                self.expect(&Token::RParen)?;
                out.push(
                    WhileLoop {
                        condition: Box::new(condition),
                        body,
                    }
                    .into(),
                );
            }

            Token::Keyword(Keyword::Select) => {
                self.bump();
                let selector = self.expr()?;
                let mut cases = Vec::new();
                self.skip_commas();
                while self.peek() == Some(&Token::Keyword(Keyword::Case)) {
                    self.bump();
                    let option = self.expr()?;
                    self.expect(&Token::Colon)?;
                    let body =
                        self.format_list(&[Keyword::Case, Keyword::Elsecase, Keyword::Endsel])?;
                    cases.push((option, body));
                }
                let fallback = if self.peek() == Some(&Token::Keyword(Keyword::Elsecase)) {
                    self.bump();
                    Some(self.format_list(&[Keyword::Endsel])?)
                } else {
                    None
                };
                self.expect_keyword(Keyword::Endsel)?;
                out.push(
                    Select {
                        selector: Box::new(selector),
                        cases,
                        fallback,
                    }
                    .into(),
                );
            }

            Token::Func(Func::Proc) => {
                self.bump();
                self.expect(&Token::LParen)?;
                let body = self.format_list(&[])?;
                self.expect(&Token::RParen)?;
                out.push(Proc { body }.into());
            }

            Token::CondLit(_) | Token::RepLit(_) => self.selector_chain(out)?,

            _ => {
                let expr = self.expr()?;
                out.push(expr);
            }
        }
        Ok(())
    }

    /// Conditional/repeatable literals followed by the field they decorate.
    /// Literals with no field to bind to are kept as inert nodes.
    fn selector_chain(&mut self, out: &mut Vec<Expr>) -> Result<(), Error> {
        let mut prefix_conds: Vec<String> = Vec::new();
        while let Some(Token::CondLit(text)) = self.peek() {
            prefix_conds.push(text.clone());
            self.bump();
            self.skip_commas();
        }

        let mut prefix_rep = None;
        if let Some(Token::RepLit(text)) = self.peek() {
            let text = text.clone();
            self.bump();
            let plus = if self.peek() == Some(&Token::Plus) {
                self.bump();
                true
            } else {
                false
            };
            prefix_rep = Some(RepeatLit { text, plus });
            self.skip_commas();
        }

        let Some(Token::Field(_)) = self.peek() else {
            // dangling literals never emit
            for text in prefix_conds {
                out.push(CondLiteral { text, field: None }.into());
            }
            return Ok(());
        };

        let field = self.field_with_suffix(prefix_rep)?;
        for text in prefix_conds {
            out.push(
                CondLiteral {
                    text,
                    field: Some(field.sel.clone()),
                }
                .into(),
            );
        }
        out.push(field.into());
        Ok(())
    }

    /// A field token plus anything bound after it: `+|lit|`, `|lit|`, and a
    /// trailing conditional literal that does not belong to the next field.
    fn field_with_suffix(&mut self, prefix_rep: Option<RepeatLit>) -> Result<FieldExpr, Error> {
        let token = match self.bump() {
            Some(Token::Field(token)) => token.clone(),
            _ => return Err(self.unexpected()),
        };
        let mut field = FieldExpr {
            sel: selector_from_token(&token),
            prefix: prefix_rep,
            suffix: None,
            cond_suffix: None,
        };

        // suffixes bind through separating commas
        self.skip_commas();
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Plus), Some(Token::RepLit(text))) => {
                let text = text.clone();
                self.bump();
                self.bump();
                field.suffix = Some(RepeatLit { text, plus: true });
            }
            // a bare repeatable literal trailed by another field is that
            // field's prefix, not our suffix
            (Some(Token::RepLit(text)), _) if !self.binds_forward() => {
                let text = text.clone();
                self.bump();
                field.suffix = Some(RepeatLit { text, plus: false });
            }
            _ => {}
        }

        self.skip_commas();
        if let Some(Token::CondLit(text)) = self.peek() {
            if !self.binds_forward() {
                field.cond_suffix = Some(text.clone());
                self.bump();
            }
        }
        Ok(field)
    }

    /// Whether the conditional literal at the cursor starts a new selector
    /// chain: a field follows it through further literals and commas.
    fn binds_forward(&self) -> bool {
        let mut ahead = 1;
        loop {
            match self.peek_at(ahead) {
                Some(Token::CondLit(_)) | Some(Token::RepLit(_)) | Some(Token::Comma)
                | Some(Token::Plus) => ahead += 1,
                Some(Token::Field(_)) => return true,
                _ => return false,
            }
        }
    }

    // ---------------------------------------------------------------------
    // expressions
    // ---------------------------------------------------------------------

    fn expr(&mut self) -> Result<Expr, Error> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.and_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Keyword(Keyword::Or)) => Operator::Or,
                Some(Token::Keyword(Keyword::Xor)) => Operator::Xor,
                _ => break,
            };
            self.bump();
            let rhs = self.and_expr()?;
            lhs = BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
            .into();
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.rel_expr()?;
        while self.peek() == Some(&Token::Keyword(Keyword::And)) {
            self.bump();
            let rhs = self.rel_expr()?;
            lhs = BinOp {
                op: Operator::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
            .into();
        }
        Ok(lhs)
    }

    fn rel_expr(&mut self) -> Result<Expr, Error> {
        let lhs = self.add_expr()?;
        let op = match self.peek() {
            Some(Token::Equal) => Operator::Equal,
            Some(Token::NotEqual) => Operator::NotEqual,
            Some(Token::Less) => Operator::Less,
            Some(Token::LessEqual) => Operator::LessOrEqual,
            Some(Token::Greater) => Operator::Greater,
            Some(Token::GreaterEqual) => Operator::GreaterOrEqual,
            Some(Token::Colon) => Operator::Contains,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.add_expr()?;
        Ok(BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
        .into())
    }

    fn add_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) if self.arithmetic_continues(&lhs) => Operator::Add,
                Some(Token::Minus) if self.arithmetic_continues(&lhs) => Operator::Subtract,
                _ => break,
            };
            self.bump();
            let rhs = self.mul_expr()?;
            lhs = BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
            .into();
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) if self.arithmetic_continues(&lhs) => Operator::Multiply,
                Some(Token::Slash) if self.arithmetic_continues(&lhs) => Operator::Divide,
                Some(Token::Percent) if self.arithmetic_continues(&lhs) => Operator::Remainder,
                _ => break,
            };
            self.bump();
            let rhs = self.unary_expr()?;
            lhs = BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }
            .into();
        }
        Ok(lhs)
    }

    /// Arithmetic only connects numeric expressions; the same characters
    /// after a field or literal are spacers and the `+` of a repeatable
    /// literal. Both sides must look numeric.
    fn arithmetic_continues(&self, lhs: &Expr) -> bool {
        numeric_expr(lhs) && self.numeric_operand_follows(1)
    }

    fn numeric_operand_follows(&self, ahead: usize) -> bool {
        match self.peek_at(ahead) {
            Some(
                Token::Integer(_)
                | Token::Float(_)
                | Token::LParen
                | Token::Minus
                | Token::EVar(_)
                | Token::Mfn(_),
            ) => true,
            Some(Token::Func(func)) => matches!(
                func,
                Func::Val
                    | Func::Size
                    | Func::Nocc
                    | Func::Iocc
                    | Func::Instr
                    | Func::Seconds
                    | Func::Rsum
                    | Func::Rmax
                    | Func::Rmin
                    | Func::Ravr
                    | Func::L
                    | Func::Npost
            ),
            _ => false,
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, Error> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                let inner = self.unary_expr()?;
                Ok(Minus { inner: Box::new(inner) }.into())
            }
            Some(Token::Keyword(Keyword::Not)) => {
                self.bump();
                let inner = self.unary_expr()?;
                Ok(Not { inner: Box::new(inner) }.into())
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        match self.peek().ok_or(Error::UnexpectedEnd)? {
            Token::Integer(value) => {
                let value = *value;
                self.bump();
                Ok(NumberLit { value: Value::Int(value) }.into())
            }
            Token::Float(value) => {
                let value = *value;
                self.bump();
                Ok(NumberLit { value: Value::Float(value) }.into())
            }
            Token::IncondLit(text) => {
                let text = text.clone();
                self.bump();
                Ok(IncondLiteral { text }.into())
            }
            Token::SVar(name) | Token::EVar(name) => {
                let name = name.clone();
                self.bump();
                Ok(Variable { name }.into())
            }
            Token::Mfn(width) => {
                let width = *width;
                self.bump();
                let newline =
                    self.peek() == Some(&Token::Slash) && !self.numeric_operand_follows(1);
                if newline {
                    self.bump();
                }
                Ok(Mfn { width, newline }.into())
            }
            Token::Field(_) => {
                let field = self.field_with_suffix(None)?;
                Ok(field.into())
            }
            Token::LParen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Func(func) => {
                let func = *func;
                self.function(func)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn function(&mut self, func: Func) -> Result<Expr, Error> {
        let at = self.offset();
        self.bump();

        // no-argument forms first
        match func {
            Func::MstName => return Ok(MstName.into()),
            Func::Break => return Ok(BreakNode.into()),
            Func::Continue => return Ok(ContinueNode.into()),
            Func::Iocc => return Ok(Iocc.into()),
            Func::Date if self.peek() != Some(&Token::LParen) => {
                return Ok(Date { kind: DateKind::Full }.into())
            }
            _ => {}
        }

        match func {
            Func::Date => {
                self.expect(&Token::LParen)?;
                let kind = match self.bump() {
                    Some(Token::Keyword(Keyword::DateOnly)) => DateKind::DateOnly,
                    Some(Token::Keyword(Keyword::DateTime)) => DateKind::DateTime,
                    _ => return Err(self.unexpected()),
                };
                self.expect(&Token::RParen)?;
                Ok(Date { kind }.into())
            }

            Func::P | Func::A => {
                self.expect(&Token::LParen)?;
                let sel = match self.bump() {
                    Some(Token::Field(token)) => selector_from_token(token),
                    _ => return Err(self.unexpected()),
                };
                self.expect(&Token::RParen)?;
                Ok(BoolFunc { negate: func == Func::A, sel }.into())
            }

            Func::Nocc => {
                self.expect(&Token::LParen)?;
                let sel = match self.bump() {
                    Some(Token::Field(token)) => selector_from_token(token),
                    _ => return Err(self.unexpected()),
                };
                self.expect(&Token::RParen)?;
                Ok(Nocc { sel }.into())
            }

            Func::Ref => {
                let db = self.db_selection()?;
                self.expect(&Token::LParen)?;
                let db = match db {
                    Some(db) => Some(db),
                    None => self.bracketed_db()?,
                };
                let mfn = self.expr()?;
                self.skip_commas();
                let body = self.format_list(&[])?;
                self.expect(&Token::RParen)?;
                Ok(Ref { mfn: Box::new(mfn), body, db }.into())
            }

            Func::L | Func::Npost => {
                let db = self.db_selection()?;
                self.expect(&Token::LParen)?;
                let db = match db {
                    Some(db) => Some(db),
                    None => self.bracketed_db()?,
                };
                let key = self.format_list(&[])?;
                self.expect(&Token::RParen)?;
                Ok(if func == Func::L {
                    Search { key, db }.into()
                } else {
                    Npost { key, db }.into()
                })
            }

            _ => {
                self.expect(&Token::LParen)?;
                let args = self.arg_list()?;
                self.expect(&Token::RParen)?;
                self.build_function(func, args, at)
            }
        }
    }

    fn db_selection(&mut self) -> Result<Option<DbRef>, Error> {
        if let Some(Token::DbSelect(name)) = self.peek() {
            let name = name.clone();
            self.bump();
            Ok(Some(DbRef::Name(name)))
        } else {
            Ok(None)
        }
    }

    fn bracketed_db(&mut self) -> Result<Option<DbRef>, Error> {
        if self.peek() == Some(&Token::LBracket) {
            self.bump();
            let expr = self.expr()?;
            self.expect(&Token::RBracket)?;
            Ok(Some(DbRef::Expr(Box::new(expr))))
        } else {
            Ok(None)
        }
    }

    fn arg_list(&mut self) -> Result<Vec<Expr>, Error> {
        let mut args = Vec::new();
        loop {
            self.skip_commas();
            if self.peek() == Some(&Token::RParen) || self.peek().is_none() {
                break;
            }
            args.push(self.expr()?);
        }
        Ok(args)
    }

    fn build_function(&mut self, func: Func, args: Vec<Expr>, at: usize) -> Result<Expr, Error> {
        fn boxed<const N: usize>(
            args: Vec<Expr>,
            at: usize,
            func: &'static str,
            expected: &'static str,
        ) -> Result<[Box<Expr>; N], Error> {
            let got = args.len();
            let boxed: Vec<Box<Expr>> = args.into_iter().map(Box::new).collect();
            boxed
                .try_into()
                .map_err(|_| Error::Arity { at, func, expected, got })
        }

        let node: Expr = match func {
            Func::Mid => {
                let [text, start, len] = boxed(args, at, "mid", "3")?;
                Mid { text, start, len }.into()
            }
            Func::Left => {
                let [text, len] = boxed(args, at, "left", "2")?;
                Left { text, len }.into()
            }
            Func::Right => {
                let [text, len] = boxed(args, at, "right", "2")?;
                Right { text, len }.into()
            }
            Func::Replace => {
                let [text, from, to] = boxed(args, at, "replace", "3")?;
                Replace { text, from, to }.into()
            }
            Func::Instr => {
                let [text, needle] = boxed(args, at, "instr", "2")?;
                Instr { text, needle }.into()
            }
            Func::Datex => {
                let [seconds] = boxed(args, at, "datex", "1")?;
                Datex { seconds }.into()
            }
            Func::Seconds => {
                let [text] = boxed(args, at, "seconds", "1")?;
                Seconds { text }.into()
            }
            Func::Cat => {
                let [path] = boxed(args, at, "cat", "1")?;
                Cat { path }.into()
            }
            Func::Type => {
                let [arg] = boxed(args, at, "type", "1")?;
                TypeOf { arg }.into()
            }
            Func::Val => {
                let [arg] = boxed(args, at, "val", "1")?;
                Val { arg }.into()
            }
            Func::Newline => {
                let [text] = boxed(args, at, "newline", "1")?;
                Newline { text }.into()
            }
            Func::Lw => {
                let [width] = boxed(args, at, "lw", "1")?;
                LineWidth { width }.into()
            }
            Func::F => {
                let got = args.len();
                let mut it = args.into_iter();
                let value = it
                    .next()
                    .map(Box::new)
                    .ok_or(Error::Arity { at, func: "f", expected: "1 to 3", got })?;
                let width = it.next().map(Box::new);
                let decimals = it.next().map(Box::new);
                if it.next().is_some() {
                    return Err(Error::Arity { at, func: "f", expected: "1 to 3", got });
                }
                FFunc { value, width, decimals }.into()
            }
            Func::S => SFunc { args: Sequence::new(args) }.into(),
            Func::Size => SizeOf { args: Sequence::new(args) }.into(),
            Func::Rsum => Aggregate { kind: AggregateKind::Sum, args: Sequence::new(args) }.into(),
            Func::Rmax => Aggregate { kind: AggregateKind::Max, args: Sequence::new(args) }.into(),
            Func::Rmin => Aggregate { kind: AggregateKind::Min, args: Sequence::new(args) }.into(),
            Func::Ravr => Aggregate { kind: AggregateKind::Avg, args: Sequence::new(args) }.into(),
            Func::Date
            | Func::Proc
            | Func::MstName
            | Func::Break
            | Func::Continue
            | Func::Iocc
            | Func::P
            | Func::A
            | Func::Nocc
            | Func::Ref
            | Func::L
            | Func::Npost => return Err(self.unexpected()),
        };
        Ok(node)
    }
}

/// Expressions the arithmetic operators may extend.
fn numeric_expr(expr: &Expr) -> bool {
    match expr {
        Expr::Number(_)
        | Expr::Mfn(_)
        | Expr::BinOp(_)
        | Expr::Minus(_)
        | Expr::Val(_)
        | Expr::SizeOf(_)
        | Expr::Nocc(_)
        | Expr::Iocc(_)
        | Expr::Instr(_)
        | Expr::Seconds(_)
        | Expr::Aggregate(_)
        | Expr::Search(_)
        | Expr::Npost(_) => true,
        Expr::Variable(var) => var.is_numeric(),
        _ => false,
    }
}

fn selector_from_token(token: &FieldToken) -> FieldSelector {
    FieldSelector {
        kind: token.kind,
        tag: token.tag,
        subfield: token.subfield,
        occurrence: token.occurrence.clone(),
        slicer: token.slicer,
        alignment: token.alignment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_src(src: &str) -> Sequence {
        let tokens = Lexer::new(src).tokenize().unwrap();
        parse(&tokens).unwrap()
    }

    #[test]
    fn fields_and_literals() {
        let chain = parse_src(r#""[", v10, "]""#);
        assert_eq!(chain.0.len(), 2);
        let Expr::CondLiteral(lit) = &chain.0[0] else {
            panic!("{chain:?}");
        };
        assert_eq!(lit.text, "[");
        assert!(lit.field.is_some());
        let Expr::Field(field) = &chain.0[1] else {
            panic!("{chain:?}");
        };
        assert_eq!(field.sel.tag, 10);
        assert_eq!(field.cond_suffix.as_deref(), Some("]"));
    }

    #[test]
    fn literal_binds_forward_between_fields() {
        let chain = parse_src(r#"v10 "x" v20"#);
        assert_eq!(chain.0.len(), 3);
        assert!(matches!(&chain.0[0], Expr::Field(f) if f.cond_suffix.is_none()));
        let Expr::CondLiteral(lit) = &chain.0[1] else {
            panic!("{chain:?}");
        };
        assert_eq!(lit.field.as_ref().map(|sel| sel.tag), Some(20));
        assert!(matches!(&chain.0[2], Expr::Field(f) if f.sel.tag == 20));
    }

    #[test]
    fn repeatable_literal_roles() {
        let chain = parse_src("(v90+|; |)");
        let Expr::Group(group) = &chain.0[0] else {
            panic!("{chain:?}");
        };
        let Expr::Field(field) = &group.body.0[0] else {
            panic!("{chain:?}");
        };
        let suffix = field.suffix.as_ref().unwrap();
        assert_eq!(suffix.text, "; ");
        assert!(suffix.plus);

        let chain = parse_src("|, |v90");
        let Expr::Field(field) = &chain.0[0] else {
            panic!("{chain:?}");
        };
        let prefix = field.prefix.as_ref().unwrap();
        assert_eq!(prefix.text, ", ");
        assert!(!prefix.plus);
    }

    #[test]
    fn branch_and_bool() {
        let chain = parse_src(r#"if p(v10) then "has" else "not" fi"#);
        let Expr::Branch(branch) = &chain.0[0] else {
            panic!("{chain:?}");
        };
        assert!(matches!(*branch.condition, Expr::BoolFunc(_)));
        assert!(branch.on_false.is_some());
    }

    #[test]
    fn precedence() {
        let chain = parse_src("1 + 2 * 3");
        let Expr::BinOp(add) = &chain.0[0] else {
            panic!("{chain:?}");
        };
        assert_eq!(add.op, Operator::Add);
        assert!(matches!(&*add.rhs, Expr::BinOp(mul) if mul.op == Operator::Multiply));
    }

    #[test]
    fn slash_is_spacer_not_divide() {
        let chain = parse_src("v2/");
        assert_eq!(chain.0.len(), 2);
        assert!(matches!(&chain.0[1], Expr::Spacer(s) if s.kind == SpacerKind::ConditionalNewline));

        let chain = parse_src("mfn(3)/4");
        let Expr::BinOp(div) = &chain.0[0] else {
            panic!("{chain:?}");
        };
        assert_eq!(div.op, Operator::Divide);
    }

    #[test]
    fn select_statement() {
        let chain = parse_src("select v10 case 'a': 'first' case 'b': 'second' elsecase 'other' endsel");
        let Expr::Select(select) = &chain.0[0] else {
            panic!("{chain:?}");
        };
        assert_eq!(select.cases.len(), 2);
        assert!(select.fallback.is_some());
    }

    #[test]
    fn functions_and_arity() {
        parse_src("mid('abc', 1, 2), f(42, 6, 0), rsum(v10)");
        let tokens = Lexer::new("mid('abc', 1)").tokenize().unwrap();
        assert!(matches!(parse(&tokens), Err(Error::Arity { .. })));
    }

    #[test]
    fn ref_variants() {
        let chain = parse_src("ref(mfn, v24)");
        assert!(matches!(&chain.0[0], Expr::Ref(r) if r.db.is_none()));

        let chain = parse_src("ref->other(1, v24)");
        let Expr::Ref(r) = &chain.0[0] else { panic!() };
        assert!(matches!(&r.db, Some(DbRef::Name(n)) if n == "other"));

        let chain = parse_src("ref(['aux'] 1, v24)");
        let Expr::Ref(r) = &chain.0[0] else { panic!() };
        assert!(matches!(&r.db, Some(DbRef::Expr(_))));
    }

    #[test]
    fn nested_groups_rejected() {
        let tokens = Lexer::new("((v90))").tokenize().unwrap();
        assert!(matches!(parse(&tokens), Err(Error::NestedGroup { .. })));
    }

    #[test]
    fn while_and_assignment() {
        let chain = parse_src("e1 := 1, while e1 < 3 ( 'x', e1 := e1 + 1 )");
        assert!(matches!(&chain.0[0], Expr::Attr(_)));
        assert!(matches!(&chain.0[1], Expr::While(_)));
    }
}
