//! Tokenizer for the formatting language.
//!
//! Literals are exclusive states: the lexer switches on an opening `"`,
//! `'` or `|` and consumes verbatim until the matching close. A field
//! token `v<N>` keeps consuming its trailing attributes (subfield,
//! occurrence, slicer, alignment) before the ordinary rules resume.

use crate::expression::field::{FieldKind, OccBound};

pub type Spanned = (usize, Token);

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Field(FieldToken),
    Integer(i64),
    Float(f64),
    CondLit(String),
    IncondLit(String),
    RepLit(String),
    SVar(String),
    EVar(String),
    Mfn(usize),
    XSpacer(usize),
    CSpacer(usize),
    Mode { heading: char, upper: bool },
    DbSelect(String),
    Func(Func),
    Keyword(Keyword),
    Comma,
    Colon,
    Assign,
    Slash,
    Sharp,
    Percent,
    Plus,
    Minus,
    Star,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Then,
    Else,
    Fi,
    While,
    Select,
    Case,
    Elsecase,
    Endsel,
    And,
    Or,
    Xor,
    Not,
    DateOnly,
    DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Date,
    Datex,
    Seconds,
    Proc,
    Instr,
    MstName,
    Break,
    Continue,
    S,
    Mid,
    F,
    Left,
    Right,
    Replace,
    Cat,
    Type,
    Newline,
    Lw,
    Rsum,
    Rmax,
    Rmin,
    Ravr,
    Val,
    Size,
    Nocc,
    Iocc,
    P,
    A,
    Ref,
    L,
    Npost,
}

/// The `v<N>` token family with every attached selector.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldToken {
    pub kind: FieldKind,
    pub tag: u32,
    pub subfield: Option<char>,
    pub occurrence: Option<(OccBound, Option<OccBound>)>,
    pub slicer: Option<(usize, Option<usize>)>,
    pub alignment: Option<(usize, usize)>,
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("unterminated literal starting at {0}")]
    UnterminatedLiteral(usize),

    #[error("unterminated comment starting at {0}")]
    UnterminatedComment(usize),

    #[error("invalid field expression at {0}")]
    InvalidField(usize),

    #[error("invalid number {1:?} at {0}")]
    InvalidNumber(usize, String),

    #[error("word {1:?} is not a recognised keyword (at {0})")]
    UnknownWord(usize, String),

    #[error("illegal character {1:?} at {0}")]
    IllegalChar(usize, char),
}

pub struct Lexer<'input> {
    input: &'input str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            pos: 0,
        }
    }

    /// Tokenize the whole input.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, Error> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(at, _)| at)
            .unwrap_or(self.input.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if keep(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        out
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, Error> {
        loop {
            let start = self.offset();
            let Some(c) = self.bump() else {
                return Ok(None);
            };

            let token = match c {
                ' ' | '\t' | '\n' | '\r' | '\x08' | '\x0c' => continue,

                '|' => Token::RepLit(self.literal(start, '|')?),
                '"' => Token::CondLit(self.literal(start, '"')?),
                '\'' => Token::IncondLit(self.literal(start, '\'')?),

                '/' if self.peek() == Some('*') => {
                    self.bump();
                    self.comment(start)?;
                    continue;
                }
                '/' => Token::Slash,
                '#' => Token::Sharp,
                '%' => Token::Percent,
                ',' => Token::Comma,
                ':' if self.eat('=') => Token::Assign,
                ':' => Token::Colon,
                '+' => Token::Plus,
                '(' => Token::LParen,
                ')' => Token::RParen,
                '[' => Token::LBracket,
                ']' => Token::RBracket,
                '*' => Token::Star,
                '=' => Token::Equal,
                '<' if self.eat('=') => Token::LessEqual,
                '<' if self.eat('>') => Token::NotEqual,
                '<' => Token::Less,
                '>' if self.eat('=') => Token::GreaterEqual,
                '>' => Token::Greater,
                '-' if self.peek() == Some('>') => {
                    self.bump();
                    let name = self.take_while(|c| c.is_alphanumeric() || c == '_');
                    if name.is_empty() {
                        return Err(Error::IllegalChar(start, '>'));
                    }
                    Token::DbSelect(name)
                }
                '-' => Token::Minus,

                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    self.pos -= 1;
                    self.number(start)?
                }
                '.' => Token::Dot,

                c if c.is_ascii_digit() => {
                    self.pos -= 1;
                    self.number(start)?
                }

                c if c.is_alphabetic() || c == '_' => {
                    self.pos -= 1;
                    self.word(start)?
                }

                c => return Err(Error::IllegalChar(start, c)),
            };
            return Ok(Some((start, token)));
        }
    }

    fn literal(&mut self, start: usize, close: char) -> Result<String, Error> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == close => return Ok(text),
                Some(c) => text.push(c),
                None => return Err(Error::UnterminatedLiteral(start)),
            }
        }
    }

    fn comment(&mut self, start: usize) -> Result<(), Error> {
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(());
                }
                Some(_) => {}
                None => return Err(Error::UnterminatedComment(start)),
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, Error> {
        let mut text = self.take_while(|c| c.is_ascii_digit());
        let mut float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            float = true;
            self.bump();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        if self.peek().is_some_and(|c| c == 'e' || c == 'E')
            && self
                .peek_at(1)
                .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            // a sign must still be followed by a digit
            let offset = if matches!(self.peek_at(1), Some('+' | '-')) {
                2
            } else {
                1
            };
            if self.peek_at(offset).is_some_and(|c| c.is_ascii_digit()) {
                float = true;
                text.push(self.bump().unwrap_or('e'));
                if matches!(self.peek(), Some('+' | '-')) {
                    text.push(self.bump().unwrap_or('+'));
                }
                text.push_str(&self.take_while(|c| c.is_ascii_digit()));
            }
        }

        if float {
            text.parse()
                .map(Token::Float)
                .map_err(|_| Error::InvalidNumber(start, text.clone()))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| Error::InvalidNumber(start, text.clone()))
        }
    }

    /// Identifiers: field tokens and single-letter-plus-digits forms are
    /// recognized before the general keyword table.
    fn word(&mut self, start: usize) -> Result<Token, Error> {
        let first = self.peek().unwrap_or('\0');
        let second_is_digit = self.peek_at(1).is_some_and(|c| c.is_ascii_digit());

        if second_is_digit {
            if let Some(kind) = FieldKind::from_letter(first) {
                self.bump();
                let digits = self.take_while(|c| c.is_ascii_digit());
                let tag = digits
                    .parse()
                    .map_err(|_| Error::InvalidNumber(start, digits))?;
                return self.field_attributes(start, kind, tag).map(Token::Field);
            }
            match first.to_ascii_lowercase() {
                's' | 'e' => {
                    let name: String = format!(
                        "{}{}",
                        self.bump().unwrap_or(first),
                        self.take_while(|c| c.is_ascii_digit())
                    );
                    return Ok(if first.to_ascii_lowercase() == 's' {
                        Token::SVar(name)
                    } else {
                        Token::EVar(name)
                    });
                }
                'x' | 'c' => {
                    self.bump();
                    let digits = self.take_while(|c| c.is_ascii_digit());
                    let count = digits
                        .parse()
                        .map_err(|_| Error::InvalidNumber(start, digits))?;
                    return Ok(if first.to_ascii_lowercase() == 'x' {
                        Token::XSpacer(count)
                    } else {
                        Token::CSpacer(count)
                    });
                }
                _ => {}
            }
        }

        let word = self.take_while(|c| c.is_alphanumeric() || c == '_');
        let lower = word.to_lowercase();

        if lower == "mfn" {
            if self.peek() == Some('(') {
                let saved = self.pos;
                self.bump();
                let digits = self.take_while(|c| c.is_ascii_digit());
                if !digits.is_empty() && self.eat(')') {
                    let width = digits
                        .parse()
                        .map_err(|_| Error::InvalidNumber(start, digits))?;
                    return Ok(Token::Mfn(width));
                }
                self.pos = saved;
            }
            return Ok(Token::Mfn(6));
        }

        if let Some(token) = keyword(&lower) {
            return Ok(token);
        }
        Err(Error::UnknownWord(start, word))
    }

    fn field_attributes(
        &mut self,
        start: usize,
        kind: FieldKind,
        tag: u32,
    ) -> Result<FieldToken, Error> {
        let mut token = FieldToken {
            kind,
            tag,
            subfield: None,
            occurrence: None,
            slicer: None,
            alignment: None,
        };

        loop {
            match self.peek() {
                Some('^') => {
                    self.bump();
                    let key = self
                        .bump()
                        .filter(|c| c.is_alphanumeric() || *c == '*')
                        .ok_or(Error::InvalidField(start))?;
                    token.subfield = Some(key);
                }
                Some('[') => {
                    let saved = self.pos;
                    self.bump();
                    match self.occurrence(start) {
                        Ok(occ) => token.occurrence = Some(occ),
                        Err(_) => {
                            self.pos = saved;
                            break;
                        }
                    }
                }
                Some('*') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.bump();
                    let begin = self.digits(start)?;
                    let end = if self.peek() == Some('.')
                        && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                    {
                        self.bump();
                        Some(self.digits(start)?)
                    } else {
                        None
                    };
                    token.slicer = Some((begin, end));
                }
                Some('.') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.bump();
                    let end = self.digits(start)?;
                    token.slicer = Some((0, Some(end)));
                }
                Some('(') => {
                    let saved = self.pos;
                    self.bump();
                    match self.alignment(start) {
                        Ok(alignment) => token.alignment = Some(alignment),
                        Err(_) => {
                            self.pos = saved;
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(token)
    }

    fn digits(&mut self, start: usize) -> Result<usize, Error> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits
            .parse()
            .map_err(|_| Error::InvalidNumber(start, digits))
    }

    /// `[b..e]`, `[b..LAST]`, `[b..]`, `[b]`, `[LAST]`; bounds may also be
    /// `E`-variable names.
    fn occurrence(
        &mut self,
        start: usize,
    ) -> Result<(OccBound, Option<OccBound>), Error> {
        let begin = self.occurrence_bound(start)?;
        let mut end = None;
        if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
            self.bump();
            self.bump();
            if self.peek() != Some(']') {
                end = Some(self.occurrence_bound(start)?);
            }
        }
        if !self.eat(']') {
            return Err(Error::InvalidField(start));
        }
        Ok((begin, end))
    }

    fn occurrence_bound(&mut self, start: usize) -> Result<OccBound, Error> {
        match self.peek() {
            Some(c) if c.is_ascii_digit() => Ok(OccBound::Num(self.digits(start)?)),
            Some('l') | Some('L') => {
                let word = self.take_while(|c| c.is_ascii_alphabetic());
                if word.eq_ignore_ascii_case("last") {
                    Ok(OccBound::Last)
                } else {
                    Err(Error::InvalidField(start))
                }
            }
            Some('e') | Some('E') => {
                let letter = self.bump().unwrap_or('e');
                let digits = self.take_while(|c| c.is_ascii_digit());
                if digits.is_empty() {
                    return Err(Error::InvalidField(start));
                }
                Ok(OccBound::Var(format!("{letter}{digits}")))
            }
            _ => Err(Error::InvalidField(start)),
        }
    }

    fn alignment(&mut self, start: usize) -> Result<(usize, usize), Error> {
        let first = self.digits(start)?;
        let next = if self.eat(',') {
            self.digits(start)?
        } else {
            0
        };
        if !self.eat(')') {
            return Err(Error::InvalidField(start));
        }
        Ok((first, next))
    }
}

fn keyword(lower: &str) -> Option<Token> {
    let token = match lower {
        "if" => Token::Keyword(Keyword::If),
        "then" => Token::Keyword(Keyword::Then),
        "else" => Token::Keyword(Keyword::Else),
        "fi" => Token::Keyword(Keyword::Fi),
        "while" => Token::Keyword(Keyword::While),
        "select" => Token::Keyword(Keyword::Select),
        "case" => Token::Keyword(Keyword::Case),
        "elsecase" => Token::Keyword(Keyword::Elsecase),
        "endsel" => Token::Keyword(Keyword::Endsel),
        "and" => Token::Keyword(Keyword::And),
        "or" => Token::Keyword(Keyword::Or),
        "xor" => Token::Keyword(Keyword::Xor),
        "not" => Token::Keyword(Keyword::Not),
        "dateonly" => Token::Keyword(Keyword::DateOnly),
        "datetime" => Token::Keyword(Keyword::DateTime),

        "date" => Token::Func(Func::Date),
        "datex" => Token::Func(Func::Datex),
        "seconds" => Token::Func(Func::Seconds),
        "proc" => Token::Func(Func::Proc),
        "instr" => Token::Func(Func::Instr),
        "mstname" => Token::Func(Func::MstName),
        "break" => Token::Func(Func::Break),
        "continue" => Token::Func(Func::Continue),
        "s" => Token::Func(Func::S),
        "mid" => Token::Func(Func::Mid),
        "f" => Token::Func(Func::F),
        "left" => Token::Func(Func::Left),
        "right" => Token::Func(Func::Right),
        "replace" => Token::Func(Func::Replace),
        "cat" => Token::Func(Func::Cat),
        "type" => Token::Func(Func::Type),
        "newline" => Token::Func(Func::Newline),
        "lw" => Token::Func(Func::Lw),
        "rsum" => Token::Func(Func::Rsum),
        "rmax" => Token::Func(Func::Rmax),
        "rmin" => Token::Func(Func::Rmin),
        "ravr" => Token::Func(Func::Ravr),
        "val" => Token::Func(Func::Val),
        "size" => Token::Func(Func::Size),
        "nocc" => Token::Func(Func::Nocc),
        "iocc" => Token::Func(Func::Iocc),
        "p" => Token::Func(Func::P),
        "a" => Token::Func(Func::A),
        "ref" => Token::Func(Func::Ref),
        "l" => Token::Func(Func::L),
        "npost" => Token::Func(Func::Npost),

        "mpl" => Token::Mode { heading: 'p', upper: false },
        "mpu" => Token::Mode { heading: 'p', upper: true },
        "mhl" => Token::Mode { heading: 'h', upper: false },
        "mhu" => Token::Mode { heading: 'h', upper: true },
        "mdl" => Token::Mode { heading: 'd', upper: false },
        "mdu" => Token::Mode { heading: 'd', upper: true },

        _ => return None,
    };
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(_, t)| t)
            .collect()
    }

    #[test]
    fn literals_and_punctuation() {
        assert_eq!(
            lex(r#""cond", 'incond', |rep|"#),
            vec![
                Token::CondLit("cond".into()),
                Token::Comma,
                Token::IncondLit("incond".into()),
                Token::Comma,
                Token::RepLit("rep".into()),
            ]
        );
    }

    #[test]
    fn field_with_attributes() {
        let tokens = lex("v70^a[2..LAST]*2.5(3,1)");
        let Token::Field(field) = &tokens[0] else {
            panic!("expected field, got {tokens:?}");
        };
        assert_eq!(field.tag, 70);
        assert_eq!(field.kind, FieldKind::Data);
        assert_eq!(field.subfield, Some('a'));
        assert_eq!(
            field.occurrence,
            Some((OccBound::Num(2), Some(OccBound::Last)))
        );
        assert_eq!(field.slicer, Some((2, Some(5))));
        assert_eq!(field.alignment, Some((3, 1)));
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn dummy_fields_and_variable_bounds() {
        let tokens = lex("n10 d20 v30[e1..e2]");
        assert!(matches!(&tokens[0], Token::Field(f) if f.kind == FieldKind::DummyAbsent));
        assert!(matches!(&tokens[1], Token::Field(f) if f.kind == FieldKind::DummyPresent));
        let Token::Field(field) = &tokens[2] else {
            panic!();
        };
        assert_eq!(
            field.occurrence,
            Some((
                OccBound::Var("e1".into()),
                Some(OccBound::Var("e2".into()))
            ))
        );
    }

    #[test]
    fn field_before_group_paren() {
        // `(` after a field only binds as alignment when it holds digits
        let tokens = lex("(v90)");
        assert_eq!(tokens[0], Token::LParen);
        assert!(matches!(tokens[1], Token::Field(_)));
        assert_eq!(tokens[2], Token::RParen);
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex("42 3.5 1e3 .5"),
            vec![
                Token::Integer(42),
                Token::Float(3.5),
                Token::Float(1000.0),
                Token::Float(0.5),
            ]
        );
    }

    #[test]
    fn keywords_functions_and_modes() {
        assert_eq!(
            lex("if p(v10) then mdu fi"),
            vec![
                Token::Keyword(Keyword::If),
                Token::Func(Func::P),
                Token::LParen,
                Token::Field(FieldToken {
                    kind: FieldKind::Data,
                    tag: 10,
                    subfield: None,
                    occurrence: None,
                    slicer: None,
                    alignment: None,
                }),
                Token::RParen,
                Token::Keyword(Keyword::Then),
                Token::Mode { heading: 'd', upper: true },
                Token::Keyword(Keyword::Fi),
            ]
        );
    }

    #[test]
    fn variables_spacers_and_mfn() {
        assert_eq!(
            lex("s1 := e2 x3 c10 mfn mfn(5)"),
            vec![
                Token::SVar("s1".into()),
                Token::Assign,
                Token::EVar("e2".into()),
                Token::XSpacer(3),
                Token::CSpacer(10),
                Token::Mfn(6),
                Token::Mfn(5),
            ]
        );
    }

    #[test]
    fn operators_and_db_selection() {
        assert_eq!(
            lex("<> <= >= < > = := : ->other"),
            vec![
                Token::NotEqual,
                Token::LessEqual,
                Token::GreaterEqual,
                Token::Less,
                Token::Greater,
                Token::Equal,
                Token::Assign,
                Token::Colon,
                Token::DbSelect("other".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(lex("42 /* noise / * | */ 7"), vec![Token::Integer(42), Token::Integer(7)]);
    }

    #[test]
    fn errors() {
        assert!(Lexer::new("'open").tokenize().is_err());
        assert!(Lexer::new("nosuchword").tokenize().is_err());
        assert!(Lexer::new("@").tokenize().is_err());
    }
}
