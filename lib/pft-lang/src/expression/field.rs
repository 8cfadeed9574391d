//! Field access: occurrence ranges, subfield selection, slicing, alignment,
//! repeatable-literal composition and mode decoration.

use once_cell::sync::Lazy;
use regex::Regex;

use isisdb_core::field::Field;
use isisdb_core::record::{FieldEntry, Record};

use super::{Context, Error, Expression, Flow, Mode, Result};
use crate::value::Value;

static FILING: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(.+?)=.+?>").expect("static pattern"));
static ANGLES: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(.+?)>").expect("static pattern"));

/// `v` renders, `d` and `n` are dummy descriptors driving conditional
/// literals without producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Data,
    DummyPresent,
    DummyAbsent,
}

impl FieldKind {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'v' => Some(Self::Data),
            'd' => Some(Self::DummyPresent),
            'n' => Some(Self::DummyAbsent),
            _ => None,
        }
    }
}

/// An occurrence bound: a number, `LAST`, or an `E`-variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccBound {
    Num(usize),
    Last,
    Var(String),
}

impl OccBound {
    fn resolve(&self, len: usize, ctx: &Context<'_>) -> Result<usize> {
        match self {
            OccBound::Num(n) => Ok(*n),
            OccBound::Last => Ok(len),
            OccBound::Var(name) => {
                let key = name.to_uppercase();
                let value = ctx
                    .vars
                    .get(&key)
                    .ok_or_else(|| Error::UnknownVariable(key.clone()))?;
                Ok(value.as_int()?.max(0) as usize)
            }
        }
    }
}

/// Everything the `v<tag>` token family carries.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelector {
    pub kind: FieldKind,
    pub tag: u32,
    pub subfield: Option<char>,
    pub occurrence: Option<(OccBound, Option<OccBound>)>,
    /// Character slice: 0-based start, optional length.
    pub slicer: Option<(usize, Option<usize>)>,
    /// Indent of the first line and of continuation lines.
    pub alignment: Option<(usize, usize)>,
}

impl FieldSelector {
    pub fn new(kind: FieldKind, tag: u32) -> Self {
        Self {
            kind,
            tag,
            subfield: None,
            occurrence: None,
            slicer: None,
            alignment: None,
        }
    }

    fn slice(&self, data: &str) -> String {
        match self.slicer {
            None => data.to_owned(),
            Some((begin, len)) => {
                let chars = data.chars().skip(begin);
                match len {
                    Some(len) => chars.take(len).collect(),
                    None => chars.collect(),
                }
            }
        }
    }

    fn project(&self, field: &Field) -> Option<String> {
        let data = match self.subfield {
            Some(key) => field.subfield(key)?,
            None => field.data.clone(),
        };
        Some(self.slice(&data))
    }

    /// The occurrence texts this selector resolves to against a record, in
    /// order. Empty when the tag is missing or the selection runs dry.
    pub fn occurrence_texts(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let Some(entry) = ctx.record.get(self.tag) else {
            return Ok(Vec::new());
        };

        let selected: Vec<&Field> = match (&self.occurrence, entry) {
            (Some((begin, end)), FieldEntry::Repeated(container)) => {
                let len = container.len();
                let begin_n = begin.resolve(len, ctx)?;
                match end {
                    Some(end) => {
                        let end_n = end.resolve(len, ctx)?;
                        container.slice(begin_n, end_n).iter().collect()
                    }
                    None => container.occurrence(begin_n).into_iter().collect(),
                }
            }
            (Some((begin, _)), FieldEntry::Single(field)) => {
                if begin.resolve(1, ctx)? == 1 {
                    vec![field]
                } else {
                    Vec::new()
                }
            }
            (None, entry) if ctx.occ > 0 => match entry {
                FieldEntry::Repeated(container) => {
                    container.occurrence(ctx.occ).into_iter().collect()
                }
                FieldEntry::Single(field) if ctx.occ == 1 => vec![field],
                FieldEntry::Single(_) => Vec::new(),
            },
            (None, entry) => entry.occurrences(),
        };

        Ok(selected
            .into_iter()
            .filter_map(|field| self.project(field))
            .collect())
    }

    /// True when the selection yields any text.
    pub fn is_present(&self, ctx: &Context<'_>) -> Result<bool> {
        Ok(self
            .occurrence_texts(ctx)?
            .iter()
            .any(|text| !text.is_empty()))
    }

    fn container_len(&self, record: &Record) -> usize {
        record
            .get(self.tag)
            .map(|entry| entry.occurrence_count())
            .unwrap_or(0)
    }
}

/// A repeatable literal attached to a field; `plus` suppresses it on the
/// outer boundary (first occurrence for prefixes, last for suffixes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatLit {
    pub text: String,
    pub plus: bool,
}

/// A field reference with its attached decoration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExpr {
    pub sel: FieldSelector,
    pub prefix: Option<RepeatLit>,
    pub suffix: Option<RepeatLit>,
    /// Conditional literal bound after the field; emitted once, after the
    /// last occurrence, only when the field produced text.
    pub cond_suffix: Option<String>,
}

impl FieldExpr {
    pub fn bare(sel: FieldSelector) -> Self {
        Self {
            sel,
            prefix: None,
            suffix: None,
            cond_suffix: None,
        }
    }

    /// Compose the final text: per-occurrence decoration, repeatable
    /// literals with boundary suppression, mode decoration, the
    /// conditional suffix, and data-mode closing.
    fn compose(&self, ctx: &Context<'_>) -> Result<String> {
        let occs = self.sel.occurrence_texts(ctx)?;
        if occs.iter().all(|o| o.is_empty()) {
            return Ok(String::new());
        }

        // boundary bookkeeping must look at the whole container even when a
        // repeatable group narrows the selection to one occurrence
        let (first_occ, last_occ) = if ctx.occ > 0 && self.sel.occurrence.is_none() {
            let len = self.sel.container_len(ctx.record);
            (ctx.occ == 1, ctx.occ >= len)
        } else {
            (true, true)
        };

        let total = occs.len();
        let mut out = String::new();
        for (i, occ_text) in occs.iter().enumerate() {
            let mut text = occ_text.clone();
            if ctx.mode != Mode::Proof {
                text = decorate_mode(
                    &text,
                    ctx.db.subfield_delimiter(),
                    self.prefix.as_ref().map(|l| l.text.as_str()),
                );
            }
            if ctx.mode == Mode::Data && !text.is_empty() {
                if !text.ends_with(['.', ',', ';']) {
                    text.push('.');
                }
                text.push_str("  ");
            }

            if let Some(prefix) = &self.prefix {
                let at_leading_boundary = i == 0 && first_occ;
                if !(prefix.plus && at_leading_boundary) {
                    text = format!("{}{}", prefix.text, text);
                }
            }
            if let Some(suffix) = &self.suffix {
                let at_trailing_boundary = i + 1 == total && last_occ;
                if !(suffix.plus && at_trailing_boundary) {
                    text.push_str(&suffix.text);
                }
            }
            if i + 1 == total && last_occ {
                if let Some(cond) = &self.cond_suffix {
                    text.push_str(&ctx.fold_case(cond.clone()));
                }
            }
            out.push_str(&text);
        }

        Ok(ctx.fold_case(out))
    }
}

impl FieldExpr {
    /// For dummy descriptors the attached conditional suffix still follows
    /// the dummy's rule: present for `d`, absent for `n`.
    fn dummy_suffix(&self, ctx: &mut Context<'_>) -> Result<Option<String>> {
        let Some(text) = &self.cond_suffix else {
            return Ok(None);
        };
        let present = self.sel.is_present(ctx)?;
        let active = match self.sel.kind {
            FieldKind::DummyPresent => present,
            FieldKind::DummyAbsent => !present,
            FieldKind::Data => false,
        };
        Ok(active.then(|| ctx.fold_case(text.clone())))
    }
}

impl Expression for FieldExpr {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        if self.sel.kind != FieldKind::Data {
            let suffix = self.dummy_suffix(ctx)?.unwrap_or_default();
            return Ok(Flow::Done(Value::Str(suffix)));
        }
        self.compose(ctx).map(|text| Flow::Done(Value::Str(text)))
    }

    fn format(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        if self.sel.kind != FieldKind::Data {
            ctx.last_field_present = Some(true);
            if let Some(suffix) = self.dummy_suffix(ctx)? {
                ctx.workarea.emit(&suffix);
            }
            return Ok(Flow::empty());
        }

        let text = self.compose(ctx)?;
        ctx.last_field_present = Some(!text.is_empty());
        if text.is_empty() {
            return Ok(Flow::empty());
        }

        if ctx.plain {
            ctx.workarea.push_raw(&text);
            return Ok(Flow::empty());
        }

        let (first, next) = self.sel.alignment.unwrap_or((0, 0));
        let width = ctx.workarea.max_width.saturating_sub(1);
        if next >= width && width != 0 {
            // an indent wider than the window can never converge
            return Ok(Flow::empty());
        }
        ctx.workarea.emit_field(&text, first, next);
        Ok(Flow::empty())
    }

    fn max_repeat(&self, record: &Record) -> usize {
        record
            .get(self.sel.tag)
            .map(|entry| entry.occurrence_count())
            .unwrap_or(0)
    }
}

/// Heading/data decoration of raw field text: the first filing pattern
/// `<key=value>` replaces every angle group with `key`; subfield markers
/// become punctuation; angle delimiters are dropped.
fn decorate_mode(text: &str, delimiter: char, prefix_lit: Option<&str>) -> String {
    let mut text = text.to_owned();
    if let Some(caps) = FILING.captures(&text) {
        let key = caps[1].to_owned();
        text = ANGLES.replace_all(&text, key.as_str()).into_owned();
    }
    text = text.replace("><", "; ");

    // leading subfield marker disappears
    let stripped = {
        let mut it = text.chars();
        if it.next() == Some(delimiter) && it.next().is_some_and(|c| c.is_alphanumeric()) {
            Some(it.collect::<String>())
        } else {
            None
        }
    };
    if let Some(s) = stripped {
        text = s;
    }

    let a_replacement = prefix_lit.unwrap_or(": ").to_owned();
    let mut out = String::with_capacity(text.len());
    let mut iter = text.chars().peekable();
    while let Some(c) = iter.next() {
        if c == delimiter {
            match iter.peek() {
                Some(&key) if key.is_alphanumeric() => {
                    iter.next();
                    match key.to_ascii_lowercase() {
                        'a' => out.push_str(&a_replacement),
                        'b'..='i' => out.push_str(", "),
                        _ => out.push_str(". "),
                    }
                }
                _ => out.push(c),
            }
        } else if c != '<' && c != '>' {
            out.push(c);
        }
    }
    out
}

/// `p(v<N>)` / `a(v<N>)`: field present or absent.
#[derive(Debug, Clone, PartialEq)]
pub struct BoolFunc {
    pub negate: bool,
    pub sel: FieldSelector,
}

impl Expression for BoolFunc {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let present = self.sel.is_present(ctx)?;
        Ok(Flow::Done(Value::Bool(present != self.negate)))
    }

    fn max_repeat(&self, record: &Record) -> usize {
        record
            .get(self.sel.tag)
            .map(|entry| entry.occurrence_count())
            .unwrap_or(0)
    }
}

/// `nocc(v<N>)`: occurrence count of a field, or presence of a subfield.
#[derive(Debug, Clone, PartialEq)]
pub struct Nocc {
    pub sel: FieldSelector,
}

impl Expression for Nocc {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let count = match (ctx.record.get(self.sel.tag), self.sel.subfield) {
            (None, _) => 0,
            (Some(_), Some(_)) => {
                if self.sel.is_present(ctx)? {
                    1
                } else {
                    0
                }
            }
            (Some(entry), None) => entry.occurrence_count(),
        };
        Ok(Flow::Done(Value::Int(count as i64)))
    }
}
