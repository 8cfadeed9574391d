//! `proc(...)`: the record-mutation sub-language. The enclosed format is
//! evaluated to text, then scanned for commands, applied grouped by kind:
//! gizmo substitution, splitting, deletion, addition, padded addition.
//! Character sequences that match no command are ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use isisdb_core::field::Field;
use isisdb_core::record::FieldEntry;

use super::{eval_plain, value_of, Context, Expr, Expression, Flow, Result, Sequence};
use crate::value::Value;

/// `g<file>,<tag>[,<tag>...]`; file names accept `[A-Za-z0-9./_-]`.
static GIZMO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[gG]([A-Za-z0-9./_-]+?)((?:,\d+)+)").expect("static pattern"));
/// `gsplit[/clean]=<tag>=<char>`.
static GSPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)[gG]split(/clean)?=(\d+)=(.)").expect("static pattern"));
/// `d<tag>/<occ>`, `d<tag>`, `d*`.
static DELETE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[dD](\d+)/(\d+)|[dD](\d+)|[dD]\*").expect("static pattern"));
/// `a<tag><separator><value>`; the value runs to the next add or
/// heading-add command, or to the end of the text.
static ADD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[aA](\d+)[ \t=|]").expect("static pattern"));
/// `h<tag> <width> <value>`; the value is bounded like an add value.
static HADD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[hH]\s*(\d+)\s+(\d+)\s+").expect("static pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct Proc {
    pub body: Sequence,
}

impl Proc {
    fn rewrite_tag(ctx: &mut Context<'_>, tag: u32, rewrite: impl Fn(&str) -> String) {
        let Some(entry) = ctx.record.get(tag).cloned() else {
            return;
        };
        match entry {
            FieldEntry::Single(field) => ctx.record.set(tag, rewrite(&field.data)),
            FieldEntry::Repeated(container) => {
                let values: Vec<String> =
                    container.iter().map(|field| rewrite(&field.data)).collect();
                ctx.record.set(tag, values);
            }
        }
    }

    fn apply(&self, ctx: &mut Context<'_>, commands: &str) -> Result<()> {
        for caps in GIZMO.captures_iter(commands) {
            let file = &caps[1];
            let pairs = match ctx.db.gizmo(file) {
                Ok(pairs) => pairs,
                Err(err) => {
                    debug!(file, %err, "gizmo database unavailable");
                    continue;
                }
            };
            for tag in caps[2].split(',').filter(|t| !t.is_empty()) {
                let Ok(tag) = tag.parse::<u32>() else { continue };
                Self::rewrite_tag(ctx, tag, |data| {
                    let mut data = data.to_owned();
                    for (from, to) in &pairs {
                        if !from.is_empty() {
                            data = data.replace(from, to);
                        }
                    }
                    data
                });
            }
        }

        for caps in GSPLIT.captures_iter(commands) {
            let clean = caps.get(1).is_some();
            let Ok(tag) = caps[2].parse::<u32>() else { continue };
            let separator = caps[3].chars().next().unwrap_or(' ');
            Self::rewrite_tag(ctx, tag, |data| {
                data.split(separator)
                    .map(|piece| if clean { piece.trim() } else { piece })
                    .collect()
            });
        }

        for caps in DELETE.captures_iter(commands) {
            if let (Some(tag), Some(occ)) = (caps.get(1), caps.get(2)) {
                let (Ok(tag), Ok(occ)) = (tag.as_str().parse(), occ.as_str().parse()) else {
                    continue;
                };
                ctx.record.remove_occurrence(tag, occ);
            } else if let Some(tag) = caps.get(3) {
                if let Ok(tag) = tag.as_str().parse() {
                    ctx.record.remove(tag);
                }
            } else {
                ctx.record.clear();
                break;
            }
        }

        let adds = scan_adds(commands);
        for (cmd, value) in &adds {
            if let AddCmd::Plain { tag } = cmd {
                ctx.record.add_occurrence(Field::new(*tag, value.clone()));
            }
        }
        for (cmd, value) in &adds {
            if let AddCmd::Padded { tag, width } = cmd {
                let value = format!("{value:<width$}", width = *width);
                ctx.record.add_occurrence(Field::new(*tag, value));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddCmd {
    Plain { tag: u32 },
    Padded { tag: u32, width: usize },
}

/// Every add-style command with its value, in textual order. A value
/// cannot be captured by one regex (it runs until the *next* command), so
/// the command heads bound each other: a value ends where the next head
/// begins, trimmed of the whitespace separating the two, or at the end of
/// the text.
fn scan_adds(commands: &str) -> Vec<(AddCmd, String)> {
    let mut heads: Vec<(usize, usize, AddCmd)> = Vec::new();
    for caps in ADD.captures_iter(commands) {
        let (Some(all), Ok(tag)) = (caps.get(0), caps[1].parse()) else {
            continue;
        };
        heads.push((all.start(), all.end(), AddCmd::Plain { tag }));
    }
    for caps in HADD.captures_iter(commands) {
        let (Some(all), Ok(tag), Ok(width)) = (caps.get(0), caps[1].parse(), caps[2].parse())
        else {
            continue;
        };
        heads.push((all.start(), all.end(), AddCmd::Padded { tag, width }));
    }
    heads.sort_unstable_by_key(|&(start, _, _)| start);

    let mut found = Vec::with_capacity(heads.len());
    for (i, &(_, value_begin, cmd)) in heads.iter().enumerate() {
        let end = heads
            .get(i + 1)
            .map(|&(next_start, _, _)| next_start)
            .unwrap_or(commands.len());
        let mut value = &commands[value_begin.min(end)..end];
        if end < commands.len() {
            value = value.trim_end();
        }
        found.push((cmd, value.to_owned()));
    }
    found
}

impl Expression for Proc {
    fn eval(&self, ctx: &mut Context<'_>) -> Result<Flow> {
        let commands =
            value_of!(eval_plain(&Expr::Sequence(self.body.clone()), ctx)?).to_string();
        debug!(commands = %commands, "proc evaluation");
        self.apply(ctx, &commands)?;
        Ok(Flow::Done(Value::empty()))
    }
}
