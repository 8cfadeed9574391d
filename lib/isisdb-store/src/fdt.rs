//! Field-definition table (`.fdt`) loading. The store only consumes the
//! name-to-tag mapping; richer FDT semantics belong to outer tooling.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::Result;

static FDT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<name>\w[\w\s]*?\w)\s+(?P<subfields>\w*)\s+(?P<tag>\d*)\s+(?P<size>\d*)\s+(?P<etype>\d+)\s+(?P<repeat>\d+)",
    )
    .expect("static pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdtEntry {
    pub name: String,
    pub subfields: String,
    pub tag: u32,
    pub size: u32,
    pub etype: u32,
    pub repeatable: bool,
}

/// Parsed field-definition table.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    entries: Vec<FdtEntry>,
    by_name: HashMap<String, usize>,
    by_tag: HashMap<u32, usize>,
}

impl FieldTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let table = Self::parse(&raw);
        debug!(path = %path.display(), fields = table.entries.len(), "loaded field table");
        Ok(table)
    }

    pub fn parse(raw: &str) -> Self {
        let mut table = Self::default();
        for line in raw.lines() {
            let line = line.trim();
            let Some(caps) = FDT_LINE.captures(line) else {
                continue;
            };
            let (Ok(tag), Ok(etype), Ok(repeat)) = (
                caps["tag"].parse::<u32>(),
                caps["etype"].parse::<u32>(),
                caps["repeat"].parse::<u32>(),
            ) else {
                continue;
            };
            let entry = FdtEntry {
                name: caps["name"].to_owned(),
                subfields: caps["subfields"].to_owned(),
                tag,
                size: caps["size"].parse().unwrap_or(0),
                etype,
                repeatable: repeat != 0,
            };
            let idx = table.entries.len();
            table.by_name.insert(entry.name.clone(), idx);
            table.by_tag.insert(entry.tag, idx);
            table.entries.push(entry);
        }
        table
    }

    pub fn tag_for_name(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).map(|&i| self.entries[i].tag)
    }

    pub fn by_tag(&self, tag: u32) -> Option<&FdtEntry> {
        self.by_tag.get(&tag).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[FdtEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lines() {
        let table = FieldTable::parse(
            "Author    dp  70  100  0  1\n\
             Title         24  200  0  0\n\
             garbage line\n",
        );
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.tag_for_name("Author"), Some(70));
        assert_eq!(table.tag_for_name("Title"), Some(24));
        assert!(table.by_tag(70).unwrap().repeatable);
        assert!(!table.by_tag(24).unwrap().repeatable);
        assert_eq!(table.tag_for_name("Publisher"), None);
    }
}
