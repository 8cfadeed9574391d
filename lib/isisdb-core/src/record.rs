use std::fmt;

use indexmap::IndexMap;

use crate::field::{Field, FieldContainer};

/// On-disk status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordStatus {
    #[default]
    Active,
    LogicallyDeleted,
    PhysicallyDeleted,
}

impl RecordStatus {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            1 => Self::LogicallyDeleted,
            2 => Self::PhysicallyDeleted,
            _ => Self::Active,
        }
    }

    pub fn as_raw(self) -> u16 {
        match self {
            Self::Active => 0,
            Self::LogicallyDeleted => 1,
            Self::PhysicallyDeleted => 2,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::LogicallyDeleted => "logically deleted",
            Self::PhysicallyDeleted => "physically deleted",
        })
    }
}

/// What a record holds under one tag: a single field or a repeatable
/// container. Containers never nest.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEntry {
    Single(Field),
    Repeated(FieldContainer),
}

impl FieldEntry {
    pub fn tag(&self) -> u32 {
        match self {
            Self::Single(f) => f.tag,
            Self::Repeated(c) => c.tag,
        }
    }

    /// Concatenated data of every occurrence under this tag.
    pub fn data(&self) -> String {
        match self {
            Self::Single(f) => f.data.clone(),
            Self::Repeated(c) => c.data(),
        }
    }

    pub fn occurrence_count(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Repeated(c) => c.len(),
        }
    }

    pub fn occurrences(&self) -> Vec<&Field> {
        match self {
            Self::Single(f) => vec![f],
            Self::Repeated(c) => c.iter().collect(),
        }
    }
}

/// Accepted shapes when assigning a tag.
pub enum FieldInput {
    Text(String),
    Field(Field),
    Many(Vec<String>),
}

impl From<&str> for FieldInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Field> for FieldInput {
    fn from(value: Field) -> Self {
        Self::Field(value)
    }
}

impl From<Vec<String>> for FieldInput {
    fn from(value: Vec<String>) -> Self {
        Self::Many(value)
    }
}

impl From<Vec<&str>> for FieldInput {
    fn from(value: Vec<&str>) -> Self {
        Self::Many(value.into_iter().map(str::to_owned).collect())
    }
}

/// An in-memory master-file record: a tag-to-fields mapping preserving the
/// insertion order of first appearance per tag.
///
/// `mfn` is zero until the record is first saved; `mfbwb`/`mfbwp` point at
/// the previous on-disk version of an updated record.
#[derive(Debug, Clone, Default)]
pub struct Record {
    pub mfn: u32,
    pub status: RecordStatus,
    pub mfbwb: u32,
    pub mfbwp: u32,
    fields: IndexMap<u32, FieldEntry>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerce a textual tag key. `"70"` and `"v70"` both resolve to 70;
    /// anything else is left to the caller (FDT name resolution).
    pub fn tag_from_key(key: &str) -> Option<u32> {
        let key = key.strip_prefix(['v', 'V']).unwrap_or(key);
        key.parse().ok()
    }

    pub fn set(&mut self, tag: u32, value: impl Into<FieldInput>) {
        let entry = match value.into() {
            FieldInput::Text(text) => FieldEntry::Single(Field::new(tag, text)),
            FieldInput::Field(mut field) => {
                field.tag = tag;
                FieldEntry::Single(field)
            }
            FieldInput::Many(values) => FieldEntry::Repeated(FieldContainer::from_fields(
                tag,
                values.into_iter().map(|v| Field::new(tag, v)).collect(),
            )),
        };
        self.fields.insert(tag, entry);
    }

    pub fn get(&self, tag: u32) -> Option<&FieldEntry> {
        self.fields.get(&tag)
    }

    pub fn contains(&self, tag: u32) -> bool {
        self.fields.contains_key(&tag)
    }

    pub fn remove(&mut self, tag: u32) -> Option<FieldEntry> {
        self.fields.shift_remove(&tag)
    }

    /// Remove one occurrence (1-based) of a repeatable tag. Removing the
    /// only occurrence removes the tag; a missing tag or occurrence is a
    /// no-op.
    pub fn remove_occurrence(&mut self, tag: u32, occ: usize) {
        enum After {
            Keep,
            Drop,
            Demote(Field),
        }

        let after = match self.fields.get_mut(&tag) {
            Some(FieldEntry::Single(_)) if occ == 1 => After::Drop,
            Some(FieldEntry::Repeated(container)) => {
                container.remove(occ);
                match container.len() {
                    0 => After::Drop,
                    1 => container
                        .occurrence(1)
                        .cloned()
                        .map(After::Demote)
                        .unwrap_or(After::Keep),
                    _ => After::Keep,
                }
            }
            _ => After::Keep,
        };

        match after {
            After::Keep => {}
            After::Drop => {
                self.fields.shift_remove(&tag);
            }
            After::Demote(field) => {
                self.fields.insert(tag, FieldEntry::Single(field));
            }
        }
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Append an occurrence, promoting a single field to a container on
    /// the first repetition.
    pub fn add_occurrence(&mut self, field: Field) {
        let tag = field.tag;
        match self.fields.get_mut(&tag) {
            None => {
                self.fields.insert(tag, FieldEntry::Single(field));
            }
            Some(FieldEntry::Repeated(container)) => container.push(field),
            Some(entry) => {
                let placeholder = FieldEntry::Repeated(FieldContainer::new(tag));
                if let FieldEntry::Single(old) = std::mem::replace(entry, placeholder) {
                    *entry =
                        FieldEntry::Repeated(FieldContainer::from_fields(tag, vec![old, field]));
                }
            }
        }
    }

    /// Build a record from `(tag, data)` pairs in directory order, grouping
    /// contiguous runs of equal tags into containers.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, String)>) -> Self {
        let mut record = Record::new();
        let mut run: Vec<Field> = Vec::new();

        let flush = |record: &mut Record, run: &mut Vec<Field>| {
            match run.len() {
                0 => {}
                1 => {
                    if let Some(field) = run.pop() {
                        record.fields.insert(field.tag, FieldEntry::Single(field));
                    }
                }
                _ => {
                    let tag = run[0].tag;
                    let container = FieldContainer::from_fields(tag, std::mem::take(run));
                    record.fields.insert(tag, FieldEntry::Repeated(container));
                }
            };
        };

        for (tag, data) in pairs {
            if run.last().is_some_and(|f| f.tag != tag) {
                flush(&mut record, &mut run);
            }
            run.push(Field::new(tag, data));
        }
        flush(&mut record, &mut run);
        record
    }

    pub fn update(&mut self, values: impl IntoIterator<Item = (u32, FieldInput)>) {
        for (tag, value) in values {
            self.set(tag, value);
        }
    }

    /// Flattened field sequence in directory order, repeatable occurrences
    /// included.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().flat_map(|entry| match entry {
            FieldEntry::Single(f) => std::slice::from_ref(f).iter(),
            FieldEntry::Repeated(c) => c.iter(),
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = &FieldEntry> {
        self.fields.values()
    }

    pub fn tags(&self) -> impl Iterator<Item = u32> + '_ {
        self.fields.keys().copied()
    }

    /// Number of directory entries this record serializes to.
    pub fn nvf(&self) -> usize {
        self.fields().count()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The inverted-file exchange rendering of the whole record.
    pub fn to_xml(&self) -> String {
        let fields: String = self
            .fields
            .values()
            .map(|entry| match entry {
                FieldEntry::Single(f) => f.to_xml(),
                FieldEntry::Repeated(c) => c.to_xml(),
            })
            .collect();
        format!(
            "<record mfn=\"{}\" status=\"{}\">{}</record>",
            self.mfn, self.status, fields
        )
    }
}

/// Records compare by field content: same tag set, same per-tag
/// concatenated data, same repeatable order.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|((lt, le), (rt, re))| lt == rt && le.data() == re.data())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mfn={} ({})", self.mfn, self.status)?;
        for field in self.fields() {
            write!(f, "\n{}: {}", field.tag, field.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut record = Record::new();
        record.set(70, "Smith, J.");
        record.set(90, vec!["alpha", "beta"]);

        assert_eq!(record.get(70).unwrap().data(), "Smith, J.");
        assert_eq!(record.get(90).unwrap().occurrence_count(), 2);
        assert_eq!(record.nvf(), 3);
        assert!(record.get(10).is_none());
    }

    #[test]
    fn tag_key_coercion() {
        assert_eq!(Record::tag_from_key("70"), Some(70));
        assert_eq!(Record::tag_from_key("v70"), Some(70));
        assert_eq!(Record::tag_from_key("V9"), Some(9));
        assert_eq!(Record::tag_from_key("title"), None);
    }

    #[test]
    fn contiguous_grouping() {
        let record = Record::from_pairs(vec![
            (10, "a".to_owned()),
            (20, "b1".to_owned()),
            (20, "b2".to_owned()),
            (30, "c".to_owned()),
        ]);
        assert_eq!(record.nvf(), 4);
        assert_eq!(record.tags().collect::<Vec<_>>(), vec![10, 20, 30]);
        assert!(matches!(record.get(20), Some(FieldEntry::Repeated(c)) if c.len() == 2));
        assert!(matches!(record.get(30), Some(FieldEntry::Single(_))));
    }

    #[test]
    fn occurrence_removal() {
        let mut record = Record::new();
        record.set(90, vec!["a", "b", "c"]);
        record.remove_occurrence(90, 2);
        assert_eq!(record.get(90).unwrap().data(), "ac");
        record.remove_occurrence(90, 1);
        assert!(matches!(record.get(90), Some(FieldEntry::Single(f)) if f.data == "c"));
        record.remove_occurrence(90, 1);
        assert!(record.get(90).is_none());
    }

    #[test]
    fn promotion_on_repeat() {
        let mut record = Record::new();
        record.add_occurrence(Field::new(70, "one"));
        assert!(matches!(record.get(70), Some(FieldEntry::Single(_))));
        record.add_occurrence(Field::new(70, "two"));
        assert_eq!(record.get(70).unwrap().occurrence_count(), 2);
    }

    #[test]
    fn equality_ignores_mfn() {
        let mut a = Record::new();
        a.set(10, "x");
        let mut b = Record::new();
        b.mfn = 42;
        b.set(10, "x");
        assert_eq!(a, b);
        b.set(10, "y");
        assert_ne!(a, b);
    }
}
