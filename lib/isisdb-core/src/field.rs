use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;

pub const DEFAULT_SUBFIELD_DELIMITER: char = '^';

/// Key of the implicit subfield holding the text before the first delimiter.
pub const IMPLICIT_SUBFIELD: char = '*';

/// A single tagged unit of record content.
///
/// Data may contain subfields introduced by the delimiter character followed
/// by a single alphanumeric key, e.g. `Smith, J.^bEd.`. The part before the
/// first delimiter is the implicit subfield `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: u32,
    pub data: String,
    pub delimiter: char,
}

impl Field {
    pub fn new(tag: u32, data: impl Into<String>) -> Self {
        Self {
            tag,
            data: data.into(),
            delimiter: DEFAULT_SUBFIELD_DELIMITER,
        }
    }

    pub fn with_delimiter(tag: u32, data: impl Into<String>, delimiter: char) -> Self {
        Self {
            tag,
            data: data.into(),
            delimiter,
        }
    }

    /// Split the data into subfields, keyed by their lower-cased marker and
    /// ordered by first appearance. Values of a repeated key accumulate in
    /// appearance order.
    pub fn subfields(&self) -> IndexMap<char, Vec<String>> {
        let mut map: IndexMap<char, Vec<String>> = IndexMap::new();
        let mut pieces = self.data.split(self.delimiter);

        if let Some(head) = pieces.next() {
            if !head.is_empty() {
                map.entry(IMPLICIT_SUBFIELD)
                    .or_default()
                    .push(head.to_owned());
            }
        }
        for piece in pieces {
            let mut chars = piece.chars();
            let Some(marker) = chars.next() else { continue };
            let key = marker.to_ascii_lowercase();
            map.entry(key).or_default().push(chars.as_str().to_owned());
        }
        map
    }

    /// First value of the given subfield key. `*` resolves to the implicit
    /// subfield when present, otherwise to the first subfield in order of
    /// appearance.
    pub fn subfield(&self, key: char) -> Option<String> {
        let map = self.subfields();
        if key == IMPLICIT_SUBFIELD {
            if let Some(values) = map.get(&IMPLICIT_SUBFIELD) {
                return values.first().cloned();
            }
            return map.values().next().and_then(|v| v.first().cloned());
        }
        map.get(&key.to_ascii_lowercase())
            .and_then(|v| v.first().cloned())
    }

    /// One `<field>` element of the inverted-file exchange format.
    pub fn to_xml(&self) -> String {
        let mut subs = String::new();
        for (key, values) in self.subfields() {
            if key == IMPLICIT_SUBFIELD {
                continue;
            }
            for value in values {
                subs.push_str(&format!(
                    "<subfield tag=\"{key}\"><![CDATA[{value}]]></subfield>"
                ));
            }
        }
        format!("<field tag=\"{}\"><occ>{}</occ></field>", self.tag, subs)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Field {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tag
            .cmp(&other.tag)
            .then_with(|| self.data.cmp(&other.data))
    }
}

/// An ordered sequence of same-tag fields (a repeatable field).
///
/// Indexing at the language surface is 1-based: occurrence `0` is the empty
/// field, slice `[0:n]` coerces to `[1:n]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldContainer {
    pub tag: u32,
    fields: Vec<Field>,
}

impl FieldContainer {
    pub fn new(tag: u32) -> Self {
        Self {
            tag,
            fields: Vec::new(),
        }
    }

    pub fn from_fields(tag: u32, fields: Vec<Field>) -> Self {
        Self { tag, fields }
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 1-based occurrence access; occurrence 0 or out of range is `None`.
    pub fn occurrence(&self, occ: usize) -> Option<&Field> {
        occ.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    /// 1-based inclusive slice; a zero begin coerces to 1.
    pub fn slice(&self, begin: usize, end: usize) -> &[Field] {
        if begin == 0 && end == 0 {
            return &[];
        }
        let begin = begin.max(1) - 1;
        let end = end.min(self.fields.len());
        if begin >= end {
            return &[];
        }
        &self.fields[begin..end]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn remove(&mut self, occ: usize) -> Option<Field> {
        occ.checked_sub(1)
            .filter(|&i| i < self.fields.len())
            .map(|i| self.fields.remove(i))
    }

    /// Concatenated data of every occurrence.
    pub fn data(&self) -> String {
        self.fields.iter().map(|f| f.data.as_str()).collect()
    }

    pub fn to_xml(&self) -> String {
        let occs: String = self
            .fields
            .iter()
            .map(|field| {
                let mut subs = String::new();
                for (key, values) in field.subfields() {
                    if key == IMPLICIT_SUBFIELD {
                        continue;
                    }
                    for value in values {
                        subs.push_str(&format!(
                            "<subfield tag=\"{key}\"><![CDATA[{value}]]></subfield>"
                        ));
                    }
                }
                format!("<occ>{subs}</occ>")
            })
            .collect();
        format!("<field tag=\"{}\">{}</field>", self.tag, occs)
    }
}

impl<'a> IntoIterator for &'a FieldContainer {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subfield_extraction() {
        let field = Field::new(70, "Smith, J.^bEd.^battr^zKw");
        let subs = field.subfields();
        assert_eq!(
            subs.get(&IMPLICIT_SUBFIELD).unwrap(),
            &vec!["Smith, J.".to_owned()]
        );
        assert_eq!(subs.get(&'b').unwrap(), &vec!["Ed.".to_owned(), "attr".to_owned()]);
        assert_eq!(field.subfield('b').as_deref(), Some("Ed."));
        assert_eq!(field.subfield('z').as_deref(), Some("Kw"));
        assert_eq!(field.subfield('q'), None);
    }

    #[test]
    fn star_subfield() {
        let with_head = Field::new(10, "head^arest");
        assert_eq!(with_head.subfield('*').as_deref(), Some("head"));

        let no_head = Field::new(10, "^afirst^bsecond");
        assert_eq!(no_head.subfield('*').as_deref(), Some("first"));
    }

    #[test]
    fn subfield_keys_fold_case() {
        let field = Field::new(24, "^AUpper");
        assert_eq!(field.subfield('a').as_deref(), Some("Upper"));
    }

    #[test]
    fn container_indexing_is_one_based() {
        let container = FieldContainer::from_fields(
            90,
            vec![
                Field::new(90, "alpha"),
                Field::new(90, "beta"),
                Field::new(90, "gamma"),
            ],
        );
        assert!(container.occurrence(0).is_none());
        assert_eq!(container.occurrence(1).unwrap().data, "alpha");
        assert_eq!(container.occurrence(3).unwrap().data, "gamma");
        assert!(container.occurrence(4).is_none());

        assert!(container.slice(0, 0).is_empty());
        let mid = container.slice(0, 2);
        assert_eq!(mid.len(), 2);
        assert_eq!(mid[1].data, "beta");
        assert_eq!(container.slice(2, 9).len(), 2);
        assert_eq!(container.data(), "alphabetagamma");
    }

    #[test]
    fn ordering_by_tag_then_data() {
        let a = Field::new(10, "x");
        let b = Field::new(10, "y");
        let c = Field::new(20, "a");
        assert!(a < b);
        assert!(b < c);
    }
}
