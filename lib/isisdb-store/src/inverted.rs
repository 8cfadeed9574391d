//! Contract with the inverted-file backend.
//!
//! The store itself never walks the index structure; the formatting
//! language's `l()` and `npost()` only need key lookups, posting counts and
//! the first posting's MFN. Keys are folded the way the indexer folds them:
//! upper-cased and truncated to sixty characters.

use std::collections::HashMap;

pub const MAX_KEY_LEN: usize = 60;

/// One posting of a key in the inverted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub mfn: u32,
    pub extraction_id: u32,
    pub occ: u32,
    pub offset: u32,
    pub technique: u32,
    pub field_tag: u32,
}

/// Fold a search key into its stored form.
pub fn fold_key(key: &str) -> String {
    let folded: String = key.trim().to_uppercase();
    folded.chars().take(MAX_KEY_LEN).collect::<String>().trim_end().to_owned()
}

/// Key-to-posting-list store backing `l()` and `npost()`.
pub trait InvertedIndex {
    /// All postings for a key, in indexing order.
    fn lookup(&self, key: &str) -> Vec<Posting>;

    fn count(&self, key: &str) -> usize {
        self.lookup(key).len()
    }

    /// MFN of the first posting, or 0 when the key is absent.
    fn first_mfn(&self, key: &str) -> u32 {
        self.lookup(key).first().map(|p| p.mfn).unwrap_or(0)
    }
}

/// Simple in-memory index, useful in tests and as a building block for
/// external indexers.
#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    postings: HashMap<String, Vec<Posting>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, posting: Posting) {
        self.postings.entry(fold_key(key)).or_default().push(posting);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }
}

impl InvertedIndex for MemoryIndex {
    fn lookup(&self, key: &str) -> Vec<Posting> {
        self.postings.get(&fold_key(key)).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(mfn: u32) -> Posting {
        Posting {
            mfn,
            extraction_id: 1,
            occ: 1,
            offset: 0,
            technique: 0,
            field_tag: 24,
        }
    }

    #[test]
    fn key_folding() {
        assert_eq!(fold_key("  plantas "), "PLANTAS");
        let long = "x".repeat(80);
        assert_eq!(fold_key(&long).len(), MAX_KEY_LEN);
    }

    #[test]
    fn lookup_and_count() {
        let mut index = MemoryIndex::new();
        index.insert("plantas", posting(3));
        index.insert("Plantas", posting(9));

        assert_eq!(index.count("PLANTAS"), 2);
        assert_eq!(index.first_mfn("plantas"), 3);
        assert_eq!(index.first_mfn("animales"), 0);
    }
}
