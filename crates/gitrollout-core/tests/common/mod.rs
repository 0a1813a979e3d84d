#![allow(dead_code)]
use gitrollout_core::{CommitId, RefCategory, RefName, RefSet};

/// Commit id made of one repeated hex digit, e.g. `commit('a')`.
pub fn commit(digit: char) -> CommitId {
    CommitId::parse(digit.to_string().repeat(40)).expect("valid test commit")
}

pub fn name(raw: &str) -> RefName {
    RefName::new(raw).expect("valid test ref name")
}

/// Builds a branch snapshot from `(name, digit)` pairs.
pub fn branches(entries: &[(&str, char)]) -> RefSet {
    refs(RefCategory::Branch, entries)
}

pub fn refs(category: RefCategory, entries: &[(&str, char)]) -> RefSet {
    RefSet::from_entries(
        category,
        entries.iter().map(|(n, c)| (name(n), commit(*c))),
    )
    .expect("unique test refs")
}
