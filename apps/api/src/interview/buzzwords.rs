use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuzzwordEntry {
    pub count: u32,
    /// Turn indices the term was seen in.
    pub sources: BTreeSet<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuzzwordCount {
    pub term: String,
    pub count: u32,
}

/// Per-session term frequency tally. Terms are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct BuzzwordTally {
    terms: BTreeMap<String, BuzzwordEntry>,
}

impl BuzzwordTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: &str, turn_index: u32) {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return;
        }
        let entry = self.terms.entry(term).or_default();
        entry.count += 1;
        entry.sources.insert(turn_index);
    }

    #[cfg(test)]
    pub fn get(&self, term: &str) -> Option<&BuzzwordEntry> {
        self.terms.get(&term.trim().to_lowercase())
    }

    /// Most frequent terms first; equal counts fall back to alphabetical order.
    pub fn top_n(&self, limit: usize) -> Vec<BuzzwordCount> {
        let mut ranked: Vec<_> = self.terms.iter().collect();
        ranked.sort_by_key(|(term, entry)| (Reverse(entry.count), *term));
        ranked
            .into_iter()
            .take(limit)
            .map(|(term, entry)| BuzzwordCount {
                term: term.clone(),
                count: entry.count,
            })
            .collect()
    }
}
