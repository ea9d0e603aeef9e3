use anyhow::{Context, Result};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::core::text::trim;

/// Separator between question and answer on each line.
pub const DELIMITER: char = '|';

/// A question and its answer, both trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeEntry {
    pub question: String,
    pub answer: String,
}

/// Question -> answer pairs loaded once from a `question|answer` file.
///
/// Questions are identified case-insensitively: the map is keyed by the
/// lowercased question, and iteration runs in ascending order of that key.
/// Matching relies on this order to break ties.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    entries: BTreeMap<String, KnowledgeEntry>,
}

impl KnowledgeStore {
    /// Reads the knowledge file.
    ///
    /// Each line is split at the first `|`, both sides are trimmed, and a later
    /// line for the same question replaces the answer while the first spelling
    /// of the question is kept. Lines without `|` are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open knowledge file {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut store = Self::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .with_context(|| format!("cannot read knowledge file {}", path.display()))?;
            if read == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            if let Some((question, answer)) = line.split_once(DELIMITER) {
                store.insert(trim(question), trim(answer));
            }
        }

        log::info!("📚 Loaded {} entries from {}", store.len(), path.display());
        Ok(store)
    }

    /// Like [`load`](Self::load), but an unreadable file is reported and
    /// yields an empty store.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                log::warn!("⚠️ {:#}; starting with an empty knowledge base", e);
                eprintln!("Warning: {:#}. Starting with an empty knowledge base.", e);
                Self::default()
            }
        }
    }

    pub fn insert(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        let question = question.into();
        let answer = answer.into();
        match self.entries.entry(question.to_lowercase()) {
            Entry::Occupied(mut slot) => slot.get_mut().answer = answer,
            Entry::Vacant(slot) => {
                slot.insert(KnowledgeEntry { question, answer });
            }
        }
    }

    /// Answer for `question`, compared case-insensitively.
    pub fn get(&self, question: &str) -> Option<&str> {
        self.entries
            .get(&question.to_lowercase())
            .map(|entry| entry.answer.as_str())
    }

    /// Entries in ascending order of the lowercased question.
    pub fn iter(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<Q: Into<String>, A: Into<String>> FromIterator<(Q, A)> for KnowledgeStore {
    fn from_iter<I: IntoIterator<Item = (Q, A)>>(iter: I) -> Self {
        let mut store = Self::default();
        for (question, answer) in iter {
            store.insert(question, answer);
        }
        store
    }
}
