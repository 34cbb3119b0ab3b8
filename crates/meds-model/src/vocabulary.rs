//! Token vocabulary shared by all tokenizers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MedsError, Result};

pub const UNKNOWN_TOKEN: &str = "<unknown>";
pub const START_TOKEN: &str = "<start>";
pub const END_TOKEN: &str = "<end>";
pub const EVENT_START: &str = "<event>";
pub const EVENT_END: &str = "</event>";
pub const NUMERIC_START: &str = "<numeric>";
pub const NUMERIC_END: &str = "</numeric>";
pub const TEXT_START: &str = "<text>";
pub const TEXT_END: &str = "</text>";

/// One row of the persisted vocabulary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub token: i64,
    #[serde(rename = "str")]
    pub text: String,
    pub count: i64,
}

/// Dense `token string <-> id` mapping with observed counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
    index: HashMap<String, i64>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A vocabulary holding only the given special tokens at ids `0..n`.
    pub fn with_specials<S: AsRef<str>>(specials: &[S]) -> Self {
        let mut vocab = Self::new();
        for special in specials {
            vocab.insert(special.as_ref(), 0);
        }
        vocab
    }

    /// Restores a vocabulary from persisted rows.
    ///
    /// Rows may arrive in any order but ids must be dense from zero and token
    /// strings must be unique.
    pub fn from_entries(mut entries: Vec<VocabEntry>) -> Result<Self> {
        entries.sort_by_key(|entry| entry.token);
        let mut vocab = Self::new();
        for (position, entry) in entries.into_iter().enumerate() {
            if entry.token != position as i64 {
                return Err(MedsError::config(format!(
                    "vocabulary ids must be dense from 0; expected {position}, found {}",
                    entry.token
                )));
            }
            if vocab.index.contains_key(&entry.text) {
                return Err(MedsError::config(format!(
                    "duplicate vocabulary token '{}'",
                    entry.text
                )));
            }
            vocab.index.insert(entry.text.clone(), entry.token);
            vocab.entries.push(entry);
        }
        Ok(vocab)
    }

    /// Appends a token and returns its id; an existing token keeps its id.
    pub fn insert(&mut self, text: &str, count: i64) -> i64 {
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        let id = self.entries.len() as i64;
        self.entries.push(VocabEntry {
            token: id,
            text: text.to_string(),
            count,
        });
        self.index.insert(text.to_string(), id);
        id
    }

    pub fn set_count(&mut self, text: &str, count: i64) {
        if let Some(&id) = self.index.get(text) {
            self.entries[id as usize].count = count;
        }
    }

    pub fn id(&self, text: &str) -> Option<i64> {
        self.index.get(text).copied()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.index.contains_key(text)
    }

    pub fn token(&self, id: i64) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.entries.get(idx))
            .map(|entry| entry.text.as_str())
    }

    pub fn count(&self, text: &str) -> Option<i64> {
        self.id(text).map(|id| self.entries[id as usize].count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    /// Maps ids back to token strings, reporting every id that is out of range.
    pub fn lookup_all(&self, ids: &[i64]) -> Result<Vec<&str>> {
        let invalid: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|&id| self.token(id).is_none())
            .collect();
        if !invalid.is_empty() {
            return Err(MedsError::InvalidTokenIds {
                ids: invalid,
                vocab_size: self.len(),
            });
        }
        Ok(ids.iter().filter_map(|&id| self.token(id)).collect())
    }
}
