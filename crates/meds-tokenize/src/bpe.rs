//! Byte-pair encoding over serialized subject words.
//!
//! Training starts from single characters, with the last character of each
//! word carrying the end-of-word suffix, and repeatedly merges the most
//! frequent adjacent pair. Each distinct pair in a word adds that word's
//! frequency once, however often the pair repeats inside it. Ties go to the pair seen first when
//! scanning words in first-seen corpus order, left to right, so two runs on
//! the same corpus learn the same merges.
//!
//! Encoding applies learned merges by rank: the earliest-learned applicable
//! pair is merged everywhere in the word, then the search repeats.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use meds_model::vocabulary::UNKNOWN_TOKEN;
use meds_model::{EncodedTimeline, MedsError, Result, SubjectTimeline, Vocabulary};
use meds_transform::{Postprocessor, Preprocessor, load_timelines};

use crate::corpus::for_each_shard;
use crate::serializer::{SerializerOptions, serialize_subject, word_timestamps};

pub type MergePair = (String, String);

/// Distinct words in first-seen order with their corpus frequency.
#[derive(Debug, Clone, Default)]
pub struct WordFrequencies {
    words: Vec<(String, i64)>,
    index: HashMap<String, usize>,
}

impl WordFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, word: &str, count: i64) {
        match self.index.get(word) {
            Some(&slot) => self.words[slot].1 += count,
            None => {
                self.index.insert(word.to_string(), self.words.len());
                self.words.push((word.to_string(), count));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.words.iter().map(|(word, count)| (word.as_str(), *count))
    }
}

fn split_word(word: &str, suffix: &str) -> Vec<String> {
    let mut symbols: Vec<String> = word.chars().map(String::from).collect();
    if let Some(last) = symbols.last_mut() {
        last.push_str(suffix);
    }
    symbols
}

fn merge_pair(symbols: &[String], pair: &MergePair) -> Vec<String> {
    let mut merged = Vec::with_capacity(symbols.len());
    let mut i = 0;
    while i < symbols.len() {
        if i + 1 < symbols.len() && symbols[i] == pair.0 && symbols[i + 1] == pair.1 {
            merged.push(format!("{}{}", pair.0, pair.1));
            i += 2;
        } else {
            merged.push(symbols[i].clone());
            i += 1;
        }
    }
    merged
}

/// Most frequent pair across `words`, ties to the earliest occurrence.
///
/// A pair repeated inside one word counts once for that word.
fn best_pair(words: &[(Vec<String>, i64)]) -> Option<(MergePair, i64)> {
    let mut counts: HashMap<(&str, &str), (i64, usize)> = HashMap::new();
    let mut seen = 0usize;
    for (symbols, freq) in words {
        let mut in_word: HashSet<(&str, &str)> = HashSet::new();
        for window in symbols.windows(2) {
            let pair = (window[0].as_str(), window[1].as_str());
            seen += 1;
            if !in_word.insert(pair) {
                continue;
            }
            let entry = counts.entry(pair).or_insert((0, seen));
            entry.0 += freq;
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then_with(|| first_b.cmp(first_a))
        })
        .map(|((left, right), (count, _))| ((left.to_string(), right.to_string()), count))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BpeTokenizer {
    options: SerializerOptions,
    vocab_size: usize,
    end_of_word_suffix: String,
    vocab: Option<Vocabulary>,
    merges: Vec<MergePair>,
    ranks: HashMap<MergePair, usize>,
}

impl BpeTokenizer {
    pub fn new(
        vocab_size: usize,
        options: SerializerOptions,
        end_of_word_suffix: impl Into<String>,
    ) -> Self {
        Self {
            options,
            vocab_size,
            end_of_word_suffix: end_of_word_suffix.into(),
            vocab: None,
            merges: Vec::new(),
            ranks: HashMap::new(),
        }
    }

    pub(crate) fn restore(
        vocab_size: usize,
        options: SerializerOptions,
        end_of_word_suffix: String,
        vocab: Vocabulary,
        merges: Vec<MergePair>,
    ) -> Self {
        let mut tokenizer = Self::new(vocab_size, options, end_of_word_suffix);
        tokenizer.set_merges(merges);
        tokenizer.vocab = Some(vocab);
        tokenizer
    }

    fn set_merges(&mut self, merges: Vec<MergePair>) {
        self.ranks = merges
            .iter()
            .enumerate()
            .map(|(rank, pair)| (pair.clone(), rank))
            .collect();
        self.merges = merges;
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn options(&self) -> SerializerOptions {
        self.options
    }

    pub fn end_of_word_suffix(&self) -> &str {
        &self.end_of_word_suffix
    }

    pub fn is_trained(&self) -> bool {
        self.vocab.is_some()
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocab.as_ref()
    }

    pub fn merges(&self) -> &[MergePair] {
        &self.merges
    }

    fn is_special(&self, word: &str) -> bool {
        self.options
            .special_tokens()
            .iter()
            .any(|special| *special == word)
    }

    /// Collects word frequencies over the training shards and learns merges.
    ///
    /// A trained tokenizer ignores further calls.
    pub fn train(
        &mut self,
        files: &[PathBuf],
        preprocessors: &[Preprocessor],
        postprocessors: &[Postprocessor],
    ) -> Result<()> {
        if self.is_trained() {
            tracing::warn!("BPE tokenizer is already trained; skipping");
            return Ok(());
        }
        let options = self.options;
        let specials: HashSet<&str> = options.special_tokens().into_iter().collect();
        let mut frequencies = WordFrequencies::new();
        for_each_shard(files, preprocessors, postprocessors, |timelines| {
            for timeline in timelines {
                for word in serialize_subject(timeline, options) {
                    if !specials.contains(word.text.as_str()) {
                        frequencies.add(&word.text, 1);
                    }
                }
            }
            Ok(())
        })?;
        self.train_from_frequencies(&frequencies);
        Ok(())
    }

    pub fn train_from_frequencies(&mut self, frequencies: &WordFrequencies) {
        let mut vocab = Vocabulary::with_specials(&self.options.special_tokens());
        let mut words: Vec<(Vec<String>, i64)> = frequencies
            .iter()
            .map(|(word, count)| (split_word(word, &self.end_of_word_suffix), count))
            .collect();

        let mut characters: BTreeMap<&str, i64> = BTreeMap::new();
        for (symbols, count) in &words {
            for symbol in symbols {
                *characters.entry(symbol.as_str()).or_default() += count;
            }
        }
        for (symbol, count) in &characters {
            vocab.insert(symbol, *count);
        }
        tracing::info!(
            words = frequencies.len(),
            characters = characters.len(),
            "initialised BPE alphabet"
        );

        let mut merges = Vec::new();
        while vocab.len() < self.vocab_size {
            let Some((pair, count)) = best_pair(&words) else {
                tracing::info!(size = vocab.len(), "no pairs left to merge");
                break;
            };
            vocab.insert(&format!("{}{}", pair.0, pair.1), count);
            for (symbols, _) in &mut words {
                if symbols.len() > 1 {
                    *symbols = merge_pair(symbols, &pair);
                }
            }
            merges.push(pair);
        }

        tracing::info!(merges = merges.len(), size = vocab.len(), "trained BPE tokenizer");
        self.set_merges(merges);
        self.vocab = Some(vocab);
    }

    /// Symbols for one word after applying merges by rank.
    pub fn encode_word(&self, word: &str) -> Vec<String> {
        if self.is_special(word) {
            return vec![word.to_string()];
        }
        let mut symbols = split_word(word, &self.end_of_word_suffix);
        while symbols.len() > 1 {
            let best = symbols
                .windows(2)
                .filter_map(|window| {
                    let pair = (window[0].clone(), window[1].clone());
                    self.ranks.get(&pair).map(|&rank| (rank, pair))
                })
                .min_by_key(|(rank, _)| *rank);
            let Some((_, pair)) = best else {
                break;
            };
            symbols = merge_pair(&symbols, &pair);
        }
        symbols
    }

    fn trained_vocab(&self) -> Result<&Vocabulary> {
        self.vocab.as_ref().ok_or(MedsError::NotTrained)
    }

    /// Unseen symbols map to `<unknown>`; every symbol inherits its word's timestamp.
    pub fn encode_timeline(&self, timeline: &SubjectTimeline) -> Result<EncodedTimeline> {
        let vocab = self.trained_vocab()?;
        let unknown = vocab.id(UNKNOWN_TOKEN).unwrap_or(0);
        let words = serialize_subject(timeline, self.options);
        let word_stamps = word_timestamps(timeline, &words);

        let mut tokens = Vec::new();
        let mut timestamps = Vec::new();
        for (word, stamp) in words.iter().zip(word_stamps) {
            for symbol in self.encode_word(&word.text) {
                tokens.push(vocab.id(&symbol).unwrap_or(unknown));
                timestamps.push(stamp);
            }
        }
        Ok(EncodedTimeline {
            subject_id: timeline.subject_id,
            tokens,
            timestamps,
        })
    }

    pub fn encode(
        &self,
        path: &Path,
        preprocessors: &[Preprocessor],
        postprocessors: &[Postprocessor],
    ) -> Result<Vec<EncodedTimeline>> {
        self.trained_vocab()?;
        load_timelines(path, preprocessors, postprocessors)?
            .iter()
            .map(|timeline| self.encode_timeline(timeline))
            .collect()
    }

    /// Rebuilds the word string; the suffix marks word ends.
    pub fn decode(&self, ids: &[i64]) -> Result<String> {
        let symbols = self.trained_vocab()?.lookup_all(ids)?;
        let mut text = String::new();
        for symbol in symbols {
            if self.is_special(symbol) {
                text.push(' ');
                text.push_str(symbol);
                text.push(' ');
            } else {
                text.push_str(&symbol.replace(&self.end_of_word_suffix, " "));
            }
        }
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}
