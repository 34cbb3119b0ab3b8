//! Frequency-ranked word-level tokenizer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use meds_model::vocabulary::UNKNOWN_TOKEN;
use meds_model::{EncodedTimeline, MedsError, Result, SubjectTimeline, Vocabulary};
use meds_transform::{Postprocessor, Preprocessor, load_timelines};

use crate::corpus::for_each_shard;
use crate::serializer::{SerializerOptions, serialize_subject, word_timestamps};

#[derive(Debug, Clone, PartialEq)]
pub struct WordLevelTokenizer {
    options: SerializerOptions,
    vocab_size: usize,
    allow_unknown: bool,
    vocab: Option<Vocabulary>,
}

impl WordLevelTokenizer {
    pub fn new(vocab_size: usize, options: SerializerOptions, allow_unknown: bool) -> Self {
        Self {
            options,
            vocab_size,
            allow_unknown,
            vocab: None,
        }
    }

    pub(crate) fn restore(
        vocab_size: usize,
        options: SerializerOptions,
        allow_unknown: bool,
        vocab: Vocabulary,
    ) -> Self {
        Self {
            options,
            vocab_size,
            allow_unknown,
            vocab: Some(vocab),
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn allow_unknown(&self) -> bool {
        self.allow_unknown
    }

    pub fn options(&self) -> SerializerOptions {
        self.options
    }

    pub fn is_trained(&self) -> bool {
        self.vocab.is_some()
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocab.as_ref()
    }

    /// Counts words over the training shards and freezes the vocabulary.
    ///
    /// A trained tokenizer ignores further calls.
    pub fn train(
        &mut self,
        files: &[PathBuf],
        preprocessors: &[Preprocessor],
        postprocessors: &[Postprocessor],
    ) -> Result<()> {
        if self.is_trained() {
            tracing::warn!("word-level tokenizer is already trained; skipping");
            return Ok(());
        }
        let options = self.options;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for_each_shard(files, preprocessors, postprocessors, |timelines| {
            for timeline in timelines {
                for word in serialize_subject(timeline, options) {
                    *counts.entry(word.text).or_default() += 1;
                }
            }
            Ok(())
        })?;
        self.train_from_counts(counts);
        Ok(())
    }

    /// Builds the vocabulary from corpus word counts.
    pub fn train_from_counts(&mut self, mut counts: HashMap<String, i64>) {
        let specials = self.options.special_tokens();
        let mut vocab = Vocabulary::with_specials(&specials);
        for special in &specials {
            if let Some(count) = counts.remove(*special) {
                vocab.set_count(special, count);
            }
        }

        let mut ranked: Vec<(String, i64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let slots = self.vocab_size.saturating_sub(specials.len());
        let excluded: i64 = ranked.iter().skip(slots).map(|(_, count)| count).sum();
        ranked.truncate(slots);

        for (word, count) in &ranked {
            vocab.insert(word, *count);
        }
        let unknown = vocab.count(UNKNOWN_TOKEN).unwrap_or(0);
        vocab.set_count(UNKNOWN_TOKEN, unknown + excluded);

        tracing::info!(
            learned = ranked.len(),
            size = vocab.len(),
            excluded_count = excluded,
            "built word-level vocabulary"
        );
        self.vocab = Some(vocab);
    }

    fn trained_vocab(&self) -> Result<&Vocabulary> {
        self.vocab.as_ref().ok_or(MedsError::NotTrained)
    }

    pub fn encode_timeline(&self, timeline: &SubjectTimeline) -> Result<EncodedTimeline> {
        let vocab = self.trained_vocab()?;
        let words = serialize_subject(timeline, self.options);
        let timestamps = word_timestamps(timeline, &words);
        let mut tokens = Vec::with_capacity(words.len());
        for word in &words {
            let id = match vocab.id(&word.text) {
                Some(id) => id,
                None if self.allow_unknown => vocab
                    .id(UNKNOWN_TOKEN)
                    .ok_or_else(|| MedsError::UnknownToken {
                        token: UNKNOWN_TOKEN.to_string(),
                    })?,
                None => {
                    return Err(MedsError::UnknownToken {
                        token: word.text.clone(),
                    });
                }
            };
            tokens.push(id);
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

    pub fn decode(&self, ids: &[i64]) -> Result<String> {
        Ok(self.trained_vocab()?.lookup_all(ids)?.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meds_model::vocabulary::{EVENT_END, EVENT_START};

    fn counts(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(w, c)| ((*w).to_string(), *c)).collect()
    }

    fn bare() -> SerializerOptions {
        SerializerOptions {
            insert_event_tokens: false,
            insert_numeric_tokens: false,
            insert_text_tokens: false,
            add_boundary_tokens: false,
        }
    }

    #[test]
    fn top_words_by_count_then_lexicographic() {
        let mut tokenizer = WordLevelTokenizer::new(5, bare(), false);
        tokenizer.train_from_counts(counts(&[("B", 5), ("A", 5), ("C", 9), ("D", 1), ("E", 2)]));
        let vocab = tokenizer.vocabulary().unwrap();
        let order: Vec<&str> = vocab.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(order, vec!["<unknown>", "<start>", "<end>", "C", "A"]);
        assert_eq!(vocab.count(UNKNOWN_TOKEN), Some(8));
    }

    #[test]
    fn wrapper_tokens_keep_observed_counts() {
        let mut tokenizer = WordLevelTokenizer::new(100, SerializerOptions::default(), false);
        tokenizer.train_from_counts(counts(&[(EVENT_START, 4), (EVENT_END, 4), ("X", 4)]));
        let vocab = tokenizer.vocabulary().unwrap();
        assert_eq!(vocab.id(EVENT_START), Some(3));
        assert_eq!(vocab.count(EVENT_START), Some(4));
        assert_eq!(vocab.count(UNKNOWN_TOKEN), Some(0));
    }

    #[test]
    fn unknown_words_fail_unless_allowed() {
        let timeline = SubjectTimeline::new(1, vec![meds_model::Event::static_event(1, "NEW")]);
        let mut strict = WordLevelTokenizer::new(10, bare(), false);
        strict.train_from_counts(counts(&[("OLD", 1)]));
        assert!(matches!(
            strict.encode_timeline(&timeline),
            Err(MedsError::UnknownToken { token }) if token == "NEW"
        ));

        let mut lenient = WordLevelTokenizer::new(10, bare(), true);
        lenient.train_from_counts(counts(&[("OLD", 1)]));
        assert_eq!(lenient.encode_timeline(&timeline).unwrap().tokens, vec![0]);
    }

    #[test]
    fn untrained_tokenizer_refuses_work() {
        let tokenizer = WordLevelTokenizer::new(10, bare(), false);
        assert!(matches!(tokenizer.decode(&[0]), Err(MedsError::NotTrained)));
    }

    #[test]
    fn decode_lists_every_invalid_id() {
        let mut tokenizer = WordLevelTokenizer::new(10, bare(), false);
        tokenizer.train_from_counts(counts(&[("A", 1)]));
        let err = tokenizer.decode(&[3, 99, 0, -1]).unwrap_err();
        match err {
            MedsError::InvalidTokenIds { ids, vocab_size } => {
                assert_eq!(ids, vec![99, -1]);
                assert_eq!(vocab_size, 4);
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(tokenizer.decode(&[3, 0]).unwrap(), "A <unknown>");
    }
}
