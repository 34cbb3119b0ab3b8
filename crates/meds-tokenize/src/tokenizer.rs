//! The trainable tokenizer facade and its on-disk layout.
//!
//! A saved tokenizer directory holds:
//! - `tokenizer.json`: the [`TokenizerConfig`] it was built from
//! - `vocab.csv`: the vocabulary table (`token,str,count`)
//! - `merges.json`: ordered merge pairs (BPE only)

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use meds_ingest::{VOCAB_FILE, read_vocabulary, write_encoded_timelines, write_vocabulary};
use meds_model::{EncodedTimeline, MedsError, Result, SubjectTimeline, Vocabulary};
use meds_transform::{Postprocessor, Preprocessor};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::bpe::{BpeTokenizer, MergePair};
use crate::config::{TokenizerConfig, TokenizerKind};
use crate::word_level::WordLevelTokenizer;

pub const CONFIG_FILE: &str = "tokenizer.json";
pub const MERGES_FILE: &str = "merges.json";

#[derive(Debug, Clone, PartialEq)]
pub enum Tokenizer {
    WordLevel(WordLevelTokenizer),
    Bpe(BpeTokenizer),
}

impl Tokenizer {
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(match config.kind {
            TokenizerKind::WordLevel => Self::WordLevel(WordLevelTokenizer::new(
                config.vocab_size(),
                config.options(),
                config.allow_unknown,
            )),
            TokenizerKind::Bpe => Self::Bpe(BpeTokenizer::new(
                config.vocab_size(),
                config.options(),
                config.end_of_word_suffix.clone(),
            )),
        })
    }

    pub fn kind(&self) -> TokenizerKind {
        match self {
            Self::WordLevel(_) => TokenizerKind::WordLevel,
            Self::Bpe(_) => TokenizerKind::Bpe,
        }
    }

    pub fn is_trained(&self) -> bool {
        match self {
            Self::WordLevel(tokenizer) => tokenizer.is_trained(),
            Self::Bpe(tokenizer) => tokenizer.is_trained(),
        }
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        match self {
            Self::WordLevel(tokenizer) => tokenizer.vocabulary(),
            Self::Bpe(tokenizer) => tokenizer.vocabulary(),
        }
    }

    pub fn train(
        &mut self,
        files: &[PathBuf],
        preprocessors: &[Preprocessor],
        postprocessors: &[Postprocessor],
    ) -> Result<()> {
        let span = tracing::info_span!(
            "train",
            tokenizer = self.kind().as_str(),
            files = files.len()
        );
        let _guard = span.enter();
        match self {
            Self::WordLevel(tokenizer) => tokenizer.train(files, preprocessors, postprocessors),
            Self::Bpe(tokenizer) => tokenizer.train(files, preprocessors, postprocessors),
        }
    }

    pub fn encode(
        &self,
        path: &Path,
        preprocessors: &[Preprocessor],
        postprocessors: &[Postprocessor],
    ) -> Result<Vec<EncodedTimeline>> {
        match self {
            Self::WordLevel(tokenizer) => tokenizer.encode(path, preprocessors, postprocessors),
            Self::Bpe(tokenizer) => tokenizer.encode(path, preprocessors, postprocessors),
        }
    }

    pub fn encode_timeline(&self, timeline: &SubjectTimeline) -> Result<EncodedTimeline> {
        match self {
            Self::WordLevel(tokenizer) => tokenizer.encode_timeline(timeline),
            Self::Bpe(tokenizer) => tokenizer.encode_timeline(timeline),
        }
    }

    /// Encodes one shard and writes its collection to `out`.
    pub fn encode_to_file(
        &self,
        shard: &Path,
        out: &Path,
        preprocessors: &[Preprocessor],
        postprocessors: &[Postprocessor],
    ) -> Result<usize> {
        let timelines = self
            .encode(shard, preprocessors, postprocessors)
            .map_err(|err| err.in_shard(shard))?;
        write_encoded_timelines(out, &timelines)?;
        Ok(timelines.len())
    }

    pub fn decode(&self, ids: &[i64]) -> Result<String> {
        match self {
            Self::WordLevel(tokenizer) => tokenizer.decode(ids),
            Self::Bpe(tokenizer) => tokenizer.decode(ids),
        }
    }

    fn config(&self) -> TokenizerConfig {
        let (kind, options, vocab_size) = match self {
            Self::WordLevel(t) => (TokenizerKind::WordLevel, t.options(), t.vocab_size()),
            Self::Bpe(t) => (TokenizerKind::Bpe, t.options(), t.vocab_size()),
        };
        let mut config = TokenizerConfig::new(kind);
        config.vocab_size = Some(vocab_size);
        config.insert_event_tokens = options.insert_event_tokens;
        config.insert_numeric_tokens = options.insert_numeric_tokens;
        config.insert_text_tokens = options.insert_text_tokens;
        config.add_boundary_tokens = options.add_boundary_tokens;
        match self {
            Self::WordLevel(t) => config.allow_unknown = t.allow_unknown(),
            Self::Bpe(t) => config.end_of_word_suffix = t.end_of_word_suffix().to_string(),
        }
        config
    }

    /// Writes a trained tokenizer into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let vocab = self.vocabulary().ok_or(MedsError::NotTrained)?;
        std::fs::create_dir_all(dir).map_err(|e| MedsError::io(dir, e))?;
        write_json(&dir.join(CONFIG_FILE), &self.config())?;
        write_vocabulary(&dir.join(VOCAB_FILE), vocab)?;
        if let Self::Bpe(tokenizer) = self {
            write_json(&dir.join(MERGES_FILE), tokenizer.merges())?;
        }
        tracing::info!(dir = %dir.display(), tokenizer = self.kind().as_str(), "saved tokenizer");
        Ok(())
    }

    /// Restores a tokenizer written by [`Tokenizer::save`].
    pub fn load(dir: &Path) -> Result<Self> {
        let config: TokenizerConfig = read_json(&dir.join(CONFIG_FILE))?;
        config.validate()?;
        let vocab = read_vocabulary(&dir.join(VOCAB_FILE))?;
        let tokenizer = match config.kind {
            TokenizerKind::WordLevel => Self::WordLevel(WordLevelTokenizer::restore(
                config.vocab_size(),
                config.options(),
                config.allow_unknown,
                vocab,
            )),
            TokenizerKind::Bpe => {
                let merges: Vec<MergePair> = read_json(&dir.join(MERGES_FILE))?;
                Self::Bpe(BpeTokenizer::restore(
                    config.vocab_size(),
                    config.options(),
                    config.end_of_word_suffix.clone(),
                    vocab,
                    merges,
                ))
            }
        };
        Ok(tokenizer)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| MedsError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| MedsError::json(path, e))?;
    writer.flush().map_err(|e| MedsError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(MedsError::missing_file(path));
    }
    let file = File::open(path).map_err(|e| MedsError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| MedsError::json(path, e))
}
