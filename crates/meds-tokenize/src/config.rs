//! Tokenizer configuration.

use serde::{Deserialize, Serialize};

use meds_model::{MedsError, Result};

use crate::serializer::SerializerOptions;

pub const DEFAULT_END_OF_WORD_SUFFIX: &str = "</w>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    WordLevel,
    Bpe,
}

impl TokenizerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WordLevel => "word_level",
            Self::Bpe => "bpe",
        }
    }

    pub fn default_vocab_size(self) -> usize {
        match self {
            Self::WordLevel => 10_000,
            Self::Bpe => 1_000,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_suffix() -> String {
    DEFAULT_END_OF_WORD_SUFFIX.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(rename = "type")]
    pub kind: TokenizerKind,
    #[serde(default)]
    pub vocab_size: Option<usize>,
    #[serde(default = "default_true")]
    pub insert_event_tokens: bool,
    #[serde(default = "default_true")]
    pub insert_numeric_tokens: bool,
    #[serde(default = "default_true")]
    pub insert_text_tokens: bool,
    #[serde(default)]
    pub add_boundary_tokens: bool,
    #[serde(default = "default_suffix")]
    pub end_of_word_suffix: String,
    #[serde(default)]
    pub allow_unknown: bool,
}

impl TokenizerConfig {
    pub fn new(kind: TokenizerKind) -> Self {
        Self {
            kind,
            vocab_size: None,
            insert_event_tokens: true,
            insert_numeric_tokens: true,
            insert_text_tokens: true,
            add_boundary_tokens: false,
            end_of_word_suffix: default_suffix(),
            allow_unknown: false,
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|err| MedsError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size.unwrap_or_else(|| self.kind.default_vocab_size())
    }

    pub fn options(&self) -> SerializerOptions {
        SerializerOptions {
            insert_event_tokens: self.insert_event_tokens,
            insert_numeric_tokens: self.insert_numeric_tokens,
            insert_text_tokens: self.insert_text_tokens,
            add_boundary_tokens: self.add_boundary_tokens,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.vocab_size == Some(0) {
            return Err(MedsError::config("vocab_size must be positive"));
        }
        if self.kind == TokenizerKind::Bpe && self.end_of_word_suffix.trim().is_empty() {
            return Err(MedsError::config("end_of_word_suffix must not be blank"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_kind() {
        let config = TokenizerConfig::from_toml_str("type = \"bpe\"").unwrap();
        assert_eq!(config.vocab_size(), 1_000);
        assert_eq!(config.end_of_word_suffix, "</w>");
        assert!(config.options().insert_event_tokens);

        let config =
            TokenizerConfig::from_toml_str("type = \"word_level\"\ninsert_event_tokens = false")
                .unwrap();
        assert_eq!(config.vocab_size(), 10_000);
        assert!(!config.options().insert_event_tokens);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(TokenizerConfig::from_toml_str("type = \"sentencepiece\"").is_err());
        assert!(TokenizerConfig::from_toml_str("type = \"bpe\"\nvocab_size = 0").is_err());
        assert!(
            TokenizerConfig::from_toml_str("type = \"bpe\"\nend_of_word_suffix = \"\"").is_err()
        );
    }
}
