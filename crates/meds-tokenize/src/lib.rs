//! Tokenizers for transformed MEDS timelines.
//!
//! - **serializer**: subject timeline to words with source-event tracking
//! - **word_level**: frequency-ranked word vocabulary
//! - **bpe**: byte-pair encoding with rank-ordered merges
//! - **tokenizer**: the facade used by callers, plus save/load
//! - **config**: serde tokenizer configuration

pub mod bpe;
pub mod config;
mod corpus;
pub mod serializer;
pub mod tokenizer;
pub mod word_level;

pub use bpe::BpeTokenizer;
pub use config::{TokenizerConfig, TokenizerKind};
pub use serializer::{SerializerOptions, serialize_subject, subject_string};
pub use tokenizer::Tokenizer;
pub use word_level::WordLevelTokenizer;
