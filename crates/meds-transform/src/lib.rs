//! Event transforms for MEDS timelines.
//!
//! - **matching**: code predicates shared by value and code transforms
//! - **preprocess**: table-level preprocessors and their dispatch enum
//! - **fit**: single-pass joint fitting over training shards
//! - **postprocess**: per-subject list transforms
//! - **config**: serde configuration objects
//! - **pipeline**: shard to transformed subject timelines

pub mod config;
pub mod fit;
pub mod matching;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;

pub use config::{PostprocessorConfig, PreprocessorConfig, TransformConfig};
pub use fit::{apply_preprocessors, fit_jointly};
pub use matching::{CodeMatcher, MatchingType};
pub use pipeline::{load_timelines, transform_table};
pub use postprocess::{Postprocessor, apply_postprocessors};
pub use preprocess::Preprocessor;
