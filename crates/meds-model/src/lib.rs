//! Data model for MEDS event timelines.
//!
//! Events flow through the pipeline as plain Rust rows: an [`EventTable`] per
//! shard, split into [`SubjectTimeline`]s for list-level transforms, and finally
//! encoded into [`EncodedTimeline`]s against a [`Vocabulary`].

pub mod error;
pub mod event;
pub mod table;
pub mod vocabulary;

pub use error::{MedsError, Result, ensure_files_exist};
pub use event::{BIRTH_CODE, Event, EventValue, STATIC_DATA_NO_CODE, ValueColumn};
pub use table::{EncodedTimeline, EventTable, SubjectTimeline};
pub use vocabulary::{VocabEntry, Vocabulary};
