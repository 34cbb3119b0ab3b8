//! File-level IO for MEDS datasets.
//!
//! - **discovery**: `train/`, `tuning/`, `held_out/` shard listing
//! - **shard**: parquet shards to and from [`meds_model::EventTable`]
//! - **lookup**: header-keyed CSV tables for enrichment and static data
//! - **vocab_io**: `vocab.csv` persistence
//! - **output**: encoded timelines as JSON, mirroring the split layout
//! - **coverage**: raw vs. encoded subject comparison

pub mod coverage;
pub mod discovery;
pub mod lookup;
pub mod output;
pub mod shard;
pub mod vocab_io;

pub use coverage::{SubjectCoverage, check_subject_coverage};
pub use discovery::{DatasetFiles, Split, discover_dataset, list_shards};
pub use lookup::{LookupTable, get_field, get_optional, read_lookup_table};
pub use output::{output_path_for_shard, read_encoded_timelines, write_encoded_timelines};
pub use shard::{dataframe_to_events, events_to_dataframe, read_event_table, write_event_table};
pub use vocab_io::{VOCAB_FILE, read_vocabulary, write_vocabulary};
