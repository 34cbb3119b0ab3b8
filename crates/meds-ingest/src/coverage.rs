//! Subject coverage between raw shards and encoded output.

use std::collections::BTreeSet;
use std::path::PathBuf;

use meds_model::Result;

use crate::output::read_encoded_timelines;
use crate::shard::read_event_table;

/// Subject id sets compared between raw and encoded data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectCoverage {
    pub raw_subjects: usize,
    pub encoded_subjects: usize,
    /// In the raw data but never encoded.
    pub missing: Vec<i64>,
    /// Encoded but absent from the raw data.
    pub unexpected: Vec<i64>,
}

impl SubjectCoverage {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

pub fn check_subject_coverage(
    raw_shards: &[PathBuf],
    encoded_files: &[PathBuf],
) -> Result<SubjectCoverage> {
    let mut raw = BTreeSet::new();
    for path in raw_shards {
        raw.extend(read_event_table(path)?.iter().map(|event| event.subject_id));
    }
    let mut encoded = BTreeSet::new();
    for path in encoded_files {
        encoded.extend(
            read_encoded_timelines(path)?
                .iter()
                .map(|timeline| timeline.subject_id),
        );
    }

    let coverage = SubjectCoverage {
        raw_subjects: raw.len(),
        encoded_subjects: encoded.len(),
        missing: raw.difference(&encoded).copied().collect(),
        unexpected: encoded.difference(&raw).copied().collect(),
    };
    if coverage.is_complete() {
        tracing::info!(subjects = coverage.raw_subjects, "all subjects encoded");
    } else {
        tracing::warn!(
            missing = coverage.missing.len(),
            unexpected = coverage.unexpected.len(),
            "subject coverage mismatch"
        );
    }
    Ok(coverage)
}
