//! Postprocessors: list-level rewrites of one subject's timeline.
//!
//! - **time_interval**: interval events between timed events
//! - **demographic_sort**: stable ordering of static demographics
//! - **remove_numeric**: drops un-binned numeric values

pub mod demographic_sort;
pub mod remove_numeric;
pub mod time_interval;

use meds_model::SubjectTimeline;

pub use demographic_sort::DemographicSortOrder;
pub use remove_numeric::NumericFilter;
pub use time_interval::{IntervalDataset, IntervalMode, IntervalToken, TimeIntervalInserter};

#[derive(Debug, Clone)]
pub enum Postprocessor {
    TimeInterval(TimeIntervalInserter),
    DemographicSortOrder(DemographicSortOrder),
    RemoveNumeric(NumericFilter),
}

impl Postprocessor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TimeInterval(_) => "time_interval",
            Self::DemographicSortOrder(_) => "demographic_sort_order",
            Self::RemoveNumeric(_) => "remove_numeric",
        }
    }

    pub fn encode_subject(&self, timeline: SubjectTimeline) -> SubjectTimeline {
        match self {
            Self::TimeInterval(inserter) => inserter.encode_subject(timeline),
            Self::DemographicSortOrder(sorter) => sorter.encode_subject(timeline),
            Self::RemoveNumeric(filter) => filter.encode_subject(timeline),
        }
    }

    pub fn encode(&self, timelines: Vec<SubjectTimeline>) -> Vec<SubjectTimeline> {
        timelines
            .into_iter()
            .map(|timeline| self.encode_subject(timeline))
            .collect()
    }
}

/// Runs each subject through the whole chain in order.
pub fn apply_postprocessors(
    postprocessors: &[Postprocessor],
    timelines: Vec<SubjectTimeline>,
) -> Vec<SubjectTimeline> {
    timelines
        .into_iter()
        .map(|timeline| {
            postprocessors
                .iter()
                .fold(timeline, |timeline, postprocessor| {
                    postprocessor.encode_subject(timeline)
                })
        })
        .collect()
}
