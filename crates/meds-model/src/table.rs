//! Row-oriented event tables and per-subject timelines.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::event::Event;

/// One shard worth of events, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    events: Vec<Event>,
}

impl EventTable {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut Vec<Event> {
        &mut self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Distinct subject ids in order of first appearance.
    pub fn subject_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.events
            .iter()
            .filter(|event| seen.insert(event.subject_id))
            .map(|event| event.subject_id)
            .collect()
    }

    /// Stable sort by subject, then time with untimed events first.
    pub fn sort_by_subject_and_time(&mut self) {
        self.events.sort_by(|a, b| {
            a.subject_id
                .cmp(&b.subject_id)
                .then_with(|| a.time.is_some().cmp(&b.time.is_some()))
                .then_with(|| a.time.cmp(&b.time))
        });
    }

    /// Splits the table into one timeline per subject in a single pass.
    ///
    /// Subjects keep their first-appearance order and each timeline keeps the
    /// table's row order.
    pub fn group_by_subject(&self) -> Vec<SubjectTimeline> {
        self.clone().into_timelines()
    }

    pub fn into_timelines(self) -> Vec<SubjectTimeline> {
        let mut index: HashMap<i64, usize> = HashMap::new();
        let mut timelines: Vec<SubjectTimeline> = Vec::new();
        for event in self.events {
            let slot = *index.entry(event.subject_id).or_insert_with(|| {
                timelines.push(SubjectTimeline::new(event.subject_id, Vec::new()));
                timelines.len() - 1
            });
            timelines[slot].events.push(event);
        }
        timelines
    }

    pub fn from_timelines(timelines: Vec<SubjectTimeline>) -> Self {
        Self::new(
            timelines
                .into_iter()
                .flat_map(|timeline| timeline.events)
                .collect(),
        )
    }
}

impl From<Vec<Event>> for EventTable {
    fn from(events: Vec<Event>) -> Self {
        Self::new(events)
    }
}

impl IntoIterator for EventTable {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventTable {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// The ordered events of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectTimeline {
    pub subject_id: i64,
    pub events: Vec<Event>,
}

impl SubjectTimeline {
    pub fn new(subject_id: i64, events: Vec<Event>) -> Self {
        Self { subject_id, events }
    }

    /// First event timestamp, used as the zero point for relative times.
    pub fn base_time(&self) -> Option<chrono::NaiveDateTime> {
        self.events.iter().find_map(|event| event.time)
    }

    pub fn codes(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.code.as_str()).collect()
    }
}

/// Token ids for one subject with one relative timestamp per token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedTimeline {
    pub subject_id: i64,
    pub tokens: Vec<i64>,
    pub timestamps: Vec<f64>,
}

impl EncodedTimeline {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens and timestamps are aligned one-to-one.
    pub fn is_aligned(&self) -> bool {
        self.tokens.len() == self.timestamps.len()
    }
}
