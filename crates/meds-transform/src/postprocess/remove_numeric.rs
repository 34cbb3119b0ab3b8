//! Drops events that still carry a raw numeric value.

use std::borrow::Cow;

use meds_model::{Event, EventValue, MedsError, Result, SubjectTimeline};
use regex::Regex;

const NUMERIC_PATTERN: &str = r"^-?\d+\.?\d*$";

#[derive(Debug, Clone)]
pub struct NumericFilter {
    pattern: Regex,
}

impl NumericFilter {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(NUMERIC_PATTERN)
            .map_err(|err| MedsError::config(format!("invalid numeric pattern: {err}")))?;
        Ok(Self { pattern })
    }

    pub fn is_numeric(&self, value: &str) -> bool {
        let value = value.trim();
        !value.is_empty() && self.pattern.is_match(value)
    }

    pub fn should_remove(&self, event: &Event) -> bool {
        let numeric = event.numeric_value.as_ref().map(EventValue::as_text);
        let text = event.text_value.as_deref().map(Cow::Borrowed);
        [numeric, text]
            .into_iter()
            .flatten()
            .any(|value| self.is_numeric(&value))
    }

    pub fn encode_subject(&self, timeline: SubjectTimeline) -> SubjectTimeline {
        let before = timeline.events.len();
        let events: Vec<Event> = timeline
            .events
            .into_iter()
            .filter(|event| !self.should_remove(event))
            .collect();
        let removed = before - events.len();
        if removed > 0 {
            tracing::debug!(subject_id = timeline.subject_id, removed, "removed numeric events");
        }
        SubjectTimeline::new(timeline.subject_id, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_are_dropped() {
        let filter = NumericFilter::new().unwrap();
        let events = vec![
            Event::static_event(1, "LAB//123").with_numeric(123.0),
            Event::static_event(1, "LAB//456").with_text("456.7"),
            Event::static_event(1, "LAB//678").with_text("-10.5"),
            Event::static_event(1, "LAB//789").with_text("low"),
            Event::static_event(1, "LAB//345").with_text("Q1"),
            Event::static_event(1, "AGE").with_text("AGE_20-24"),
            Event::static_event(1, "ADMISSION"),
        ];
        let out = filter.encode_subject(SubjectTimeline::new(1, events));
        assert_eq!(out.codes(), vec!["LAB//789", "LAB//345", "AGE", "ADMISSION"]);
    }

    #[test]
    fn labels_in_numeric_column_survive() {
        let filter = NumericFilter::new().unwrap();
        let mut event = Event::static_event(1, "LAB//1").with_numeric(1.0);
        event.set_label(meds_model::ValueColumn::NumericValue, "high".into());
        assert!(!filter.should_remove(&event));
        assert!(filter.is_numeric(" 42 "));
        assert!(!filter.is_numeric("1e5"));
    }
}
