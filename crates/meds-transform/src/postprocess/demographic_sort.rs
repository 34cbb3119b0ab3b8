//! Deterministic ordering of a subject's demographic events.

use meds_model::{Event, SubjectTimeline};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemographicSortOrder {
    token_patterns: Vec<String>,
}

impl DemographicSortOrder {
    pub fn new(token_patterns: Vec<String>) -> Self {
        Self { token_patterns }
    }

    pub fn token_patterns(&self) -> &[String] {
        &self.token_patterns
    }

    /// Index of the first pattern `text_value`, then `code`, starts with.
    pub fn priority(&self, event: &Event) -> usize {
        let find = |value: &str| {
            self.token_patterns
                .iter()
                .position(|pattern| value.starts_with(pattern.as_str()))
        };
        event
            .text_value
            .as_deref()
            .filter(|text| !text.is_empty())
            .and_then(find)
            .or_else(|| find(&event.code))
            .unwrap_or(self.token_patterns.len())
    }

    pub fn encode_subject(&self, timeline: SubjectTimeline) -> SubjectTimeline {
        let (mut demographic, regular): (Vec<Event>, Vec<Event>) = timeline
            .events
            .into_iter()
            .partition(Event::is_demographic);
        demographic.sort_by_cached_key(|event| {
            (
                self.priority(event),
                event.text_value.clone().unwrap_or_default(),
                event.code.clone(),
            )
        });
        demographic.extend(regular);
        SubjectTimeline::new(timeline.subject_id, demographic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use meds_model::STATIC_DATA_NO_CODE;

    #[test]
    fn demographics_follow_pattern_order() {
        let sorter = DemographicSortOrder::new(
            ["BMI//", "GENDER//", "MARITAL_STATUS//", "AGE_T", "RACE//"]
                .map(String::from)
                .to_vec(),
        );
        let time = NaiveDate::from_ymd_opt(2100, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let static_text = |text: &str| Event::static_event(1, STATIC_DATA_NO_CODE).with_text(text);
        let timeline = SubjectTimeline::new(
            1,
            vec![
                Event::new(1, time, "LAB//51237"),
                static_text("RACE//WHITE"),
                static_text("AGE_T2//Q3"),
                static_text("AGE_T1//Q4"),
                Event::static_event(1, "ZZZ"),
                static_text("BMI//Q5"),
                Event::static_event(1, "GENDER//F"),
            ],
        );
        let out = sorter.encode_subject(timeline);
        let labels: Vec<&str> = out
            .events
            .iter()
            .map(|e| e.text_value.as_deref().unwrap_or(&e.code))
            .collect();
        assert_eq!(
            labels,
            vec![
                "BMI//Q5",
                "GENDER//F",
                "AGE_T1//Q4",
                "AGE_T2//Q3",
                "RACE//WHITE",
                "ZZZ",
                "LAB//51237"
            ]
        );
    }
}
