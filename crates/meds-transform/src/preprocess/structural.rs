//! Transforms that add or remove whole events per subject.

use meds_model::{EventTable, MedsError, Result, SubjectTimeline};

use super::age::AgeEncoder;
use super::aggregation::DemographicAggregation;
use super::static_data::StaticDataLoader;

#[derive(Debug, Clone)]
pub enum StructuralTransform {
    /// Rebuilds `text_value` as the string form of `numeric_value`.
    DataReshaping,
    Age(AgeEncoder),
    DemographicAggregation(DemographicAggregation),
    StaticData(StaticDataLoader),
}

impl StructuralTransform {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataReshaping => "data_reshaping",
            Self::Age(encoder) => encoder.name(),
            Self::DemographicAggregation(_) => "demographic_aggregation",
            Self::StaticData(_) => "load_static_data",
        }
    }

    pub fn prepare(&mut self) -> Result<()> {
        match self {
            Self::StaticData(loader) => loader.load(),
            _ => Ok(()),
        }
    }

    /// Whether fitting must stream the training shards through `observe`.
    pub fn needs_observation(&self) -> bool {
        matches!(self, Self::DemographicAggregation(_))
    }

    pub fn observe(&mut self, table: &EventTable) {
        if let Self::DemographicAggregation(aggregation) = self {
            aggregation.observe(table);
        }
    }

    pub fn finalize(&mut self) {
        if let Self::DemographicAggregation(aggregation) = self {
            aggregation.finalize();
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            Self::DemographicAggregation(aggregation) => aggregation.is_fitted(),
            Self::StaticData(loader) => loader.is_loaded(),
            Self::DataReshaping | Self::Age(_) => true,
        }
    }

    /// Applies the transform per subject; event-adding variants leave the
    /// table sorted by subject, then time with static events first.
    pub fn encode(&self, table: EventTable) -> Result<EventTable> {
        if !self.is_ready() {
            return Err(MedsError::not_fitted(self.name()));
        }
        if let Self::DataReshaping = self {
            let mut table = table;
            for event in table.events_mut() {
                event.text_value = event
                    .numeric_value
                    .as_ref()
                    .map(|value| value.as_text().into_owned());
            }
            return Ok(table);
        }

        let mut timelines = table.into_timelines();
        for timeline in &mut timelines {
            let events = std::mem::take(&mut timeline.events);
            timeline.events = self.encode_subject(timeline, events)?;
        }
        let mut table = EventTable::from_timelines(timelines);
        table.sort_by_subject_and_time();
        Ok(table)
    }

    fn encode_subject(
        &self,
        timeline: &SubjectTimeline,
        events: Vec<meds_model::Event>,
    ) -> Result<Vec<meds_model::Event>> {
        let subject_id = timeline.subject_id;
        Ok(match self {
            Self::DataReshaping => events,
            Self::Age(encoder) => encoder.encode_subject(subject_id, events),
            Self::DemographicAggregation(aggregation) => {
                aggregation.encode_subject(subject_id, events)
            }
            Self::StaticData(loader) => {
                let mut out = loader.static_events(subject_id)?;
                out.extend(events);
                out
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::age::AgeVariant;
    use chrono::NaiveDate;
    use meds_model::{BIRTH_CODE, Event};

    #[test]
    fn reshaping_copies_numeric_into_text() {
        let table = EventTable::new(vec![
            Event::static_event(1, "A").with_numeric(7.0).with_text("old"),
            Event::static_event(1, "B").with_text("dropped"),
        ]);
        let out = StructuralTransform::DataReshaping.encode(table).unwrap();
        assert_eq!(out.events()[0].text_value.as_deref(), Some("7.0"));
        assert_eq!(out.events()[1].text_value, None);
    }

    #[test]
    fn age_events_sort_before_timed_events() {
        let at = |y| NaiveDate::from_ymd_opt(y, 6, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        let table = EventTable::new(vec![
            Event::new(2, at(2001), "LAB//X"),
            Event::new(1, at(1950), BIRTH_CODE),
            Event::new(1, at(2000), "LAB//A"),
            Event::new(2, at(1970), BIRTH_CODE),
        ]);
        let transform = StructuralTransform::Age(AgeEncoder::new(AgeVariant::Binned));
        let out = transform.encode(table).unwrap();
        let codes: Vec<_> = out.iter().map(|e| (e.subject_id, e.code.as_str())).collect();
        assert_eq!(
            codes,
            vec![(1, "AGE: 50-54"), (1, "LAB//A"), (2, "AGE: 30-34"), (2, "LAB//X")]
        );
    }
}
