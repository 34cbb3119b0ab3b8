//! Synthetic interval events between consecutive timed events.

use chrono::NaiveDateTime;
use meds_model::{BIRTH_CODE, Event, MedsError, Result, SubjectTimeline};

/// A named `[min, max)` range of minutes; `max: None` is open-ended.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalToken {
    pub name: String,
    pub min: f64,
    pub max: Option<f64>,
}

impl IntervalToken {
    pub fn new(name: impl Into<String>, min: f64, max: Option<f64>) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn contains(&self, minutes: f64) -> bool {
        minutes >= self.min && self.max.is_none_or(|max| minutes < max)
    }
}

/// Dataset-specific bucketing used when no explicit table is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalDataset {
    /// Sub-day buckets in minutes and hours, then days up to `30d+`.
    Mimic,
    /// Week buckets up to `52w+`.
    Cprd,
}

impl IntervalDataset {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "mimic" | "mimic_iv" | "mimic-iv" => Ok(Self::Mimic),
            "cprd" => Ok(Self::Cprd),
            other => Err(MedsError::config(format!(
                "unsupported dataset '{other}' for dynamic time intervals (expected mimic or cprd)"
            ))),
        }
    }

    pub fn min_gap_minutes(self) -> f64 {
        match self {
            Self::Mimic => 5.0,
            Self::Cprd => 7.0 * 24.0 * 60.0,
        }
    }

    pub fn bucket(self, minutes: f64) -> Option<String> {
        if !minutes.is_finite() || minutes < self.min_gap_minutes() {
            return None;
        }
        let hours = minutes / 60.0;
        let days = hours / 24.0;
        let name = match self {
            Self::Mimic if minutes < 60.0 => {
                let floored = ((minutes / 15.0).floor() * 15.0) as i64;
                format!("{}m", floored.max(5))
            }
            Self::Mimic if hours < 24.0 => format!("{}h", hours.floor() as i64),
            Self::Mimic => match days.round() as i64 {
                d if d >= 30 => "30d+".to_string(),
                d => format!("{d}d"),
            },
            Self::Cprd => match (days / 7.0).floor() as i64 {
                w if w >= 52 => "52w+".to_string(),
                w => format!("{w}w"),
            },
        };
        Some(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntervalMode {
    Table(Vec<IntervalToken>),
    Dynamic(IntervalDataset),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeIntervalInserter {
    mode: IntervalMode,
}

impl TimeIntervalInserter {
    pub fn new(mode: IntervalMode) -> Result<Self> {
        if let IntervalMode::Table(tokens) = &mode {
            if tokens.is_empty() {
                return Err(MedsError::config("time_interval requires at least one interval"));
            }
            for token in tokens {
                if token.max.is_some_and(|max| max <= token.min) {
                    return Err(MedsError::config(format!(
                        "interval '{}' has max <= min",
                        token.name
                    )));
                }
            }
        }
        Ok(Self { mode })
    }

    pub fn mode(&self) -> &IntervalMode {
        &self.mode
    }

    /// Interval name for a gap, if any bucket applies.
    pub fn bucket(&self, minutes: f64) -> Option<String> {
        match &self.mode {
            IntervalMode::Table(tokens) => tokens
                .iter()
                .find(|token| token.contains(minutes))
                .map(|token| token.name.clone()),
            IntervalMode::Dynamic(dataset) => dataset.bucket(minutes),
        }
    }

    pub fn encode_subject(&self, timeline: SubjectTimeline) -> SubjectTimeline {
        let subject_id = timeline.subject_id;
        let mut events = Vec::with_capacity(timeline.events.len());
        let mut previous: Option<NaiveDateTime> = None;

        for event in timeline.events {
            if let (Some(current), Some(last)) = (event.time, previous) {
                let minutes = (current - last).num_seconds() as f64 / 60.0;
                if let Some(name) = self.bucket(minutes) {
                    events.push(Event::new(
                        subject_id,
                        Some(current),
                        format!("<time_interval_{name}>"),
                    ));
                }
            }
            if event.time.is_some() && event.code != BIRTH_CODE {
                previous = event.time;
            }
            events.push(event);
        }
        SubjectTimeline::new(subject_id, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2129, 3, 16)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn table() -> TimeIntervalInserter {
        TimeIntervalInserter::new(IntervalMode::Table(vec![
            IntervalToken::new("5m-15m", 5.0, Some(15.0)),
            IntervalToken::new("15m-1h", 15.0, Some(60.0)),
            IntervalToken::new("1h-", 60.0, None),
        ]))
        .unwrap()
    }

    #[test]
    fn six_minutes_inserts_one_token() {
        let timeline = SubjectTimeline::new(
            1,
            vec![
                Event::new(1, Some(t0()), "A"),
                Event::new(1, Some(t0() + Duration::minutes(6)), "B"),
            ],
        );
        let out = table().encode_subject(timeline);
        assert_eq!(out.codes(), vec!["A", "<time_interval_5m-15m>", "B"]);
        assert_eq!(out.events[1].time, out.events[2].time);
        assert!(out.events[1].numeric_value.is_none() && out.events[1].text_value.is_none());
    }

    #[test]
    fn birth_and_static_events_are_skipped() {
        let timeline = SubjectTimeline::new(
            1,
            vec![
                Event::static_event(1, "GENDER//F"),
                Event::new(1, Some(t0() - Duration::days(9000)), BIRTH_CODE),
                Event::new(1, Some(t0()), "A"),
                Event::static_event(1, "AGE"),
                Event::new(1, Some(t0() + Duration::minutes(2)), "B"),
                Event::new(1, Some(t0() + Duration::minutes(20)), "C"),
            ],
        );
        let out = table().encode_subject(timeline);
        assert_eq!(
            out.codes(),
            vec!["GENDER//F", BIRTH_CODE, "A", "AGE", "B", "<time_interval_15m-1h>", "C"]
        );
    }

    #[test]
    fn ranges_are_half_open() {
        let inserter = table();
        assert_eq!(inserter.bucket(15.0).as_deref(), Some("15m-1h"));
        assert_eq!(inserter.bucket(4.9), None);
        assert_eq!(inserter.bucket(10_000.0).as_deref(), Some("1h-"));
    }

    #[test]
    fn dynamic_buckets() {
        let mimic = IntervalDataset::Mimic;
        assert_eq!(mimic.bucket(3.0), None);
        assert_eq!(mimic.bucket(7.0).as_deref(), Some("5m"));
        assert_eq!(mimic.bucket(47.0).as_deref(), Some("45m"));
        assert_eq!(mimic.bucket(150.0).as_deref(), Some("2h"));
        assert_eq!(mimic.bucket(60.0 * 24.0 * 2.6).as_deref(), Some("3d"));
        assert_eq!(mimic.bucket(60.0 * 24.0 * 400.0).as_deref(), Some("30d+"));

        let cprd = IntervalDataset::Cprd;
        assert_eq!(cprd.bucket(60.0 * 24.0 * 6.0), None);
        assert_eq!(cprd.bucket(60.0 * 24.0 * 20.0).as_deref(), Some("2w"));
        assert_eq!(cprd.bucket(60.0 * 24.0 * 800.0).as_deref(), Some("52w+"));
        assert!(IntervalDataset::parse("ukb").is_err());
    }
}
