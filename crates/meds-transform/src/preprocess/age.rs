//! Age encoders derived from the birth marker and the first medical event.

use meds_common::format_float;
use meds_common::numeric::round_to;
use meds_model::{BIRTH_CODE, Event, MedsError, Result, STATIC_DATA_NO_CODE};

const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] =
    &["DEMOGRAPHICS//", "GENDER//", "ETHNICITY//", "REGION//"];
pub const SIMPLE_EXCLUDED_PREFIXES: &[&str] =
    &["DEMOGRAPHICS//", "GENDER//", "RACE//", "ETHNICITY//", "REGION//"];
pub const ETHOS_EXCLUDED_PREFIXES: &[&str] = &["DEMOGRAPHICS//", "RACE//", "MARITAL_STATUS//"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Years,
    Days,
    Hours,
}

impl AgeUnit {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "years" => Ok(Self::Years),
            "days" => Ok(Self::Days),
            "hours" => Ok(Self::Hours),
            other => Err(MedsError::config(format!(
                "time_unit must be one of years, days, hours; got '{other}'"
            ))),
        }
    }

    fn seconds(self) -> f64 {
        match self {
            Self::Years => SECONDS_PER_YEAR,
            Self::Days => 24.0 * 3600.0,
            Self::Hours => 3600.0,
        }
    }
}

/// Two-token age code: `n²` age positions split into coarse and fine quantile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthosAge {
    pub time_unit: AgeUnit,
    pub num_quantiles: u32,
    pub prefix: String,
    pub insert_t1_code: bool,
    pub insert_t2_code: bool,
}

impl EthosAge {
    pub fn new(
        time_unit: AgeUnit,
        num_quantiles: u32,
        prefix: impl Into<String>,
        insert_t1_code: bool,
        insert_t2_code: bool,
    ) -> Result<Self> {
        if num_quantiles < 2 {
            return Err(MedsError::config("num_quantiles must be at least 2"));
        }
        Ok(Self {
            time_unit,
            num_quantiles,
            prefix: prefix.into(),
            insert_t1_code,
            insert_t2_code,
        })
    }

    /// `(T1, T2)` labels, both 1-indexed.
    pub fn quantile_tokens(&self, age: f64) -> (String, String) {
        let n = f64::from(self.num_quantiles);
        let scaled = (age.max(0.0) * n * n / 100.0).min(n * n - 1.0);
        let mut t1 = (scaled / n).floor() as u32;
        let mut t2 = (scaled % n).round_ties_even() as u32;
        if t2 == self.num_quantiles {
            t1 += 1;
            t2 = 0;
        }
        (format!("Q{}", t1 + 1), format!("Q{}", t2 + 1))
    }

    fn component(&self, subject_id: i64, part: &str, token: String, insert_code: bool) -> Event {
        if insert_code {
            Event::static_event(subject_id, format!("{}{part}", self.prefix)).with_text(token)
        } else {
            Event::static_event(subject_id, STATIC_DATA_NO_CODE)
                .with_text(format!("{}{part}//{token}", self.prefix))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgeVariant {
    /// `AGE: 45-49` for ages in `[20, 100)`.
    Binned,
    /// `AGE_decile` / `AGE_unit` pair from the tens and ones digits.
    Decimal,
    /// `AGE` with the age as a numeric value.
    Raw { decimals: u32 },
    /// `AGE` rounded to one decimal, zero when no age can be derived.
    Simple,
    Ethos(EthosAge),
}

impl AgeVariant {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binned => "binned_age",
            Self::Decimal => "decimal_age",
            Self::Raw { .. } => "raw_age",
            Self::Simple => "simple_age",
            Self::Ethos(_) => "ethos_quantile_age",
        }
    }

    pub fn default_excluded_prefixes(&self) -> Vec<String> {
        let prefixes = match self {
            Self::Binned | Self::Decimal | Self::Raw { .. } => DEFAULT_EXCLUDED_PREFIXES,
            Self::Simple => SIMPLE_EXCLUDED_PREFIXES,
            Self::Ethos(_) => ETHOS_EXCLUDED_PREFIXES,
        };
        prefixes.iter().map(|p| (*p).to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgeEncoder {
    pub variant: AgeVariant,
    pub birth_code: String,
    pub keep_birth_marker: bool,
    pub excluded_prefixes: Vec<String>,
}

impl AgeEncoder {
    pub fn new(variant: AgeVariant) -> Self {
        let excluded_prefixes = variant.default_excluded_prefixes();
        Self {
            variant,
            birth_code: BIRTH_CODE.to_string(),
            keep_birth_marker: false,
            excluded_prefixes,
        }
    }

    pub fn name(&self) -> &'static str {
        self.variant.name()
    }

    fn is_medical(&self, event: &Event) -> bool {
        event.time.is_some()
            && event.code != self.birth_code
            && event.code != STATIC_DATA_NO_CODE
            && !self
                .excluded_prefixes
                .iter()
                .any(|prefix| event.code.starts_with(prefix.as_str()))
    }

    /// Seconds from the birth marker to the earliest medical event.
    pub fn elapsed_seconds(&self, events: &[Event]) -> Option<f64> {
        let birth = events
            .iter()
            .find(|event| event.code == self.birth_code)?
            .time?;
        let first = events
            .iter()
            .filter(|event| self.is_medical(event))
            .filter_map(|event| event.time)
            .min()?;
        let delta = first - birth;
        Some(
            delta
                .num_microseconds()
                .map_or(delta.num_seconds() as f64, |micros| micros as f64 / 1e6),
        )
    }

    /// Static age events for one subject.
    pub fn age_events(&self, subject_id: i64, events: &[Event]) -> Vec<Event> {
        let elapsed = self.elapsed_seconds(events);
        let years = elapsed.map(|seconds| seconds / SECONDS_PER_YEAR);
        match &self.variant {
            AgeVariant::Binned => match years {
                Some(age) if (20.0..100.0).contains(&age) => {
                    let lower = ((age.floor() as i64 / 5) * 5).clamp(20, 95);
                    vec![Event::static_event(
                        subject_id,
                        format!("AGE: {lower}-{}", lower + 4),
                    )]
                }
                _ => Vec::new(),
            },
            AgeVariant::Decimal => match years {
                Some(age) if age >= 0.0 => {
                    let whole = age.floor() as i64;
                    vec![
                        Event::static_event(subject_id, "AGE_decile")
                            .with_text(format!("Q{}", whole / 10)),
                        Event::static_event(subject_id, "AGE_unit")
                            .with_text(format!("Q{}", whole % 10)),
                    ]
                }
                _ => Vec::new(),
            },
            AgeVariant::Raw { decimals } => match years {
                Some(age) if age >= 0.0 => vec![
                    Event::static_event(subject_id, "AGE").with_numeric(round_to(age, *decimals)),
                ],
                _ => Vec::new(),
            },
            AgeVariant::Simple => {
                let age = years.map_or(0.0, |age| round_to(age.max(0.0), 1));
                vec![
                    Event::static_event(subject_id, "AGE")
                        .with_numeric(age)
                        .with_text(format_float(age)),
                ]
            }
            AgeVariant::Ethos(ethos) => {
                if !events.iter().any(|event| event.code == self.birth_code) {
                    return Vec::new();
                }
                let age = elapsed.map_or(0.0, |seconds| seconds / ethos.time_unit.seconds());
                let (t1, t2) = ethos.quantile_tokens(age);
                vec![
                    ethos.component(subject_id, "T1", t1, ethos.insert_t1_code),
                    ethos.component(subject_id, "T2", t2, ethos.insert_t2_code),
                ]
            }
        }
    }

    /// Prepends age events and drops the birth marker unless it is kept.
    pub fn encode_subject(&self, subject_id: i64, events: Vec<Event>) -> Vec<Event> {
        let mut out = self.age_events(subject_id, &events);
        out.extend(
            events
                .into_iter()
                .filter(|event| self.keep_birth_marker || event.code != self.birth_code),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn date(year: i32, month: u32, day: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    fn timeline(age_years: i32) -> Vec<Event> {
        vec![
            Event::static_event(1, "GENDER//F"),
            Event::new(1, date(2000, 1, 1), BIRTH_CODE),
            Event::new(1, date(2000 + age_years, 1, 2), "DEMOGRAPHICS//RACE"),
            Event::new(1, date(2000 + age_years, 3, 1), "LAB//A"),
            Event::new(1, date(2000 + age_years + 1, 3, 1), "LAB//B"),
        ]
    }

    fn codes(events: &[Event]) -> Vec<String> {
        events.iter().map(|e| e.code.clone()).collect()
    }

    #[test]
    fn binned_age_uses_five_year_ranges() {
        let encoder = AgeEncoder::new(AgeVariant::Binned);
        let out = encoder.encode_subject(1, timeline(47));
        assert_eq!(out[0].code, "AGE: 45-49");
        assert!(!codes(&out).contains(&BIRTH_CODE.to_string()));
        assert!(encoder.age_events(1, &timeline(12)).is_empty());
    }

    #[test]
    fn decimal_age_splits_digits() {
        let out = AgeEncoder::new(AgeVariant::Decimal).age_events(1, &timeline(63));
        assert_eq!(out[0].text_value.as_deref(), Some("Q6"));
        assert_eq!(out[1].text_value.as_deref(), Some("Q3"));
    }

    #[test]
    fn simple_age_defaults_to_zero_without_birth() {
        let events = vec![Event::new(1, date(2020, 1, 1), "LAB//A")];
        let out = AgeEncoder::new(AgeVariant::Simple).age_events(1, &events);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text_value.as_deref(), Some("0.0"));
    }

    #[test]
    fn simple_age_skips_race_events() {
        let events = vec![
            Event::new(1, date(2000, 1, 1), BIRTH_CODE),
            Event::new(1, date(2010, 6, 1), "RACE//WHITE"),
            Event::new(1, date(2030, 3, 1), "LAB//A"),
        ];
        let out = AgeEncoder::new(AgeVariant::Simple).age_events(1, &events);
        assert_eq!(out[0].text_value.as_deref(), Some("30.2"));

        let binned = AgeEncoder::new(AgeVariant::Binned);
        assert!(!binned.excluded_prefixes.contains(&"RACE//".to_string()));
    }

    #[test]
    fn raw_age_keeps_birth_when_asked() {
        let mut encoder = AgeEncoder::new(AgeVariant::Raw { decimals: 0 });
        encoder.keep_birth_marker = true;
        let out = encoder.encode_subject(1, timeline(30));
        assert_eq!(out[0].numeric_value.as_ref().and_then(|v| v.as_f64()), Some(30.0));
        assert!(codes(&out).contains(&BIRTH_CODE.to_string()));
    }

    #[test]
    fn ethos_tokens() {
        let ethos = EthosAge::new(AgeUnit::Years, 10, "AGE_", true, false).unwrap();
        assert_eq!(ethos.quantile_tokens(0.0), ("Q1".into(), "Q1".into()));
        assert_eq!(ethos.quantile_tokens(47.0), ("Q5".into(), "Q8".into()));
        assert_eq!(ethos.quantile_tokens(250.0), ("Q10".into(), "Q10".into()));
        let out = AgeEncoder::new(AgeVariant::Ethos(ethos)).age_events(1, &timeline(47));
        assert_eq!(out[0].code, "AGE_T1");
        assert_eq!(out[1].code, STATIC_DATA_NO_CODE);
        assert!(out[1].text_value.as_deref().unwrap().starts_with("AGE_T2//Q"));
        assert!(EthosAge::new(AgeUnit::Days, 1, "", true, true).is_err());
    }
}
