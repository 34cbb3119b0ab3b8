use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use meds_common::{format_float, parse_f64};

/// Code of the event that marks a subject's date of birth.
pub const BIRTH_CODE: &str = "MEDS_BIRTH";

/// Placeholder code for static events whose meaning lives in `text_value`.
pub const STATIC_DATA_NO_CODE: &str = "STATIC_DATA_NO_CODE";

/// A value slot on an event.
///
/// Numeric measurements start out as `Number`; value transforms replace them
/// with a derived `Label` (`Q3`, `low`, `12.35`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Number(f64),
    Label(String),
}

impl EventValue {
    /// Float view of the value; labels are parsed leniently.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Label(label) => parse_f64(label),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Number(value) => Cow::Owned(format_float(*value)),
            Self::Label(label) => Cow::Borrowed(label.as_str()),
        }
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<f64> for EventValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for EventValue {
    fn from(value: String) -> Self {
        Self::Label(value)
    }
}

impl From<&str> for EventValue {
    fn from(value: &str) -> Self {
        Self::Label(value.to_string())
    }
}

/// The value columns a transform may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueColumn {
    NumericValue,
    TextValue,
}

impl ValueColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NumericValue => "numeric_value",
            Self::TextValue => "text_value",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "numeric_value" => Some(Self::NumericValue),
            "text_value" => Some(Self::TextValue),
            _ => None,
        }
    }

    pub fn sibling(self) -> Self {
        match self {
            Self::NumericValue => Self::TextValue,
            Self::TextValue => Self::NumericValue,
        }
    }
}

impl fmt::Display for ValueColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a MEDS event table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub subject_id: i64,
    pub time: Option<NaiveDateTime>,
    pub code: String,
    pub numeric_value: Option<EventValue>,
    pub text_value: Option<String>,
}

impl Event {
    pub fn new(subject_id: i64, time: Option<NaiveDateTime>, code: impl Into<String>) -> Self {
        Self {
            subject_id,
            time,
            code: code.into(),
            numeric_value: None,
            text_value: None,
        }
    }

    /// A static (untimed) event.
    pub fn static_event(subject_id: i64, code: impl Into<String>) -> Self {
        Self::new(subject_id, None, code)
    }

    pub fn with_numeric(mut self, value: f64) -> Self {
        self.numeric_value = Some(EventValue::Number(value));
        self
    }

    pub fn with_text(mut self, value: impl Into<String>) -> Self {
        self.text_value = Some(value.into());
        self
    }

    pub fn is_static(&self) -> bool {
        self.time.is_none()
    }

    pub fn is_birth(&self) -> bool {
        self.code == BIRTH_CODE
    }

    /// Static or pinned to the Unix epoch; both mark demographic rows.
    pub fn is_demographic(&self) -> bool {
        self.time
            .is_none_or(|time| time == DateTime::UNIX_EPOCH.naive_utc())
    }

    pub fn value_text(&self, column: ValueColumn) -> Option<Cow<'_, str>> {
        match column {
            ValueColumn::NumericValue => self.numeric_value.as_ref().map(EventValue::as_text),
            ValueColumn::TextValue => self.text_value.as_deref().map(Cow::Borrowed),
        }
    }

    pub fn value_f64(&self, column: ValueColumn) -> Option<f64> {
        match column {
            ValueColumn::NumericValue => self.numeric_value.as_ref().and_then(EventValue::as_f64),
            ValueColumn::TextValue => self.text_value.as_deref().and_then(parse_f64),
        }
    }

    /// Writes a derived label into `column` and clears the sibling column.
    pub fn set_label(&mut self, column: ValueColumn, label: String) {
        match column {
            ValueColumn::NumericValue => {
                self.numeric_value = Some(EventValue::Label(label));
                self.text_value = None;
            }
            ValueColumn::TextValue => {
                self.text_value = Some(label);
                self.numeric_value = None;
            }
        }
    }

    /// Seconds since `base`, or 0 for untimed events.
    pub fn seconds_since(&self, base: Option<NaiveDateTime>) -> f64 {
        match (self.time, base) {
            (Some(time), Some(base)) => {
                let delta = time - base;
                delta.num_microseconds().map_or_else(
                    || delta.num_milliseconds() as f64 / 1_000.0,
                    |micros| micros as f64 / 1_000_000.0,
                )
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .expect("valid time")
    }

    #[test]
    fn label_replaces_value_and_clears_sibling() {
        let mut event = Event::new(1, Some(at(0, 0)), "LAB//A").with_numeric(3.5);
        event.text_value = Some("3.5".to_string());
        event.set_label(ValueColumn::NumericValue, "Q2".to_string());
        assert_eq!(event.numeric_value, Some(EventValue::Label("Q2".into())));
        assert_eq!(event.text_value, None);

        event.set_label(ValueColumn::TextValue, "high".to_string());
        assert_eq!(event.text_value.as_deref(), Some("high"));
        assert_eq!(event.numeric_value, None);
    }

    #[test]
    fn value_views() {
        let event = Event::new(1, None, "X").with_numeric(2.0).with_text(" 4.25 ");
        assert_eq!(event.value_f64(ValueColumn::NumericValue), Some(2.0));
        assert_eq!(event.value_f64(ValueColumn::TextValue), Some(4.25));
        assert_eq!(
            event.value_text(ValueColumn::NumericValue).as_deref(),
            Some("2.0")
        );
        let labelled = Event::new(1, None, "X").with_text("low");
        assert_eq!(labelled.value_f64(ValueColumn::TextValue), None);
    }

    #[test]
    fn demographic_detection() {
        assert!(Event::static_event(1, "GENDER//F").is_demographic());
        let epoch = Event::new(1, Some(DateTime::UNIX_EPOCH.naive_utc()), "RACE");
        assert!(epoch.is_demographic());
        assert!(!Event::new(1, Some(at(1, 0)), "LAB").is_demographic());
    }

    #[test]
    fn relative_seconds() {
        let event = Event::new(1, Some(at(1, 30)), "LAB");
        assert_eq!(event.seconds_since(Some(at(0, 0))), 5_400.0);
        assert_eq!(event.seconds_since(None), 0.0);
        assert_eq!(Event::static_event(1, "X").seconds_since(Some(at(0, 0))), 0.0);
    }

    #[test]
    fn value_column_names() {
        assert_eq!(ValueColumn::parse("text_value"), Some(ValueColumn::TextValue));
        assert_eq!(ValueColumn::parse("unit"), None);
        assert_eq!(ValueColumn::NumericValue.sibling(), ValueColumn::TextValue);
    }
}
