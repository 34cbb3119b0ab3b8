//! Population-binned aggregates of repeated demographic measurements.

use meds_common::{digitize, mean, median, quantile_edges};
use meds_model::{Event, EventTable, MedsError, Result, STATIC_DATA_NO_CODE, ValueColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Min,
    Max,
    Median,
}

impl Aggregation {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "median" => Ok(Self::Median),
            other => Err(MedsError::config(format!(
                "aggregation must be one of mean, min, max, median; got '{other}'"
            ))),
        }
    }

    pub fn apply(self, values: &[f64]) -> Option<f64> {
        match self {
            Self::Mean => mean(values),
            Self::Median => median(values),
            Self::Min => values.iter().copied().reduce(f64::min),
            Self::Max => values.iter().copied().reduce(f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Codes starting with this pattern are aggregated.
    pub token_pattern: String,
    pub value_column: ValueColumn,
    pub aggregation: Aggregation,
    pub num_bins: usize,
    pub token_prefix: String,
    pub insert_code: bool,
    pub remove_original_tokens: bool,
    pub bin_labels: Option<Vec<String>>,
}

impl Measurement {
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.token_pattern.is_empty() {
            return Err(MedsError::config(format!(
                "measurement {index}: token_pattern must not be empty"
            )));
        }
        if self.num_bins < 2 {
            return Err(MedsError::config(format!(
                "measurement {index}: num_bins must be at least 2"
            )));
        }
        if let Some(labels) = &self.bin_labels
            && labels.len() != self.num_bins
        {
            return Err(MedsError::config(format!(
                "measurement {index}: bin_labels must have length {}",
                self.num_bins
            )));
        }
        Ok(())
    }

    fn matches(&self, event: &Event) -> bool {
        event.code.starts_with(self.token_pattern.as_str())
    }

    /// Aggregate of one subject's float-coercible values, if any.
    pub fn aggregate(&self, events: &[Event]) -> Option<f64> {
        let values: Vec<f64> = events
            .iter()
            .filter(|event| self.matches(event))
            .filter_map(|event| event.value_f64(self.value_column))
            .collect();
        self.aggregation.apply(&values)
    }

    fn code(&self) -> String {
        if self.token_prefix.is_empty() {
            "DEMOGRAPHIC".to_string()
        } else {
            self.token_prefix.trim_end_matches('/').to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemographicAggregation {
    measurements: Vec<Measurement>,
    observed: Vec<Vec<f64>>,
    edges: Vec<Option<Vec<f64>>>,
    fitted: bool,
}

impl DemographicAggregation {
    pub fn new(measurements: Vec<Measurement>) -> Result<Self> {
        if measurements.is_empty() {
            return Err(MedsError::config(
                "demographic_aggregation requires at least one measurement",
            ));
        }
        for (index, measurement) in measurements.iter().enumerate() {
            measurement.validate(index)?;
        }
        let count = measurements.len();
        Ok(Self {
            measurements,
            observed: vec![Vec::new(); count],
            edges: vec![None; count],
            fitted: false,
        })
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn edges(&self, index: usize) -> Option<&[f64]> {
        self.edges.get(index).and_then(|e| e.as_deref())
    }

    /// Collects one aggregate per subject and measurement.
    pub fn observe(&mut self, table: &EventTable) {
        for timeline in table.group_by_subject() {
            for (index, measurement) in self.measurements.iter().enumerate() {
                if let Some(value) = measurement.aggregate(&timeline.events) {
                    self.observed[index].push(value);
                }
            }
        }
    }

    pub fn finalize(&mut self) {
        for (index, measurement) in self.measurements.iter().enumerate() {
            let values = std::mem::take(&mut self.observed[index]);
            self.edges[index] = quantile_edges(&values, measurement.num_bins);
            if self.edges[index].is_none() {
                tracing::warn!(
                    pattern = %measurement.token_pattern,
                    "no values observed for measurement; it will emit no tokens"
                );
            } else {
                tracing::info!(
                    pattern = %measurement.token_pattern,
                    subjects = values.len(),
                    bins = measurement.num_bins,
                    "fitted demographic bins"
                );
            }
        }
        self.fitted = true;
    }

    pub fn bin_label(&self, index: usize, value: f64) -> Option<String> {
        let edges = self.edges(index)?;
        let bin = digitize(value, &edges[1..edges.len() - 1]);
        match &self.measurements[index].bin_labels {
            Some(labels) => labels.get(bin).cloned(),
            None => Some(format!("Q{}", bin + 1)),
        }
    }

    pub fn encode_subject(&self, subject_id: i64, events: Vec<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        for (index, measurement) in self.measurements.iter().enumerate() {
            let Some(label) = measurement
                .aggregate(&events)
                .and_then(|value| self.bin_label(index, value))
            else {
                continue;
            };
            let event = if measurement.insert_code {
                Event::static_event(subject_id, measurement.code()).with_text(label)
            } else {
                Event::static_event(subject_id, STATIC_DATA_NO_CODE)
                    .with_text(format!("{}{label}", measurement.token_prefix))
            };
            out.push(event);
        }
        out.extend(events.into_iter().filter(|event| {
            !self
                .measurements
                .iter()
                .any(|m| m.remove_original_tokens && m.matches(event))
        }));
        out
    }
}
