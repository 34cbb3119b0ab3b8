//! Value transforms: per-code binning and rounding of a value column.

use std::collections::HashMap;

use meds_common::{digitize, format_fixed, quantile, quantile_edges};
use meds_model::{EventTable, MedsError, Result, ValueColumn};

use crate::matching::CodeMatcher;

/// How a matched value is turned into a label.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueMethod {
    /// `k` equal-probability bins labelled `Q0..`.
    QuantileBin { k: usize },
    /// `low` below Q1, `normal` within `[Q1, Q3]`, `high` above Q3.
    ThreeLevel,
    /// Fixed decimal places; needs no training data.
    Round { decimals: usize },
}

impl ValueMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::QuantileBin { .. } => "quantile_bin",
            Self::ThreeLevel => "quantile_bin_3level",
            Self::Round { .. } => "round_numeric",
        }
    }

    fn needs_fit(&self) -> bool {
        !matches!(self, Self::Round { .. })
    }
}

/// Parameters fitted for a single code.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeFit {
    Edges(Vec<f64>),
    Quartiles { q1: f64, q2: f64, q3: f64 },
}

#[derive(Debug, Clone)]
pub struct ValueTransform {
    matcher: CodeMatcher,
    column: ValueColumn,
    method: ValueMethod,
    observed: HashMap<String, Vec<f64>>,
    fits: HashMap<String, CodeFit>,
    fitted: bool,
}

impl ValueTransform {
    pub fn new(matcher: CodeMatcher, column: ValueColumn, method: ValueMethod) -> Result<Self> {
        if matches!(method, ValueMethod::QuantileBin { k: 0 }) {
            return Err(MedsError::config("quantile_bin requires k >= 1"));
        }
        Ok(Self {
            matcher,
            column,
            method,
            observed: HashMap::new(),
            fits: HashMap::new(),
            fitted: false,
        })
    }

    pub fn name(&self) -> &'static str {
        self.method.name()
    }

    pub fn matcher(&self) -> &CodeMatcher {
        &self.matcher
    }

    pub fn column(&self) -> ValueColumn {
        self.column
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted || !self.method.needs_fit()
    }

    pub fn fit_for(&self, code: &str) -> Option<&CodeFit> {
        self.fits.get(code)
    }

    /// Accumulates float-coercible values of matching codes.
    pub fn observe(&mut self, table: &EventTable) {
        if !self.method.needs_fit() {
            return;
        }
        for event in table {
            if !self.matcher.matches(&event.code) {
                continue;
            }
            if let Some(value) = event.value_f64(self.column) {
                self.observed
                    .entry(event.code.clone())
                    .or_default()
                    .push(value);
            }
        }
    }

    /// Turns accumulated values into per-code parameters and frees them.
    pub fn finalize(&mut self) {
        let observed = std::mem::take(&mut self.observed);
        for (code, values) in observed {
            let fit = match self.method {
                ValueMethod::QuantileBin { k } => quantile_edges(&values, k).map(CodeFit::Edges),
                ValueMethod::ThreeLevel => match (
                    quantile(&values, 0.25),
                    quantile(&values, 0.5),
                    quantile(&values, 0.75),
                ) {
                    (Some(q1), Some(q2), Some(q3)) => Some(CodeFit::Quartiles { q1, q2, q3 }),
                    _ => None,
                },
                ValueMethod::Round { .. } => None,
            };
            if let Some(fit) = fit {
                tracing::debug!(code = %code, samples = values.len(), ?fit, "fitted code");
                self.fits.insert(code, fit);
            }
        }
        self.fitted = true;
        tracing::info!(
            transform = self.name(),
            matcher = %self.matcher,
            codes = self.fits.len(),
            "value transform fitted"
        );
    }

    /// Label for a matched code and parsed value, `None` when the value passes through.
    pub fn label(&self, code: &str, value: f64) -> Option<String> {
        match (&self.method, self.fits.get(code)) {
            (ValueMethod::Round { decimals }, _) => Some(format_fixed(value, *decimals)),
            (ValueMethod::QuantileBin { .. }, Some(CodeFit::Edges(edges))) => {
                let interior = &edges[1..edges.len() - 1];
                Some(format!("Q{}", digitize(value, interior)))
            }
            (ValueMethod::ThreeLevel, Some(CodeFit::Quartiles { q1, q3, .. })) => {
                let level = if value < *q1 {
                    "low"
                } else if value <= *q3 {
                    "normal"
                } else {
                    "high"
                };
                Some(level.to_string())
            }
            _ => None,
        }
    }

    /// Rewrites the value column of matching rows.
    ///
    /// Non-matching, missing and unparsable values, and codes unseen at fit
    /// time, pass through untouched.
    pub fn encode(&self, table: &mut EventTable) -> Result<()> {
        if !self.is_fitted() {
            return Err(MedsError::not_fitted(self.name()));
        }
        let mut labelled = 0usize;
        for event in table.events_mut() {
            if !self.matcher.matches(&event.code) {
                continue;
            }
            let Some(value) = event.value_f64(self.column) else {
                continue;
            };
            if let Some(label) = self.label(&event.code, value) {
                event.set_label(self.column, label);
                labelled += 1;
            }
        }
        tracing::debug!(transform = self.name(), labelled, "encoded values");
        Ok(())
    }
}
