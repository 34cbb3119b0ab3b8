//! Preprocessors: column-level rewrites of an [`EventTable`].
//!
//! - **value**: quantile, three-level and rounding value transforms
//! - **code**: code truncation and lookup-table enrichment
//! - **age**: age encoders derived from the birth marker
//! - **aggregation**: population-binned demographic measurements
//! - **static_data**: per-subject values injected from a CSV
//! - **structural**: dispatch for event-adding transforms

pub mod age;
pub mod aggregation;
pub mod code;
pub mod static_data;
pub mod structural;
pub mod value;

use std::path::PathBuf;

use meds_model::{EventTable, Result};

pub use age::{AgeEncoder, AgeUnit, AgeVariant, EthosAge};
pub use aggregation::{Aggregation, DemographicAggregation, Measurement};
pub use code::{CodeEnrichment, CodeTransform, KeyType, Template};
pub use static_data::{StaticColumn, StaticDataLoader};
pub use structural::StructuralTransform;
pub use value::{CodeFit, ValueMethod, ValueTransform};

/// A configured preprocessor.
#[derive(Debug, Clone)]
pub enum Preprocessor {
    Value(ValueTransform),
    Code(CodeTransform),
    Structural(StructuralTransform),
}

impl Preprocessor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Value(transform) => transform.name(),
            Self::Code(transform) => transform.name(),
            Self::Structural(transform) => transform.name(),
        }
    }

    /// Loads external resources (lookup tables, static CSVs).
    pub fn prepare(&mut self) -> Result<()> {
        match self {
            Self::Value(_) => Ok(()),
            Self::Code(transform) => transform.prepare(),
            Self::Structural(transform) => transform.prepare(),
        }
    }

    /// Rewrites later preprocessors must observe while fitting.
    pub fn is_rewrite(&self) -> bool {
        matches!(
            self,
            Self::Code(_) | Self::Structural(StructuralTransform::DataReshaping)
        )
    }

    pub fn observe(&mut self, table: &EventTable) {
        match self {
            Self::Value(transform) => transform.observe(table),
            Self::Code(_) => {}
            Self::Structural(transform) => transform.observe(table),
        }
    }

    pub fn finalize(&mut self) {
        match self {
            Self::Value(transform) => transform.finalize(),
            Self::Code(_) => {}
            Self::Structural(transform) => transform.finalize(),
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            Self::Value(transform) => transform.is_fitted(),
            Self::Code(transform) => transform.is_ready(),
            Self::Structural(transform) => transform.is_ready(),
        }
    }

    pub fn encode(&self, mut table: EventTable) -> Result<EventTable> {
        match self {
            Self::Value(transform) => {
                transform.encode(&mut table)?;
                Ok(table)
            }
            Self::Code(transform) => {
                transform.encode(&mut table)?;
                Ok(table)
            }
            Self::Structural(transform) => transform.encode(table),
        }
    }

    /// Fits this preprocessor alone; see [`crate::fit::fit_jointly`].
    pub fn fit(&mut self, files: &[PathBuf]) -> Result<()> {
        crate::fit::fit_jointly(std::slice::from_mut(self), files)
    }
}

impl From<ValueTransform> for Preprocessor {
    fn from(transform: ValueTransform) -> Self {
        Self::Value(transform)
    }
}

impl From<CodeTransform> for Preprocessor {
    fn from(transform: CodeTransform) -> Self {
        Self::Code(transform)
    }
}

impl From<StructuralTransform> for Preprocessor {
    fn from(transform: StructuralTransform) -> Self {
        Self::Structural(transform)
    }
}
