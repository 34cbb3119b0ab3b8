//! Shared utilities for the MEDS tokenization crates.
//!
//! This crate provides common utilities used across the workspace:
//!
//! - **polars**: `AnyValue` coercion into plain Rust values
//! - **numeric**: float parsing and Python-compatible float formatting
//! - **stats**: order statistics used by the binning transforms
//! - **logging**: `tracing-subscriber` initialisation for host binaries

pub mod logging;
pub mod numeric;
pub mod polars;
pub mod stats;

// Re-export commonly used functions at crate root for convenience
pub use numeric::{format_float, format_fixed, parse_f64, parse_i64};
pub use polars::{any_to_datetime, any_to_f64, any_to_i64, any_to_string, any_to_string_opt};
pub use stats::{digitize, mean, median, quantile, quantile_edges};
