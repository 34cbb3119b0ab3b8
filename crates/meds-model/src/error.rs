use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised across the tokenization workspace.
///
/// Data-quality conditions (unparsable values, unmatched codes, subjects
/// missing from lookups) are deliberately absent: they have fallbacks.
#[derive(Debug, Error)]
pub enum MedsError {
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("missing file: {path}")]
    MissingFile { path: PathBuf },

    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to process parquet {path}: {message}")]
    Parquet { path: PathBuf, message: String },

    #[error("failed to parse CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("failed to process JSON {path}: {message}")]
    Json { path: PathBuf, message: String },

    #[error("column '{column}' not found; available columns: {available}")]
    MissingColumn { column: String, available: String },

    #[error("{name} must be fitted before encoding")]
    NotFitted { name: String },

    #[error("tokenizer is not trained yet")]
    NotTrained,

    #[error("token '{token}' not found in vocabulary")]
    UnknownToken { token: String },

    #[error(
        "found {count} invalid token id(s) not in vocabulary: {ids:?}; valid range is 0 to {max_id}",
        count = ids.len(),
        max_id = vocab_size.saturating_sub(1)
    )]
    InvalidTokenIds { ids: Vec<i64>, vocab_size: usize },

    #[error("error processing file {path}: {source}")]
    ShardFailed {
        path: PathBuf,
        #[source]
        source: Box<MedsError>,
    },
}

impl MedsError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    pub fn csv(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Csv {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn parquet(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parquet {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn json(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Json {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_column(column: impl Into<String>, available: &[String]) -> Self {
        Self::MissingColumn {
            column: column.into(),
            available: available.join(", "),
        }
    }

    pub fn not_fitted(name: impl Into<String>) -> Self {
        Self::NotFitted { name: name.into() }
    }

    /// Wraps an error raised while processing `path` so the failing shard is named.
    pub fn in_shard(self, path: &Path) -> Self {
        match self {
            already @ Self::ShardFailed { .. } => already,
            other => Self::ShardFailed {
                path: path.to_path_buf(),
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, MedsError>;

/// Fails fast when any of the given files does not exist.
pub fn ensure_files_exist<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MedsError::missing_file(path));
        }
    }
    Ok(())
}
