//! Shard discovery over the `train/`, `tuning/`, `held_out/` layout.

use std::fmt;
use std::path::{Path, PathBuf};

use meds_model::{MedsError, Result};

/// Dataset partition a shard belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Split {
    Train,
    Tuning,
    HeldOut,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Tuning, Split::HeldOut];

    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Tuning => "tuning",
            Self::HeldOut => "held_out",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Shard files of every split, each list sorted by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetFiles {
    pub train: Vec<PathBuf>,
    pub tuning: Vec<PathBuf>,
    pub held_out: Vec<PathBuf>,
}

impl DatasetFiles {
    pub fn get(&self, split: Split) -> &[PathBuf] {
        match split {
            Split::Train => &self.train,
            Split::Tuning => &self.tuning,
            Split::HeldOut => &self.held_out,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.tuning.len() + self.held_out.len()
    }
}

/// Lists the parquet shards directly inside `dir`.
///
/// Any other regular file is rejected so a half-converted dataset is caught
/// before a run starts.
pub fn list_shards(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MedsError::missing_file(dir));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| MedsError::io(dir, e))?;
    let mut files = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| MedsError::io(dir, e))?;
        let path = entry.path();

        // Skip directories
        if !path.is_file() {
            continue;
        }

        let is_parquet = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
        if !is_parquet {
            return Err(MedsError::config(format!(
                "{} contains a non-parquet file: {}",
                dir.display(),
                path.display()
            )));
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Discovers the shards of all three splits under `root`.
pub fn discover_dataset(root: &Path) -> Result<DatasetFiles> {
    for split in Split::ALL {
        let dir = root.join(split.dir_name());
        if !dir.is_dir() {
            return Err(MedsError::config(format!(
                "data path {} does not contain the expected '{}' directory",
                root.display(),
                split
            )));
        }
    }

    let files = DatasetFiles {
        train: list_shards(&root.join(Split::Train.dir_name()))?,
        tuning: list_shards(&root.join(Split::Tuning.dir_name()))?,
        held_out: list_shards(&root.join(Split::HeldOut.dir_name()))?,
    };
    tracing::info!(
        train = files.train.len(),
        tuning = files.tuning.len(),
        held_out = files.held_out.len(),
        "discovered dataset shards"
    );
    Ok(files)
}
