//! Encoded output persistence, one JSON collection per input shard.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use meds_model::{EncodedTimeline, MedsError, Result};

use crate::discovery::Split;

/// `<out>/<split>/<shard stem>.json`
pub fn output_path_for_shard(out_root: &Path, split: Split, shard: &Path) -> PathBuf {
    let stem = shard
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("shard");
    out_root.join(split.dir_name()).join(format!("{stem}.json"))
}

pub fn write_encoded_timelines(path: &Path, timelines: &[EncodedTimeline]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MedsError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| MedsError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, timelines).map_err(|e| MedsError::json(path, e))?;
    writer.flush().map_err(|e| MedsError::io(path, e))?;
    tracing::debug!(path = %path.display(), subjects = timelines.len(), "wrote encoded shard");
    Ok(())
}

pub fn read_encoded_timelines(path: &Path) -> Result<Vec<EncodedTimeline>> {
    let file = File::open(path).map_err(|e| MedsError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| MedsError::json(path, e))
}
