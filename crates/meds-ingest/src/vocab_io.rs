//! Vocabulary table persistence (`token,str,count`).

use std::path::Path;

use meds_model::{MedsError, Result, VocabEntry, Vocabulary};

pub const VOCAB_FILE: &str = "vocab.csv";

pub fn write_vocabulary(path: &Path, vocab: &Vocabulary) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MedsError::io(parent, e))?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| MedsError::csv(path, e))?;
    for entry in vocab.entries() {
        writer.serialize(entry).map_err(|e| MedsError::csv(path, e))?;
    }
    writer.flush().map_err(|e| MedsError::io(path, e))?;
    tracing::info!(path = %path.display(), size = vocab.len(), "wrote vocabulary");
    Ok(())
}

pub fn read_vocabulary(path: &Path) -> Result<Vocabulary> {
    if !path.is_file() {
        return Err(MedsError::missing_file(path));
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| MedsError::csv(path, e))?;
    let entries = reader
        .deserialize::<VocabEntry>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| MedsError::csv(path, e))?;
    Vocabulary::from_entries(entries)
}
