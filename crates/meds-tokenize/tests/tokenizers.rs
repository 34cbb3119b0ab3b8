use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use meds_ingest::{
    Split, check_subject_coverage, output_path_for_shard, read_encoded_timelines,
    write_event_table,
};
use meds_model::{BIRTH_CODE, Event, EventTable, MedsError};
use meds_tokenize::{Tokenizer, TokenizerConfig, TokenizerKind, subject_string};
use meds_transform::{Postprocessor, Preprocessor, TransformConfig, fit_jointly, load_timelines};

const TRANSFORMS: &str = r#"
[[preprocessors]]
type = "quantile_bin_3level"
matching_type = "starts_with"
matching_value = "LAB//"

[[preprocessors]]
type = "binned_age"

[[postprocessors]]
type = "time_interval"

[[postprocessors.interval_tokens]]
name = "5m-1h"
min = 5
max = 60

[[postprocessors.interval_tokens]]
name = "1h-"
min = 60

[[postprocessors]]
type = "remove_numeric"
"#;

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2130, 2, 1)
        .and_then(|d| d.and_hms_opt(6, 0, 0))
        .unwrap()
}

fn subject(subject_id: i64, glucose: f64) -> Vec<Event> {
    vec![
        Event::new(subject_id, Some(t0() - Duration::days(365 * 50 + 13)), BIRTH_CODE),
        Event::new(subject_id, Some(t0()), "ADMISSION//EW EMER.").with_text("transfer"),
        Event::new(subject_id, Some(t0() + Duration::minutes(30)), "LAB//GLUCOSE")
            .with_numeric(glucose),
        Event::new(subject_id, Some(t0() + Duration::hours(5)), "DISCHARGE"),
    ]
}

fn write_dataset(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for shard in 0..2i64 {
        let events = (0..4i64)
            .flat_map(|i| subject(shard * 10 + i, 80.0 + (shard * 4 + i) as f64 * 5.0))
            .collect();
        let path = root.join("train").join(format!("{shard}.parquet"));
        write_event_table(&path, &EventTable::new(events))?;
        files.push(path);
    }
    Ok(files)
}

fn fitted_transforms(files: &[PathBuf]) -> anyhow::Result<(Vec<Preprocessor>, Vec<Postprocessor>)> {
    let config = TransformConfig::from_toml_str(TRANSFORMS)?;
    let mut preprocessors = config.build_preprocessors()?;
    fit_jointly(&mut preprocessors, files)?;
    Ok((preprocessors, config.build_postprocessors()?))
}

#[test]
fn word_level_round_trips_and_aligns_timestamps() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_dataset(dir.path())?;
    let (pre, post) = fitted_transforms(&files)?;

    let config = TokenizerConfig::from_toml_str("type = \"word_level\"\nvocab_size = 200")?;
    let mut tokenizer = Tokenizer::from_config(&config)?;
    assert!(matches!(
        tokenizer.encode(&files[0], &pre, &post),
        Err(MedsError::NotTrained)
    ));
    tokenizer.train(&files, &pre, &post)?;

    let encoded = tokenizer.encode(&files[0], &pre, &post)?;
    let timelines = load_timelines(&files[0], &pre, &post)?;
    assert_eq!(encoded.len(), 4);
    for (record, timeline) in encoded.iter().zip(&timelines) {
        assert_eq!(record.subject_id, timeline.subject_id);
        assert!(record.is_aligned());
        assert_eq!(
            tokenizer.decode(&record.tokens)?,
            subject_string(timeline, config.options())
        );
        assert_eq!(record.timestamps.first(), Some(&0.0));
        assert_eq!(record.timestamps.last(), Some(&(5.0 * 3600.0)));
    }

    let first = &timelines[0];
    assert_eq!(
        first.codes(),
        vec![
            "AGE: 50-54",
            "ADMISSION//EW EMER.",
            "<time_interval_5m-1h>",
            "LAB//GLUCOSE",
            "<time_interval_1h->",
            "DISCHARGE"
        ]
    );
    Ok(())
}

#[test]
fn saved_tokenizers_encode_identically() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_dataset(dir.path())?;
    let (pre, post) = fitted_transforms(&files)?;

    for kind in [TokenizerKind::WordLevel, TokenizerKind::Bpe] {
        let mut config = TokenizerConfig::new(kind);
        config.vocab_size = Some(120);
        let mut tokenizer = Tokenizer::from_config(&config)?;
        tokenizer.train(&files, &pre, &post)?;

        let saved = dir.path().join(format!("tokenizer-{}", kind.as_str()));
        tokenizer.save(&saved)?;
        assert!(saved.join("vocab.csv").is_file());
        assert_eq!(saved.join("merges.json").is_file(), kind == TokenizerKind::Bpe);

        let loaded = Tokenizer::load(&saved)?;
        assert_eq!(loaded, tokenizer);
        assert_eq!(
            loaded.encode(&files[1], &pre, &post)?,
            tokenizer.encode(&files[1], &pre, &post)?
        );
    }
    Ok(())
}

#[test]
fn bpe_training_is_repeatable_over_files() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_dataset(dir.path())?;
    let (pre, post) = fitted_transforms(&files)?;

    let config = TokenizerConfig::from_toml_str("type = \"bpe\"\nvocab_size = 90")?;
    let mut first = Tokenizer::from_config(&config)?;
    let mut second = Tokenizer::from_config(&config)?;
    first.train(&files, &pre, &post)?;
    second.train(&files, &pre, &post)?;
    assert_eq!(first, second);

    let (Tokenizer::Bpe(bpe), Some(vocab)) = (&first, first.vocabulary()) else {
        panic!("expected a trained BPE tokenizer");
    };
    assert!(!bpe.merges().is_empty());
    assert!(vocab.len() <= 90);

    let encoded = first.encode(&files[0], &pre, &post)?;
    let timelines = load_timelines(&files[0], &pre, &post)?;
    assert!(encoded.iter().all(|record| record.is_aligned()));
    assert_eq!(
        first.decode(&encoded[0].tokens)?,
        subject_string(&timelines[0], config.options())
    );
    Ok(())
}

#[test]
fn decode_names_the_invalid_id() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_dataset(dir.path())?;
    let (pre, post) = fitted_transforms(&files)?;
    let mut tokenizer = Tokenizer::from_config(&TokenizerConfig::new(TokenizerKind::WordLevel))?;
    tokenizer.train(&files, &pre, &post)?;

    let err = tokenizer.decode(&[0, 1, 9_999]).unwrap_err();
    assert!(err.to_string().contains("[9999]"), "{err}");
    Ok(())
}

#[test]
fn encoded_outputs_cover_every_subject() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_dataset(dir.path())?;
    let (pre, post) = fitted_transforms(&files)?;
    let mut tokenizer = Tokenizer::from_config(&TokenizerConfig::new(TokenizerKind::WordLevel))?;
    tokenizer.train(&files, &pre, &post)?;

    let out_root = dir.path().join("encoded");
    let mut outputs = Vec::new();
    for shard in &files {
        let out = output_path_for_shard(&out_root, Split::Train, shard);
        assert_eq!(tokenizer.encode_to_file(shard, &out, &pre, &post)?, 4);
        assert_eq!(read_encoded_timelines(&out)?.len(), 4);
        outputs.push(out);
    }
    let coverage = check_subject_coverage(&files, &outputs)?;
    assert!(coverage.is_complete(), "{coverage:?}");
    Ok(())
}
