use std::path::PathBuf;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use meds_ingest::write_event_table;
use meds_model::{BIRTH_CODE, Event, EventTable, EventValue, MedsError, STATIC_DATA_NO_CODE};
use meds_transform::preprocess::{CodeFit, StructuralTransform};
use meds_transform::{
    Preprocessor, TransformConfig, fit_jointly, load_timelines, transform_table,
};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2130, 1, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap()
}

fn lab_shard(subject_offset: i64, values: impl Iterator<Item = f64>) -> EventTable {
    let events = values
        .enumerate()
        .map(|(i, value)| {
            let subject_id = subject_offset + (i as i64 % 5);
            Event::new(
                subject_id,
                Some(t0() + Duration::hours(i as i64)),
                "LAB//51237//mg/dL",
            )
            .with_numeric(value)
        })
        .collect();
    EventTable::new(events)
}

const CHAIN: &str = r#"
[[preprocessors]]
type = "code_truncation"
matching_type = "starts_with"
matching_value = "LAB//"

[[preprocessors]]
type = "quantile_bin"
matching_type = "equals"
matching_value = "LAB//51237"
k = 4
"#;

fn write_shards(dir: &std::path::Path) -> anyhow::Result<Vec<PathBuf>> {
    let first = dir.join("train").join("0.parquet");
    let second = dir.join("train").join("1.parquet");
    write_event_table(&first, &lab_shard(1, (1..=50).map(f64::from)))?;
    write_event_table(&second, &lab_shard(10, (51..=100).map(f64::from)))?;
    Ok(vec![first, second])
}

#[test]
fn joint_fit_sees_rewritten_codes_across_shards() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let files = write_shards(dir.path())?;
    let mut preprocessors = TransformConfig::from_toml_str(CHAIN)?.build_preprocessors()?;
    fit_jointly(&mut preprocessors, &files)?;

    let Preprocessor::Value(binning) = &preprocessors[1] else {
        panic!("expected a value transform");
    };
    let Some(CodeFit::Edges(edges)) = binning.fit_for("LAB//51237") else {
        panic!("no edges fitted for the truncated code");
    };
    assert_eq!(edges.len(), 5);
    assert_eq!(edges[0], 1.0);
    assert_eq!(edges[4], 100.0);
    assert!(binning.fit_for("LAB//51237//mg/dL").is_none());

    let timelines = load_timelines(&files[0], &preprocessors, &[])?;
    assert_eq!(timelines.len(), 5);
    for event in timelines.iter().flat_map(|t| &t.events) {
        assert_eq!(event.code, "LAB//51237");
        let Some(EventValue::Label(label)) = &event.numeric_value else {
            panic!("value was not binned: {:?}", event.numeric_value);
        };
        assert!(["Q0", "Q1", "Q2"].contains(&label.as_str()), "{label}");
    }
    Ok(())
}

#[test]
fn missing_shard_fails_before_processing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut files = write_shards(dir.path())?;
    files.push(dir.path().join("train").join("absent.parquet"));
    let mut preprocessors = TransformConfig::from_toml_str(CHAIN)?.build_preprocessors()?;

    let err = fit_jointly(&mut preprocessors, &files).unwrap_err();
    assert!(matches!(err, MedsError::MissingFile { .. }));
    assert!(!preprocessors[1].is_ready());
    Ok(())
}

#[test]
fn corrupt_shard_names_the_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut files = write_shards(dir.path())?;
    let corrupt = dir.path().join("train").join("2.parquet");
    std::fs::write(&corrupt, b"not a parquet file")?;
    files.push(corrupt.clone());
    let mut preprocessors = TransformConfig::from_toml_str(CHAIN)?.build_preprocessors()?;

    match fit_jointly(&mut preprocessors, &files) {
        Err(MedsError::ShardFailed { path, .. }) => assert_eq!(path, corrupt),
        other => panic!("expected a shard failure, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unfitted_chain_is_rejected() -> anyhow::Result<()> {
    let preprocessors = TransformConfig::from_toml_str(CHAIN)?.build_preprocessors()?;
    let err = transform_table(lab_shard(1, [1.0].into_iter()), &preprocessors, &[]).unwrap_err();
    assert!(matches!(err, MedsError::NotFitted { .. }));
    Ok(())
}

#[test]
fn static_data_covers_every_subject() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("patients.csv");
    std::fs::write(&csv, "subject_id,gender,race\n1,f,white\n")?;
    let config = format!(
        r#"
[[preprocessors]]
type = "load_static_data"
csv_path = "{}"
subject_id_column = "subject_id"

[[preprocessors.columns]]
column_name = "gender"
code_template = "GENDER"
valid_values = ["F", "M"]

[[preprocessors.columns]]
column_name = "race"
code_template = "RACE"
insert_code = false
value_prefix = "RACE//"

[[preprocessors]]
type = "binned_age"

[[postprocessors]]
type = "demographic_sort_order"
token_patterns = ["AGE", "GENDER", "RACE//"]
"#,
        csv.display().to_string().replace('\\', "/")
    );
    let config = TransformConfig::from_toml_str(&config)?;
    let mut preprocessors = config.build_preprocessors()?;
    let postprocessors = config.build_postprocessors()?;
    fit_jointly(&mut preprocessors, &[])?;
    assert!(matches!(
        preprocessors[0],
        Preprocessor::Structural(StructuralTransform::StaticData(_))
    ));

    let table = EventTable::new(vec![
        Event::new(2, Some(t0()), "ADMISSION"),
        Event::new(1, Some(t0() - Duration::days(365 * 40 + 10)), BIRTH_CODE),
        Event::new(1, Some(t0()), "ADMISSION"),
    ]);
    let timelines = transform_table(table, &preprocessors, &postprocessors)?;
    assert_eq!(timelines.len(), 2);

    let first = &timelines[0];
    assert_eq!(first.subject_id, 1);
    assert_eq!(first.codes(), vec!["AGE: 40-44", "GENDER", STATIC_DATA_NO_CODE, "ADMISSION"]);
    assert_eq!(first.events[1].text_value.as_deref(), Some("F"));
    assert_eq!(first.events[2].text_value.as_deref(), Some("RACE//WHITE"));

    let second = &timelines[1];
    assert_eq!(second.subject_id, 2);
    let statics: Vec<_> = second.events.iter().filter(|e| e.is_static()).collect();
    assert_eq!(statics.len(), 2);
    assert_eq!(statics[0].text_value.as_deref(), Some("UNKNOWN"));
    assert_eq!(statics[1].text_value.as_deref(), Some("RACE//UNKNOWN"));
    Ok(())
}
