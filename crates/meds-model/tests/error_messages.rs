use std::path::Path;

use meds_model::MedsError;

#[test]
fn invalid_ids_message_lists_all_ids() {
    let err = MedsError::InvalidTokenIds {
        ids: vec![99, 120],
        vocab_size: 10,
    };
    assert_eq!(
        err.to_string(),
        "found 2 invalid token id(s) not in vocabulary: [99, 120]; valid range is 0 to 9"
    );
}

#[test]
fn shard_failure_names_file_once() {
    let inner = MedsError::missing_column("code", &["subject_id".to_string(), "time".to_string()]);
    let wrapped = inner.in_shard(Path::new("train/0.parquet"));
    let rewrapped = wrapped.in_shard(Path::new("train/1.parquet"));
    let message = rewrapped.to_string();
    assert!(message.starts_with("error processing file train/0.parquet"));
    assert!(message.contains("available columns: subject_id, time"));
}

#[test]
fn missing_files_fail_before_processing() {
    let dir = std::env::temp_dir();
    let missing = dir.join("meds-model-definitely-missing.parquet");
    let err = meds_model::ensure_files_exist(&[dir.clone(), missing.clone()]).unwrap_err();
    assert!(matches!(err, MedsError::MissingFile { path } if path == missing));
}

#[test]
fn encoded_timeline_serializes_as_record() {
    let timeline = meds_model::EncodedTimeline {
        subject_id: 7,
        tokens: vec![1, 4],
        timestamps: vec![0.0, 60.0],
    };
    let json = serde_json::to_string(&timeline).unwrap();
    assert_eq!(json, r#"{"subject_id":7,"tokens":[1,4],"timestamps":[0.0,60.0]}"#);
}
