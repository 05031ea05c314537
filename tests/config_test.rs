//! Layered configuration, including environment overrides.
//!
//! Environment variables are process-wide, so everything that depends on
//! them lives in this one test.

use crabrecord::config::CrabRecordConfig;
use crabrecord::errors::RecordingError;
use crabrecord::recording::RecordingQuality;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn environment_overrides_file_and_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crabrecord.toml");
    fs::write(
        &path,
        r#"
[recording]
quality = "high"
fast_start = false

[writer]
track_capacity = 32
"#,
    )
    .unwrap();

    std::env::set_var("CRABRECORD_WRITER__TRACK_CAPACITY", "128");
    std::env::set_var("CRABRECORD_OUTPUT__EXTENSION", "mov");
    let layered = CrabRecordConfig::load_layered(Some(&path));
    let without_file = CrabRecordConfig::load_layered(None::<&Path>);

    std::env::set_var("CRABRECORD_WRITER__TRACK_CAPACITY", "0");
    let invalid = CrabRecordConfig::load_layered(None::<&Path>);

    std::env::remove_var("CRABRECORD_WRITER__TRACK_CAPACITY");
    std::env::remove_var("CRABRECORD_OUTPUT__EXTENSION");

    let layered = layered.unwrap();
    assert_eq!(layered.writer.track_capacity, 128);
    assert_eq!(layered.output.extension, "mov");
    assert_eq!(layered.recording.quality, RecordingQuality::High);
    assert_eq!(
        (layered.recording.video.width, layered.recording.video.height),
        RecordingQuality::High.resolution()
    );
    assert_eq!(layered.recording.video.bitrate, RecordingQuality::High.bitrate());
    assert!(!layered.recording.fast_start);
    assert!(layered.writer.background);

    let without_file = without_file.unwrap();
    assert_eq!(without_file.writer.track_capacity, 128);
    assert_eq!(without_file.recording, CrabRecordConfig::default().recording);

    assert!(matches!(invalid, Err(RecordingError::InvalidConfig(_))));
}

#[test]
fn malformed_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[writer\ntrack_capacity = ").unwrap();

    assert!(matches!(
        CrabRecordConfig::load_from_file(&path),
        Err(RecordingError::InvalidConfig(_))
    ));
}
