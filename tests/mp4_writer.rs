//! MP4 writer behaviour behind the `mp4` feature
//!
//! Run with: cargo test --test mp4_writer --features mp4

use crabrecord::errors::{RecordingError, WriterError};
use crabrecord::recording::{
    ChannelListener, RecordingConfig, RecordingCoordinator, RecordingEvent, SampleOutcome,
    TimestampedTarget,
};
use crabrecord::testing::{synthetic_audio_sample, synthetic_video_sample};
use crabrecord::writer::{
    AudioTrackConfig, ContainerWriter, Mp4Writer, Mp4WriterFactory, TrackConfig, VideoCodec,
    VideoTrackConfig, WriterStatus,
};
use crabrecord::{MediaKind, MediaTime, SampleStream};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn config() -> RecordingConfig {
    RecordingConfig::new(320, 240, 30.0).with_title("mp4 writer test")
}

#[test]
fn create_makes_file_and_starts_unopened() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("unopened.mp4");
    let writer = Mp4Writer::create(&path, &config()).unwrap();

    assert!(path.exists());
    assert_eq!(writer.status(), WriterStatus::Unopened);
    assert_eq!(writer.output_path(), path.as_path());
}

#[test]
fn create_fails_for_missing_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("out.mp4");
    assert!(matches!(
        Mp4Writer::create(&path, &config()),
        Err(WriterError::Io(_))
    ));
}

#[test]
fn track_declarations_are_validated() {
    let dir = tempdir().unwrap();
    let mut writer = Mp4Writer::create(dir.path().join("tracks.mp4"), &config()).unwrap();

    let mut h265 = VideoTrackConfig::new(320, 240, 30.0);
    h265.codec = VideoCodec::H265;
    assert!(matches!(
        writer.add_track(&TrackConfig::Video(h265)),
        Err(WriterError::Rejected(_))
    ));
    assert!(matches!(
        writer.add_track(&TrackConfig::Video(VideoTrackConfig::new(0, 240, 30.0))),
        Err(WriterError::Rejected(_))
    ));

    let video = writer
        .add_track(&TrackConfig::Video(VideoTrackConfig::new(320, 240, 30.0)))
        .unwrap();
    assert_eq!(video.kind(), MediaKind::Video);
    assert!(matches!(
        writer.add_track(&TrackConfig::Video(VideoTrackConfig::new(320, 240, 30.0))),
        Err(WriterError::DuplicateTrack(_))
    ));

    let audio = writer
        .add_track(&TrackConfig::Audio(AudioTrackConfig::default()))
        .unwrap();
    assert_ne!(audio, video);
}

#[test]
fn start_requires_video_track() {
    let dir = tempdir().unwrap();
    let mut writer = Mp4Writer::create(dir.path().join("audio-only.mp4"), &config()).unwrap();
    writer
        .add_track(&TrackConfig::Audio(AudioTrackConfig::default()))
        .unwrap();
    assert!(writer.start_writing().is_err());
}

#[test]
fn readiness_and_session_rules() {
    let dir = tempdir().unwrap();
    let mut writer = Mp4Writer::create(dir.path().join("session.mp4"), &config()).unwrap();
    let video = writer
        .add_track(&TrackConfig::Video(VideoTrackConfig::new(320, 240, 30.0)))
        .unwrap();
    let audio = writer
        .add_track(&TrackConfig::Audio(AudioTrackConfig::default()))
        .unwrap();
    assert!(!writer.is_ready_for_more_data(video));

    writer.start_writing().unwrap();
    assert_eq!(writer.status(), WriterStatus::Writing);
    assert!(writer.is_ready_for_more_data(video));
    assert!(writer.is_ready_for_more_data(audio));

    // No session origin yet
    let early = writer.append(video, SampleStream::video(MediaTime::from_millis(10), vec![0u8; 4], true));
    assert!(matches!(early, Err(WriterError::Rejected(_))));

    writer.begin_session(MediaTime::from_millis(100));
    let before = writer.append(audio, SampleStream::audio(MediaTime::from_millis(90), vec![0u8; 4]));
    assert!(matches!(before, Err(WriterError::Rejected(_))));

    writer.mark_finished(video);
    assert!(!writer.is_ready_for_more_data(video));
    assert!(writer.is_ready_for_more_data(audio));
    let late = writer.append(video, SampleStream::video(MediaTime::from_millis(200), vec![0u8; 4], false));
    assert!(matches!(late, Err(WriterError::TrackFinished(_))));
}

#[test]
fn finish_before_start_fails() {
    let dir = tempdir().unwrap();
    let writer = Mp4Writer::create(dir.path().join("never.mp4"), &config()).unwrap();
    assert!(matches!(
        Box::new(writer).finish(),
        Err(WriterError::NotWriting(_))
    ));
}

#[test]
fn finish_without_video_frames_fails() {
    let dir = tempdir().unwrap();
    let mut writer = Mp4Writer::create(dir.path().join("empty.mp4"), &config()).unwrap();
    let video = writer
        .add_track(&TrackConfig::Video(VideoTrackConfig::new(320, 240, 30.0)))
        .unwrap();
    writer.start_writing().unwrap();
    writer.begin_session(MediaTime::ZERO);

    // A keyframe without SPS/PPS carries no codec configuration
    let bare_idr = SampleStream::video(MediaTime::ZERO, vec![0, 0, 0, 1, 0x65, 0x88, 0x84], true);
    assert!(matches!(writer.append(video, bare_idr), Err(WriterError::Muxer(_))));
    assert_eq!(writer.status(), WriterStatus::Writing);

    assert!(matches!(Box::new(writer).finish(), Err(WriterError::Muxer(_))));
}

#[test]
fn synthetic_samples_are_committed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("direct.mp4");
    let mut writer = Mp4Writer::create(&path, &config()).unwrap();
    let video = writer
        .add_track(&TrackConfig::Video(VideoTrackConfig::new(320, 240, 30.0)))
        .unwrap();
    let audio = writer
        .add_track(&TrackConfig::Audio(AudioTrackConfig::default()))
        .unwrap();
    writer.start_writing().unwrap();
    writer.begin_session(MediaTime::from_millis(500));

    for i in 0..10u64 {
        let at = MediaTime::from_millis(500 + i * 33);
        writer.append(video, synthetic_video_sample(i, at)).unwrap();
        writer.append(audio, synthetic_audio_sample(i, at)).unwrap();
    }

    let output = Box::new(writer).finish().unwrap();
    assert_eq!(output.video_frames, 10);
    assert_eq!(output.audio_frames, 10);
    assert!(output.bytes_written > 0);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

fn mp4_coordinator(dir: &std::path::Path) -> (RecordingCoordinator, Receiver<RecordingEvent>) {
    let (listener, events) = ChannelListener::new();
    let coordinator = RecordingCoordinator::builder(Mp4WriterFactory)
        .config(config())
        .target(TimestampedTarget::new(dir, "mp4"))
        .listener(Arc::new(listener))
        .build()
        .unwrap();
    (coordinator, events)
}

fn completion(events: &Receiver<RecordingEvent>) -> RecordingEvent {
    loop {
        let event = events.recv_timeout(Duration::from_secs(10)).unwrap();
        if !matches!(event, RecordingEvent::Started { .. }) {
            return event;
        }
    }
}

#[test]
fn coordinator_cycle_writes_playable_tracks() {
    let dir = tempdir().unwrap();
    let (coordinator, events) = mp4_coordinator(dir.path());

    coordinator.start().unwrap();
    let output = coordinator.current_output().unwrap();

    // Audio ahead of the first video frame is dropped, not written
    assert_eq!(
        coordinator.on_sample(synthetic_audio_sample(0, MediaTime::from_millis(990))),
        SampleOutcome::DroppedPreAnchor
    );
    for i in 0..12u64 {
        let base = 1_000 + i * 33;
        coordinator.on_sample(synthetic_video_sample(i, MediaTime::from_millis(base)));
        coordinator.on_sample(synthetic_audio_sample(i, MediaTime::from_millis(base + 5)));
    }
    assert!(coordinator.stop());

    match completion(&events) {
        RecordingEvent::Finished { output: written, stats } => {
            assert_eq!(written.path, output);
            assert_eq!(written.video_frames, 12);
            assert_eq!(written.audio_frames, 12);
            assert_eq!(stats.anchor, Some(MediaTime::from_millis(1_000)));
            assert!(written.duration_secs > 0.3);
        }
        other => panic!("expected Finished, got {:?}", other),
    }
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
    assert!(coordinator.wait_until_idle(Duration::from_secs(5)));
    assert!(events.try_recv().is_err());
}

#[test]
fn cycle_with_every_sample_rejected_reports_failure() {
    let dir = tempdir().unwrap();
    let (coordinator, events) = mp4_coordinator(dir.path());
    coordinator.start().unwrap();

    // Keyframes without parameter sets are refused by the muxer
    for i in 0..5u64 {
        let bare = SampleStream::video(MediaTime::from_millis(i * 33), vec![0, 0, 0, 1, 0x65, 0x88, i as u8 + 1], true);
        coordinator.on_sample(bare);
    }
    assert!(coordinator.stop());

    match completion(&events) {
        RecordingEvent::Failed { error, .. } => {
            assert!(matches!(error, RecordingError::FinalizeFailed(_)));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(coordinator.wait_until_idle(Duration::from_secs(5)));
}
