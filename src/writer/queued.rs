//! Background writer thread with per-track readiness
//!
//! Wraps any [`ContainerWriter`] and moves it onto a dedicated thread. The
//! coordinator appends by pushing into a channel, which never blocks; a
//! track is "ready" while fewer than `capacity` of its samples are still in
//! flight. When the disk or muxer falls behind, readiness drops and the
//! coordinator sheds frames instead of growing memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use super::{ContainerWriter, TrackConfig, TrackId, WriterFactory, WriterOutput, WriterStatus};
use crate::errors::{WriterError, WriterResult};
use crate::recording::RecordingConfig;
use crate::timing::MediaTime;
use crate::types::SampleStream;

/// Samples allowed in flight per track before it reports not-ready.
/// At 30fps video this is roughly two seconds of slack.
pub const DEFAULT_TRACK_CAPACITY: usize = 64;

enum Command {
    BeginSession(MediaTime),
    Append(TrackId, SampleStream),
    MarkFinished(TrackId),
}

struct Counters {
    pending: HashMap<TrackId, AtomicUsize>,
    failed: AtomicBool,
    append_errors: AtomicU64,
}

/// A writer that forwards all work to a background thread
pub struct QueuedWriter {
    path: PathBuf,
    capacity: usize,
    tracks: Vec<TrackId>,
    /// Present until `start_writing` hands it to the worker
    inner: Option<Box<dyn ContainerWriter>>,
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<Box<dyn ContainerWriter>>>,
    counters: Option<Arc<Counters>>,
}

impl QueuedWriter {
    pub fn new(inner: Box<dyn ContainerWriter>, capacity: usize) -> Self {
        Self {
            path: inner.output_path().to_path_buf(),
            capacity: capacity.max(1),
            tracks: Vec::new(),
            inner: Some(inner),
            sender: None,
            worker: None,
            counters: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples queued for `track` that the worker has not yet written
    pub fn pending(&self, track: TrackId) -> usize {
        self.counters
            .as_ref()
            .and_then(|c| c.pending.get(&track))
            .map(|p| p.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    fn send(&self, command: Command) -> WriterResult<()> {
        let sender = self.sender.as_ref().ok_or(WriterError::Closed)?;
        sender.send(command).map_err(|_| {
            if let Some(counters) = &self.counters {
                counters.failed.store(true, Ordering::Release);
            }
            WriterError::Closed
        })
    }
}

fn run_worker(
    mut inner: Box<dyn ContainerWriter>,
    receiver: Receiver<Command>,
    counters: Arc<Counters>,
) -> Box<dyn ContainerWriter> {
    for command in receiver {
        match command {
            Command::BeginSession(at) => inner.begin_session(at),
            Command::Append(track, sample) => {
                if let Err(e) = inner.append(track, sample) {
                    counters.append_errors.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Background append to {} failed: {}", track, e);
                }
                if let Some(pending) = counters.pending.get(&track) {
                    pending.fetch_sub(1, Ordering::AcqRel);
                }
                if inner.status() == WriterStatus::Failed {
                    counters.failed.store(true, Ordering::Release);
                }
            }
            Command::MarkFinished(track) => inner.mark_finished(track),
        }
    }
    inner
}

impl ContainerWriter for QueuedWriter {
    fn output_path(&self) -> &Path {
        &self.path
    }

    fn add_track(&mut self, config: &TrackConfig) -> WriterResult<TrackId> {
        let inner = self.inner.as_mut().ok_or_else(|| {
            WriterError::Rejected("tracks must be declared before writing starts".to_string())
        })?;
        let track = inner.add_track(config)?;
        self.tracks.push(track);
        Ok(track)
    }

    fn start_writing(&mut self) -> WriterResult<()> {
        let mut inner = self
            .inner
            .take()
            .ok_or_else(|| WriterError::Rejected("writer already started".to_string()))?;

        if let Err(e) = inner.start_writing() {
            self.inner = Some(inner);
            return Err(e);
        }

        let counters = Arc::new(Counters {
            pending: self
                .tracks
                .iter()
                .map(|track| (*track, AtomicUsize::new(0)))
                .collect(),
            failed: AtomicBool::new(false),
            append_errors: AtomicU64::new(0),
        });

        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker_counters = counters.clone();
        let worker = std::thread::Builder::new()
            .name("crabrecord-writer".to_string())
            .spawn(move || run_worker(inner, receiver, worker_counters))
            .map_err(|e| WriterError::Io(format!("failed to spawn writer thread: {e}")))?;

        self.sender = Some(sender);
        self.worker = Some(worker);
        self.counters = Some(counters);
        log::debug!("Queued writer started for {:?} (capacity {})", self.path, self.capacity);
        Ok(())
    }

    fn status(&self) -> WriterStatus {
        if let Some(inner) = &self.inner {
            return inner.status();
        }
        match &self.counters {
            Some(counters) if counters.failed.load(Ordering::Acquire) => WriterStatus::Failed,
            Some(_) if self.sender.is_some() => WriterStatus::Writing,
            _ => WriterStatus::Failed,
        }
    }

    fn begin_session(&mut self, at: MediaTime) {
        if let Err(e) = self.send(Command::BeginSession(at)) {
            log::warn!("Could not forward session start: {}", e);
        }
    }

    fn is_ready_for_more_data(&self, track: TrackId) -> bool {
        if self.status() != WriterStatus::Writing {
            return false;
        }
        self.counters
            .as_ref()
            .and_then(|c| c.pending.get(&track))
            .map(|p| p.load(Ordering::Acquire) < self.capacity)
            .unwrap_or(false)
    }

    fn append(&mut self, track: TrackId, sample: SampleStream) -> WriterResult<()> {
        let counters = self
            .counters
            .clone()
            .ok_or_else(|| WriterError::NotWriting(self.status().to_string()))?;
        let pending = counters
            .pending
            .get(&track)
            .ok_or_else(|| WriterError::InvalidTrack(track.to_string()))?;

        if pending.load(Ordering::Acquire) >= self.capacity {
            return Err(WriterError::Rejected(format!("{} queue is full", track)));
        }

        pending.fetch_add(1, Ordering::AcqRel);
        if let Err(e) = self.send(Command::Append(track, sample)) {
            pending.fetch_sub(1, Ordering::AcqRel);
            return Err(e);
        }
        Ok(())
    }

    fn mark_finished(&mut self, track: TrackId) {
        if let Err(e) = self.send(Command::MarkFinished(track)) {
            log::warn!("Could not forward end of {}: {}", track, e);
        }
    }

    fn finish(self: Box<Self>) -> WriterResult<WriterOutput> {
        let mut this = *self;

        // Never started: nothing on the worker side
        if let Some(inner) = this.inner.take() {
            return inner.finish();
        }

        // Closing the channel lets the worker drain and hand the writer back
        drop(this.sender.take());
        let worker = this.worker.take().ok_or(WriterError::Closed)?;
        let inner = worker
            .join()
            .map_err(|_| WriterError::Io("writer thread panicked".to_string()))?;

        if let Some(counters) = &this.counters {
            let errors = counters.append_errors.load(Ordering::Relaxed);
            if errors > 0 {
                log::warn!("{} background appends failed for {:?}", errors, this.path);
            }
        }

        inner.finish()
    }
}

/// Wraps another factory so every writer it builds runs on its own thread
pub struct QueuedWriterFactory {
    inner: Box<dyn WriterFactory>,
    capacity: usize,
}

impl QueuedWriterFactory {
    pub fn new<F: WriterFactory + 'static>(inner: F, capacity: usize) -> Self {
        Self::boxed(Box::new(inner), capacity)
    }

    pub fn boxed(inner: Box<dyn WriterFactory>, capacity: usize) -> Self {
        Self { inner, capacity }
    }
}

impl WriterFactory for QueuedWriterFactory {
    fn create(&self, target: &Path, config: &RecordingConfig) -> WriterResult<Box<dyn ContainerWriter>> {
        let inner = self.inner.create(target, config)?;
        Ok(Box::new(QueuedWriter::new(inner, self.capacity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockWriter, MockWriterHandle, WriterCall};
    use crate::types::MediaKind;
    use crate::writer::{AudioTrackConfig, VideoTrackConfig};

    fn started(handle: &MockWriterHandle, capacity: usize) -> (QueuedWriter, TrackId, TrackId) {
        let mock = MockWriter::new("/tmp/queued.mov", handle.clone());
        let mut writer = QueuedWriter::new(Box::new(mock), capacity);
        let video = writer
            .add_track(&TrackConfig::Video(VideoTrackConfig::new(640, 480, 30.0)))
            .unwrap();
        let audio = writer
            .add_track(&TrackConfig::Audio(AudioTrackConfig::default()))
            .unwrap();
        writer.start_writing().unwrap();
        (writer, video, audio)
    }

    #[test]
    fn test_forwards_in_order() {
        let handle = MockWriterHandle::new();
        let (mut writer, video, audio) = started(&handle, 8);
        assert_eq!(writer.status(), WriterStatus::Writing);

        writer.begin_session(MediaTime::from_millis(100));
        writer
            .append(video, SampleStream::video(MediaTime::from_millis(100), vec![1u8], true))
            .unwrap();
        writer
            .append(audio, SampleStream::audio(MediaTime::from_millis(110), vec![2u8]))
            .unwrap();
        writer.mark_finished(video);

        let output = Box::new(writer).finish().unwrap();
        assert_eq!(output.video_frames, 1);
        assert_eq!(output.audio_frames, 1);

        let calls = handle.calls();
        let tail: Vec<_> = calls
            .iter()
            .filter(|c| !matches!(c, WriterCall::AddTrack(_) | WriterCall::StartWriting))
            .cloned()
            .collect();
        assert_eq!(
            tail,
            vec![
                WriterCall::BeginSession(MediaTime::from_millis(100)),
                WriterCall::Append { kind: MediaKind::Video, time: MediaTime::from_millis(100), len: 1 },
                WriterCall::Append { kind: MediaKind::Audio, time: MediaTime::from_millis(110), len: 1 },
                WriterCall::MarkFinished(MediaKind::Video),
                WriterCall::Finish,
            ]
        );
    }

    #[test]
    fn test_readiness_follows_queue_depth() {
        let handle = MockWriterHandle::new();
        let gate = handle.pause_appends();
        let (mut writer, video, audio) = started(&handle, 2);

        writer.begin_session(MediaTime::ZERO);
        for i in 0..2 {
            assert!(writer.is_ready_for_more_data(video));
            writer
                .append(video, SampleStream::video(MediaTime::from_millis(i), vec![0u8], i == 0))
                .unwrap();
        }

        // Worker is parked inside the first append; two samples are in flight
        assert!(!writer.is_ready_for_more_data(video));
        assert!(writer.is_ready_for_more_data(audio));
        let rejected = writer.append(video, SampleStream::video(MediaTime::from_millis(2), vec![0u8], false));
        assert!(matches!(rejected, Err(WriterError::Rejected(_))));

        drop(gate);
        let output = Box::new(writer).finish().unwrap();
        assert_eq!(output.video_frames, 2);
    }

    #[test]
    fn test_tracks_rejected_after_start() {
        let handle = MockWriterHandle::new();
        let (mut writer, _, _) = started(&handle, 4);
        let result = writer.add_track(&TrackConfig::Audio(AudioTrackConfig::default()));
        assert!(matches!(result, Err(WriterError::Rejected(_))));
    }

    #[test]
    fn test_start_failure_keeps_writer_unopened() {
        let handle = MockWriterHandle::new();
        handle.fail_start(true);
        let mock = MockWriter::new("/tmp/queued-fail.mov", handle.clone());
        let mut writer = QueuedWriter::new(Box::new(mock), 4);
        assert!(writer.start_writing().is_err());
        assert_eq!(writer.status(), WriterStatus::Unopened);
    }

    #[test]
    fn test_inner_failure_surfaces_as_status() {
        let handle = MockWriterHandle::new();
        let (mut writer, video, _) = started(&handle, 4);
        handle.force_failed(true);
        writer
            .append(video, SampleStream::video(MediaTime::ZERO, vec![0u8], true))
            .unwrap();

        // Worker observes the failed status after processing the append
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while writer.status() != WriterStatus::Failed && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(writer.status(), WriterStatus::Failed);
        assert!(!writer.is_ready_for_more_data(video));
    }
}
