//! Scriptable in-memory container writer
//!
//! `MockWriter` records every call it receives and lets a test decide, from
//! any thread, whether tracks are ready, which steps fail, and when appends
//! or finalization are allowed to proceed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};

use crate::errors::{WriterError, WriterResult};
use crate::recording::RecordingConfig;
use crate::timing::MediaTime;
use crate::types::{MediaKind, SampleStream};
use crate::writer::{ContainerWriter, TrackConfig, TrackId, WriterFactory, WriterOutput, WriterStatus};

/// One call observed by a [`MockWriter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterCall {
    AddTrack(MediaKind),
    StartWriting,
    BeginSession(MediaTime),
    Append { kind: MediaKind, time: MediaTime, len: usize },
    MarkFinished(MediaKind),
    Finish,
}

#[derive(Default)]
struct Script {
    calls: Vec<WriterCall>,
    not_ready: HashMap<MediaKind, bool>,
    fail_add_track: HashMap<MediaKind, bool>,
    fail_construction: bool,
    fail_start: bool,
    fail_appends: bool,
    fail_finish: bool,
    force_failed: bool,
    writers_created: usize,
    targets: Vec<PathBuf>,
    append_gate: Option<Receiver<()>>,
    finish_gate: Option<Receiver<()>>,
}

/// Holds a paused step until dropped
#[must_use = "the step resumes as soon as the gate is dropped"]
pub struct Gate {
    _sender: Sender<()>,
}

fn gate() -> (Gate, Receiver<()>) {
    let (sender, receiver) = crossbeam_channel::bounded(0);
    (Gate { _sender: sender }, receiver)
}

/// Shared control and observation handle for mock writers
#[derive(Clone, Default)]
pub struct MockWriterHandle {
    script: Arc<Mutex<Script>>,
}

impl MockWriterHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call so far, across all writers sharing this handle
    pub fn calls(&self) -> Vec<WriterCall> {
        self.script().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.script().calls.clear();
    }

    /// Presentation times appended to `kind`, in order
    pub fn appends(&self, kind: MediaKind) -> Vec<MediaTime> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                WriterCall::Append { kind: k, time, .. } if *k == kind => Some(*time),
                _ => None,
            })
            .collect()
    }

    /// Session origins passed to `begin_session`
    pub fn sessions(&self) -> Vec<MediaTime> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                WriterCall::BeginSession(at) => Some(*at),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &WriterCall) -> usize {
        self.script().calls.iter().filter(|call| *call == wanted).count()
    }

    pub fn set_ready(&self, kind: MediaKind, ready: bool) {
        self.script().not_ready.insert(kind, !ready);
    }

    pub fn fail_add_track(&self, kind: MediaKind, fail: bool) {
        self.script().fail_add_track.insert(kind, fail);
    }

    /// Makes [`MockWriterFactory::create`] fail
    pub fn fail_construction(&self, fail: bool) {
        self.script().fail_construction = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.script().fail_start = fail;
    }

    pub fn fail_appends(&self, fail: bool) {
        self.script().fail_appends = fail;
    }

    pub fn fail_finish(&self, fail: bool) {
        self.script().fail_finish = fail;
    }

    /// Report `Failed` from `status()` while writing
    pub fn force_failed(&self, failed: bool) {
        self.script().force_failed = failed;
    }

    /// Block every append until the returned gate is dropped
    pub fn pause_appends(&self) -> Gate {
        let (gate, receiver) = gate();
        self.script().append_gate = Some(receiver);
        gate
    }

    /// Block `finish` until the returned gate is dropped
    pub fn pause_finish(&self) -> Gate {
        let (gate, receiver) = gate();
        self.script().finish_gate = Some(receiver);
        gate
    }

    pub fn writers_created(&self) -> usize {
        self.script().writers_created
    }

    /// Output paths handed to the factory, in order
    pub fn targets(&self) -> Vec<PathBuf> {
        self.script().targets.clone()
    }

    fn record(&self, call: WriterCall) {
        self.script().calls.push(call);
    }

    fn wait(gate: Option<Receiver<()>>) {
        if let Some(receiver) = gate {
            // Returns once the sender side is dropped
            let _ = receiver.recv();
        }
    }
}

/// In-memory [`ContainerWriter`] driven by a [`MockWriterHandle`]
pub struct MockWriter {
    path: PathBuf,
    handle: MockWriterHandle,
    tracks: Vec<(TrackId, bool)>,
    started: bool,
    anchor: Option<MediaTime>,
    video_frames: u64,
    audio_frames: u64,
    bytes_written: u64,
    last_time: Option<MediaTime>,
}

impl MockWriter {
    pub fn new<P: Into<PathBuf>>(path: P, handle: MockWriterHandle) -> Self {
        Self {
            path: path.into(),
            handle,
            tracks: Vec::new(),
            started: false,
            anchor: None,
            video_frames: 0,
            audio_frames: 0,
            bytes_written: 0,
            last_time: None,
        }
    }

    fn track_finished(&self, track: TrackId) -> Option<bool> {
        self.tracks.iter().find(|(id, _)| *id == track).map(|(_, finished)| *finished)
    }
}

impl ContainerWriter for MockWriter {
    fn output_path(&self) -> &Path {
        &self.path
    }

    fn add_track(&mut self, config: &TrackConfig) -> WriterResult<TrackId> {
        let kind = config.kind();
        self.handle.record(WriterCall::AddTrack(kind));
        if self.started {
            return Err(WriterError::Rejected("tracks must be declared before writing starts".to_string()));
        }
        if self.handle.script().fail_add_track.get(&kind).copied().unwrap_or(false) {
            return Err(WriterError::Rejected(format!("scripted {kind} track failure")));
        }
        if self.tracks.iter().any(|(id, _)| id.kind() == kind) {
            return Err(WriterError::DuplicateTrack(kind.to_string()));
        }
        let id = TrackId::new(self.tracks.len(), kind);
        self.tracks.push((id, false));
        Ok(id)
    }

    fn start_writing(&mut self) -> WriterResult<()> {
        self.handle.record(WriterCall::StartWriting);
        if self.handle.script().fail_start {
            return Err(WriterError::Io("scripted start failure".to_string()));
        }
        self.started = true;
        Ok(())
    }

    fn status(&self) -> WriterStatus {
        match (self.started, self.handle.script().force_failed) {
            (false, _) => WriterStatus::Unopened,
            (true, true) => WriterStatus::Failed,
            (true, false) => WriterStatus::Writing,
        }
    }

    fn begin_session(&mut self, at: MediaTime) {
        self.handle.record(WriterCall::BeginSession(at));
        self.anchor.get_or_insert(at);
    }

    fn is_ready_for_more_data(&self, track: TrackId) -> bool {
        if self.status() != WriterStatus::Writing || self.track_finished(track) != Some(false) {
            return false;
        }
        !self.handle.script().not_ready.get(&track.kind()).copied().unwrap_or(false)
    }

    fn append(&mut self, track: TrackId, sample: SampleStream) -> WriterResult<()> {
        let gate = self.handle.script().append_gate.clone();
        MockWriterHandle::wait(gate);

        let kind = sample.kind();
        let time = sample.presentation_time();
        match self.track_finished(track) {
            None => return Err(WriterError::InvalidTrack(track.to_string())),
            Some(true) => return Err(WriterError::TrackFinished(track.to_string())),
            Some(false) => {}
        }
        if !self.started {
            return Err(WriterError::NotWriting(self.status().to_string()));
        }
        if self.handle.script().fail_appends {
            return Err(WriterError::Rejected("scripted append failure".to_string()));
        }

        self.handle.record(WriterCall::Append { kind, time, len: sample.len() });
        self.bytes_written += sample.len() as u64;
        self.last_time = Some(self.last_time.map_or(time, |last| last.max(time)));
        match kind {
            MediaKind::Video => self.video_frames += 1,
            MediaKind::Audio => self.audio_frames += 1,
        }
        Ok(())
    }

    fn mark_finished(&mut self, track: TrackId) {
        self.handle.record(WriterCall::MarkFinished(track.kind()));
        if let Some(entry) = self.tracks.iter_mut().find(|(id, _)| *id == track) {
            entry.1 = true;
        }
    }

    fn finish(self: Box<Self>) -> WriterResult<WriterOutput> {
        self.handle.record(WriterCall::Finish);
        let gate = self.handle.script().finish_gate.clone();
        MockWriterHandle::wait(gate);

        if self.handle.script().fail_finish {
            return Err(WriterError::Muxer("scripted finish failure".to_string()));
        }
        let duration_secs = match (self.anchor, self.last_time) {
            (Some(anchor), Some(last)) => last.saturating_since(anchor).as_secs_f64(),
            _ => 0.0,
        };
        Ok(WriterOutput {
            path: self.path,
            video_frames: self.video_frames,
            audio_frames: self.audio_frames,
            duration_secs,
            bytes_written: self.bytes_written,
        })
    }
}

/// Builds a [`MockWriter`] per cycle, all sharing one handle
#[derive(Clone, Default)]
pub struct MockWriterFactory {
    handle: MockWriterHandle,
}

impl MockWriterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(handle: MockWriterHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> MockWriterHandle {
        self.handle.clone()
    }
}

impl WriterFactory for MockWriterFactory {
    fn create(&self, target: &Path, _config: &RecordingConfig) -> WriterResult<Box<dyn ContainerWriter>> {
        {
            let mut script = self.handle.script();
            script.targets.push(target.to_path_buf());
            if script.fail_construction {
                return Err(WriterError::Io("scripted construction failure".to_string()));
            }
            script.writers_created += 1;
        }
        Ok(Box::new(MockWriter::new(target, self.handle.clone())))
    }
}
