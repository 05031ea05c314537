//! Recording coordinator
//!
//! Owns the writer lifecycle for one cycle at a time, establishes the shared
//! session origin from the first accepted video sample, and gates every
//! append on the target track's readiness.
//!
//! Locking: a single mutex guards the phase, which in turn owns the writer,
//! the track handles and the anchor. Sample handling and the stop transition
//! both run under it, so anchor establishment (begin session + first append)
//! is atomic with respect to every other delivery. Appends also run under
//! it, which is why the builder puts writers behind a `QueuedWriter` unless
//! told otherwise. Writer construction and finalization run outside the lock
//! so capture threads never wait on file creation or container flushing.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::config::RecordingConfig;
use super::listener::{LogListener, RecordingListener};
use super::state::{ActiveCycle, CycleStats, Phase, RecordingPhase, SampleOutcome};
use super::target::{OutputTarget, TimestampedTarget};
use crate::assert_invariant;
use crate::capture::SampleSink;
use crate::config::CrabRecordConfig;
use crate::errors::{RecordingError, RecordingResult, WriterResult};
use crate::timing::MediaTime;
use crate::types::{MediaKind, SampleStream};
use crate::writer::{
    ContainerWriter, QueuedWriterFactory, TrackConfig, WriterFactory, WriterOutput, WriterStatus,
    DEFAULT_TRACK_CAPACITY,
};

struct Shared {
    phase: Mutex<Phase>,
    config: RecordingConfig,
    target: Box<dyn OutputTarget>,
    factory: Box<dyn WriterFactory>,
    listener: Arc<dyn RecordingListener>,
}

impl Shared {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        // Every critical section leaves the phase consistent, so a panic
        // elsewhere does not invalidate it.
        self.phase.lock().unwrap_or_else(|poisoned| {
            log::warn!("Recording state lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn complete(&self, cycle_id: Uuid, result: WriterResult<WriterOutput>, stats: CycleStats) {
        {
            let mut phase = self.lock_phase();
            let finalizing = match &*phase {
                Phase::Finalizing { cycle_id: current } => *current == cycle_id,
                _ => false,
            };
            if !finalizing {
                log::warn!(
                    "Recording {} completed while coordinator was {}; state left unchanged",
                    cycle_id,
                    phase.public()
                );
                return;
            }
            *phase = Phase::Closed;
        }

        // The writer was consumed by finish; the anchor and track handles
        // went with the cycle. Nothing of this cycle remains.
        *self.lock_phase() = Phase::Idle;

        match result {
            Ok(output) => {
                log::info!(
                    "Recording {} finished: {:?} ({} video, {} audio appended; {} dropped)",
                    cycle_id,
                    output.path,
                    stats.video_appended,
                    stats.audio_appended,
                    stats.dropped()
                );
                self.listener.on_finished(&output, &stats);
            }
            Err(e) => {
                log::error!("Recording {} failed to finalize: {}", cycle_id, e);
                self.listener
                    .on_failed(RecordingError::FinalizeFailed(e.to_string()), &stats);
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let phase = self.phase.get_mut().map(|p| p.public()).unwrap_or(RecordingPhase::Idle);
        if phase == RecordingPhase::Writing {
            log::warn!("Recording coordinator dropped while writing; output was not finalized");
        }
    }
}

/// Coordinates one live video track and one live audio track into a
/// container writer.
///
/// Cheap to clone; clones share state. Hand one clone to each capture
/// thread and keep one for the start/stop controls.
#[derive(Clone)]
pub struct RecordingCoordinator {
    shared: Arc<Shared>,
}

impl RecordingCoordinator {
    pub fn builder<F: WriterFactory + 'static>(factory: F) -> RecordingCoordinatorBuilder {
        RecordingCoordinatorBuilder::new(factory)
    }

    pub fn phase(&self) -> RecordingPhase {
        self.shared.lock_phase().public()
    }

    pub fn is_recording(&self) -> bool {
        self.phase() == RecordingPhase::Writing
    }

    /// Session origin of the current cycle, if one has been established
    pub fn anchor(&self) -> Option<MediaTime> {
        match &*self.shared.lock_phase() {
            Phase::Writing(cycle) => cycle.anchor(),
            _ => None,
        }
    }

    /// Snapshot of the current cycle's counters
    pub fn stats(&self) -> Option<CycleStats> {
        match &*self.shared.lock_phase() {
            Phase::Writing(cycle) => Some(cycle.stats.clone()),
            _ => None,
        }
    }

    /// Output file of the cycle currently writing
    pub fn current_output(&self) -> Option<PathBuf> {
        match &*self.shared.lock_phase() {
            Phase::Writing(cycle) => Some(cycle.output_path.clone()),
            _ => None,
        }
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.shared.config
    }

    /// Begin a new cycle.
    ///
    /// Builds the writer, registers both tracks and opens the container.
    /// On success the coordinator is Writing and the cycle id is returned.
    /// On any failure it is back in Idle with nothing retained.
    pub fn start(&self) -> RecordingResult<Uuid> {
        {
            let mut phase = self.shared.lock_phase();
            if !phase.public().can_start() {
                log::warn!("start() rejected: coordinator is {}", phase.public());
                return Err(RecordingError::AlreadyRecording);
            }
            *phase = Phase::Starting;
        }

        match self.open_cycle() {
            Ok(cycle) => {
                let cycle_id = cycle.id;
                log::info!("Recording {} writing to {:?}", cycle_id, cycle.output_path);
                // Still Starting here, so no stop() can complete this cycle
                // before its start notification is delivered
                self.shared.listener.on_started(cycle_id, &cycle.output_path);
                *self.shared.lock_phase() = Phase::Writing(cycle);
                Ok(cycle_id)
            }
            Err(e) => {
                *self.shared.lock_phase() = Phase::Idle;
                log::error!("Failed to start recording: {}", e);
                Err(e)
            }
        }
    }

    fn open_cycle(&self) -> RecordingResult<ActiveCycle> {
        let config = &self.shared.config;
        let output_path = self.shared.target.next_target()?;

        let writer = self
            .shared
            .factory
            .create(&output_path, config)
            .map_err(|e| RecordingError::WriterConstructionFailed(e.to_string()))?;

        match register_tracks(writer, config) {
            Ok((writer, video, audio)) => {
                let id = Uuid::new_v4();
                let mut stats = CycleStats::new(id);
                stats.started_at = Some(Utc::now());
                Ok(ActiveCycle {
                    id,
                    output_path,
                    writer,
                    video,
                    audio,
                    stats,
                })
            }
            Err(e) => {
                discard_empty_output(&output_path);
                Err(e)
            }
        }
    }

    /// Request the current cycle to stop.
    ///
    /// Marks the video track finished and hands the writer to a finalizer
    /// thread. Returns `false` (and does nothing) unless the coordinator was
    /// Writing. Completion arrives through the listener.
    pub fn stop(&self) -> bool {
        let cycle = {
            let mut phase = self.shared.lock_phase();
            let mut cycle = match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Writing(cycle) => cycle,
                other => {
                    log::debug!("stop() ignored: coordinator is {}", other.public());
                    *phase = other;
                    return false;
                }
            };
            cycle.writer.mark_finished(cycle.video);
            *phase = Phase::Finalizing { cycle_id: cycle.id };
            cycle
        };

        log::info!(
            "Stopping recording {} ({} video, {} audio appended)",
            cycle.id,
            cycle.stats.video_appended,
            cycle.stats.audio_appended
        );
        self.spawn_finalizer(cycle);
        true
    }

    fn spawn_finalizer(&self, cycle: ActiveCycle) {
        let ActiveCycle { id, writer, stats, .. } = cycle;
        let shared = self.shared.clone();
        let fallback_stats = stats.clone();

        let spawned = std::thread::Builder::new()
            .name("crabrecord-finalize".to_string())
            .spawn(move || {
                let result = writer.finish();
                shared.complete(id, result, stats);
            });

        if let Err(e) = spawned {
            // The writer went down with the closure; report the cycle as failed
            self.shared.complete(
                id,
                Err(crate::errors::WriterError::Io(format!(
                    "failed to spawn finalizer thread: {e}"
                ))),
                fallback_stats,
            );
        }
    }

    /// Handle one captured sample. Never blocks on I/O and never fails; the
    /// returned outcome says what happened to it.
    pub fn on_sample(&self, sample: SampleStream) -> SampleOutcome {
        let mut phase = self.shared.lock_phase();
        let Phase::Writing(cycle) = &mut *phase else {
            log::trace!("{} sample dropped: not recording", sample.kind());
            return SampleOutcome::DroppedInactive;
        };

        let outcome = accept(cycle, sample);
        cycle.stats.record(outcome);
        outcome
    }

    /// Poll until the coordinator is back in Idle or `timeout` elapses
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.phase() == RecordingPhase::Idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl SampleSink for RecordingCoordinator {
    fn on_sample(&self, sample: SampleStream) -> SampleOutcome {
        RecordingCoordinator::on_sample(self, sample)
    }
}

type RegisteredWriter = (Box<dyn ContainerWriter>, crate::writer::TrackId, crate::writer::TrackId);

fn register_tracks(
    mut writer: Box<dyn ContainerWriter>,
    config: &RecordingConfig,
) -> RecordingResult<RegisteredWriter> {
    let video = writer
        .add_track(&TrackConfig::Video(config.video.clone()))
        .map_err(|e| RecordingError::TrackRegistrationFailed(format!("video: {e}")))?;
    let audio = writer
        .add_track(&TrackConfig::Audio(config.audio.clone()))
        .map_err(|e| RecordingError::TrackRegistrationFailed(format!("audio: {e}")))?;

    writer
        .start_writing()
        .map_err(|e| RecordingError::WriterConstructionFailed(format!("writer did not start: {e}")))?;
    if writer.status() != WriterStatus::Writing {
        return Err(RecordingError::WriterConstructionFailed(format!(
            "writer reported {} after start",
            writer.status()
        )));
    }
    Ok((writer, video, audio))
}

fn discard_empty_output(path: &std::path::Path) {
    let empty = std::fs::metadata(path).map(|m| m.is_file() && m.len() == 0).unwrap_or(false);
    if empty {
        if let Err(e) = std::fs::remove_file(path) {
            log::debug!("Could not remove abandoned output {:?}: {}", path, e);
        }
    }
}

/// Readiness gate plus anchor policy for one sample; caller holds the lock
fn accept(cycle: &mut ActiveCycle, sample: SampleStream) -> SampleOutcome {
    if cycle.writer.status() != WriterStatus::Writing {
        return SampleOutcome::DroppedWriterInactive;
    }

    let kind = sample.kind();
    let time = sample.presentation_time();
    let track = match kind {
        MediaKind::Video => cycle.video,
        MediaKind::Audio => cycle.audio,
    };

    let anchor = cycle.stats.anchor;
    let anchored_now = match anchor {
        None if kind == MediaKind::Audio => return SampleOutcome::DroppedPreAnchor,
        None => {
            if !cycle.writer.is_ready_for_more_data(track) {
                return SampleOutcome::DroppedNotReady;
            }
            assert_invariant!(
                cycle.stats.anchor.is_none(),
                "Session anchor is written once per cycle",
                "RecordingCoordinator::on_sample"
            );
            cycle.writer.begin_session(time);
            cycle.stats.anchor = Some(time);
            log::info!("Recording {} session anchored at {}", cycle.id, time);
            true
        }
        Some(anchor) => {
            if time < anchor {
                return SampleOutcome::DroppedPreAnchor;
            }
            if !cycle.writer.is_ready_for_more_data(track) {
                return SampleOutcome::DroppedNotReady;
            }
            false
        }
    };

    assert_invariant!(
        cycle.stats.anchor.is_some_and(|anchor| time >= anchor),
        "No sample is appended before the session anchor",
        "RecordingCoordinator::on_sample"
    );

    match cycle.writer.append(track, sample) {
        Ok(()) => {
            match kind {
                MediaKind::Video => {
                    cycle.stats.video_appended += 1;
                    cycle.stats.last_video_time = Some(time);
                }
                MediaKind::Audio => {
                    cycle.stats.audio_appended += 1;
                    cycle.stats.last_audio_time = Some(time);
                }
            }
            if anchored_now {
                SampleOutcome::Anchored
            } else {
                SampleOutcome::Appended
            }
        }
        Err(e) => {
            log::debug!("Recording {}: {} append at {} failed: {}", cycle.id, kind, time, e);
            SampleOutcome::AppendFailed
        }
    }
}

/// Assembles a [`RecordingCoordinator`].
///
/// Writers run on a background thread behind a [`QueuedWriterFactory`]
/// unless [`inline_writer`](Self::inline_writer) is requested, so capture
/// threads never wait on container I/O.
pub struct RecordingCoordinatorBuilder {
    config: RecordingConfig,
    target: Option<Box<dyn OutputTarget>>,
    factory: Box<dyn WriterFactory>,
    queue_capacity: Option<usize>,
    listener: Arc<dyn RecordingListener>,
}

impl RecordingCoordinatorBuilder {
    pub fn new<F: WriterFactory + 'static>(factory: F) -> Self {
        Self {
            config: RecordingConfig::default(),
            target: None,
            factory: Box::new(factory),
            queue_capacity: Some(DEFAULT_TRACK_CAPACITY),
            listener: Arc::new(LogListener),
        }
    }

    /// Everything from a loaded settings file: track layout, timestamped
    /// output directory, and the background writer queue when enabled
    pub fn from_settings<F: WriterFactory + 'static>(settings: &CrabRecordConfig, factory: F) -> Self {
        let target = TimestampedTarget::new(&settings.output.directory, settings.output.extension.clone())
            .with_name_format(settings.output.name_format.clone());

        Self {
            config: settings.recording.clone(),
            target: Some(Box::new(target)),
            factory: Box::new(factory),
            queue_capacity: settings.writer.background.then_some(settings.writer.track_capacity),
            listener: Arc::new(LogListener),
        }
    }

    /// Samples allowed in flight per track on the background writer
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Call the writer directly from the capture threads, under the
    /// coordinator lock. Only for writers whose appends never block.
    pub fn inline_writer(mut self) -> Self {
        self.queue_capacity = None;
        self
    }

    pub fn config(mut self, config: RecordingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn target<T: OutputTarget + 'static>(mut self, target: T) -> Self {
        self.target = Some(Box::new(target));
        self
    }

    pub fn listener(mut self, listener: Arc<dyn RecordingListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn build(self) -> RecordingResult<RecordingCoordinator> {
        self.config.validate()?;
        let target = self
            .target
            .unwrap_or_else(|| Box::new(TimestampedTarget::new("recordings", "mp4")));

        let factory: Box<dyn WriterFactory> = match self.queue_capacity {
            Some(capacity) => Box::new(QueuedWriterFactory::boxed(self.factory, capacity)),
            None => self.factory,
        };

        Ok(RecordingCoordinator {
            shared: Arc::new(Shared {
                phase: Mutex::new(Phase::Idle),
                config: self.config,
                target,
                factory,
                listener: self.listener,
            }),
        })
    }
}
