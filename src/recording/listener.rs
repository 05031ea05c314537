//! Completion notifications
//!
//! Exactly one of `on_finished` / `on_failed` fires per cycle that reached
//! Finalizing. Both are called from the finalizer thread after the
//! coordinator is back in Idle, so a listener may immediately start the
//! next cycle.

use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::state::CycleStats;
use crate::errors::RecordingError;
use crate::writer::WriterOutput;

/// Receives recording lifecycle notifications
pub trait RecordingListener: Send + Sync {
    /// A cycle's writer is open. Called on the thread that called `start`,
    /// just before the cycle begins accepting samples; `stop` has no effect
    /// until it returns.
    fn on_started(&self, _cycle_id: Uuid, _output: &Path) {}

    /// The container was finalized successfully
    fn on_finished(&self, output: &WriterOutput, stats: &CycleStats);

    /// Finalization failed; the partial output is the caller's to discard
    fn on_failed(&self, error: RecordingError, stats: &CycleStats);
}

/// Lifecycle notification as a value
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    Started { cycle_id: Uuid, output: PathBuf },
    Finished { output: WriterOutput, stats: CycleStats },
    Failed { error: RecordingError, stats: CycleStats },
}

/// Forwards every notification into a crossbeam channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: Sender<RecordingEvent>,
}

impl ChannelListener {
    /// Listener plus the receiving end of its channel
    pub fn new() -> (Self, Receiver<RecordingEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }

    fn send(&self, event: RecordingEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Recording event receiver dropped");
        }
    }
}

impl RecordingListener for ChannelListener {
    fn on_started(&self, cycle_id: Uuid, output: &Path) {
        self.send(RecordingEvent::Started {
            cycle_id,
            output: output.to_path_buf(),
        });
    }

    fn on_finished(&self, output: &WriterOutput, stats: &CycleStats) {
        self.send(RecordingEvent::Finished {
            output: output.clone(),
            stats: stats.clone(),
        });
    }

    fn on_failed(&self, error: RecordingError, stats: &CycleStats) {
        self.send(RecordingEvent::Failed {
            error,
            stats: stats.clone(),
        });
    }
}

/// Logs notifications; the default when no listener is installed
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListener;

impl RecordingListener for LogListener {
    fn on_started(&self, cycle_id: Uuid, output: &Path) {
        log::info!("Recording {} started: {:?}", cycle_id, output);
    }

    fn on_finished(&self, output: &WriterOutput, stats: &CycleStats) {
        log::info!(
            "Video saved to: {:?} ({} video / {} audio frames, {} dropped)",
            output.path,
            stats.video_appended,
            stats.audio_appended,
            stats.dropped()
        );
    }

    fn on_failed(&self, error: RecordingError, stats: &CycleStats) {
        log::error!("Recording {} failed: {}", stats.cycle_id, error);
    }
}
