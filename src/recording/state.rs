//! Recording state machine
//!
//! The phase enum is the single source of truth for whether a writer is
//! live: only `Writing` carries one. There are no separate "is recording" or
//! "session started" flags to disagree with each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::timing::MediaTime;
use crate::writer::{ContainerWriter, TrackId};

/// Externally visible lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingPhase {
    /// No recording in progress
    Idle,
    /// Writer is being built and tracks registered
    Starting,
    /// Accepting samples
    Writing,
    /// Stop requested; writer finalizing off-thread
    Finalizing,
    /// Writer finalized, resources being released
    Closed,
}

impl RecordingPhase {
    /// Whether `start()` may begin a new cycle from this phase
    pub fn can_start(&self) -> bool {
        matches!(self, RecordingPhase::Idle | RecordingPhase::Closed)
    }
}

impl Default for RecordingPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for RecordingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordingPhase::Idle => "idle",
            RecordingPhase::Starting => "starting",
            RecordingPhase::Writing => "writing",
            RecordingPhase::Finalizing => "finalizing",
            RecordingPhase::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What happened to one sample handed to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// First accepted video sample: session origin set and sample appended
    Anchored,
    /// Appended to its track
    Appended,
    /// No cycle is writing (idle, starting, finalizing)
    DroppedInactive,
    /// The writer exists but is not in a writing state
    DroppedWriterInactive,
    /// Arrived before the session origin, or timestamped earlier than it
    DroppedPreAnchor,
    /// The track reported it was not ready for more data
    DroppedNotReady,
    /// The writer rejected the append; not retried
    AppendFailed,
}

impl SampleOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, SampleOutcome::Anchored | SampleOutcome::Appended)
    }
}

/// Per-cycle counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleStats {
    pub cycle_id: Uuid,
    /// Wall-clock time the cycle entered Writing
    pub started_at: Option<DateTime<Utc>>,
    /// Session origin, once the first video sample was accepted
    pub anchor: Option<MediaTime>,
    pub video_appended: u64,
    pub audio_appended: u64,
    pub dropped_pre_anchor: u64,
    pub dropped_not_ready: u64,
    pub dropped_writer_inactive: u64,
    pub append_failures: u64,
    pub last_video_time: Option<MediaTime>,
    pub last_audio_time: Option<MediaTime>,
}

impl CycleStats {
    pub fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            ..Default::default()
        }
    }

    /// Total samples dropped for any reason while the cycle was writing
    pub fn dropped(&self) -> u64 {
        self.dropped_pre_anchor + self.dropped_not_ready + self.dropped_writer_inactive
    }

    /// Media span from the anchor to the latest appended sample, in seconds
    pub fn duration_secs(&self) -> f64 {
        let Some(anchor) = self.anchor else {
            return 0.0;
        };
        let last = match (self.last_video_time, self.last_audio_time) {
            (Some(v), Some(a)) => v.max(a),
            (Some(v), None) => v,
            (None, Some(a)) => a,
            (None, None) => return 0.0,
        };
        last.saturating_since(anchor).as_secs_f64()
    }

    pub(crate) fn record(&mut self, outcome: SampleOutcome) {
        match outcome {
            SampleOutcome::DroppedPreAnchor => self.dropped_pre_anchor += 1,
            SampleOutcome::DroppedNotReady => self.dropped_not_ready += 1,
            SampleOutcome::DroppedWriterInactive => self.dropped_writer_inactive += 1,
            SampleOutcome::AppendFailed => self.append_failures += 1,
            SampleOutcome::Anchored | SampleOutcome::Appended | SampleOutcome::DroppedInactive => {}
        }
    }
}

/// Per-cycle resources owned while writing
pub(crate) struct ActiveCycle {
    pub id: Uuid,
    pub output_path: PathBuf,
    pub writer: Box<dyn ContainerWriter>,
    pub video: TrackId,
    pub audio: TrackId,
    pub stats: CycleStats,
}

impl ActiveCycle {
    pub fn anchor(&self) -> Option<MediaTime> {
        self.stats.anchor
    }
}

/// Internal phase; `Writing` owns the cycle's writer and track handles
pub(crate) enum Phase {
    Idle,
    Starting,
    Writing(ActiveCycle),
    Finalizing { cycle_id: Uuid },
    Closed,
}

impl Phase {
    pub fn public(&self) -> RecordingPhase {
        match self {
            Phase::Idle => RecordingPhase::Idle,
            Phase::Starting => RecordingPhase::Starting,
            Phase::Writing(_) => RecordingPhase::Writing,
            Phase::Finalizing { .. } => RecordingPhase::Finalizing,
            Phase::Closed => RecordingPhase::Closed,
        }
    }
}
