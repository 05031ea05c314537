//! Container writer seam
//!
//! The coordinator never encodes or muxes anything itself. It drives a
//! [`ContainerWriter`] through `unopened → writing → finished/failed`,
//! registering one video and one audio track, and appends samples only
//! while the target track reports it is ready for more data.
//!
//! Implementations:
//! - [`QueuedWriter`]: moves any writer onto a dedicated thread behind a
//!   channel, so appends never block the caller and readiness reflects the
//!   queue depth
//! - `Mp4Writer` (feature `mp4`): H.264 + AAC/Opus into MP4 via muxide

#[cfg(feature = "mp4")]
mod mp4;
mod queued;

#[cfg(feature = "mp4")]
pub use mp4::{Mp4Writer, Mp4WriterFactory};
pub use queued::{QueuedWriter, QueuedWriterFactory, DEFAULT_TRACK_CAPACITY};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::WriterResult;
use crate::recording::RecordingConfig;
use crate::timing::MediaTime;
use crate::types::{MediaKind, SampleStream};

/// Handle for a track registered with a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId {
    index: usize,
    kind: MediaKind,
}

impl TrackId {
    pub fn new(index: usize, kind: MediaKind) -> Self {
        Self { index, kind }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.index)
    }
}

/// Video codecs a writer may be asked to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
}

/// Audio codecs a writer may be asked to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Opus,
}

/// Video track declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoTrackConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Nominal frames per second
    pub fps: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    pub codec: VideoCodec,
}

impl VideoTrackConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate: 5_000_000,
            codec: VideoCodec::H264,
        }
    }
}

impl Default for VideoTrackConfig {
    fn default() -> Self {
        Self::new(720, 1280, 30.0)
    }
}

/// Audio track declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioTrackConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    pub codec: AudioCodec,
}

impl Default for AudioTrackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bitrate: 64_000,
            codec: AudioCodec::Aac,
        }
    }
}

/// A track declaration handed to [`ContainerWriter::add_track`]
#[derive(Debug, Clone, PartialEq)]
pub enum TrackConfig {
    Video(VideoTrackConfig),
    Audio(AudioTrackConfig),
}

impl TrackConfig {
    pub fn kind(&self) -> MediaKind {
        match self {
            TrackConfig::Video(_) => MediaKind::Video,
            TrackConfig::Audio(_) => MediaKind::Audio,
        }
    }
}

/// Writer lifecycle as reported by the writer itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterStatus {
    Unopened,
    Writing,
    Finished,
    Failed,
}

impl fmt::Display for WriterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriterStatus::Unopened => "unopened",
            WriterStatus::Writing => "writing",
            WriterStatus::Finished => "finished",
            WriterStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a writer reports once the container is finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterOutput {
    /// Location of the finished container file
    pub path: PathBuf,
    /// Video samples committed to the file
    pub video_frames: u64,
    /// Audio samples committed to the file
    pub audio_frames: u64,
    /// Media duration in seconds
    pub duration_secs: f64,
    /// Total bytes written
    pub bytes_written: u64,
}

/// A container writer driven by the recording coordinator.
///
/// Call order within one cycle:
/// `add_track`* → `start_writing` → `begin_session` → (`append` |
/// `mark_finished`)* → `finish`.
///
/// `is_ready_for_more_data` and `append` are called with the coordinator's
/// lock held; they must not block.
pub trait ContainerWriter: Send {
    /// Where the container is being written
    fn output_path(&self) -> &Path;

    /// Declare a track. Only valid while unopened.
    fn add_track(&mut self, config: &TrackConfig) -> WriterResult<TrackId>;

    /// Open the container for writing; status becomes `Writing` on success
    fn start_writing(&mut self) -> WriterResult<()>;

    fn status(&self) -> WriterStatus;

    /// Establish the session origin. Sample times are interpreted relative
    /// to `at`.
    fn begin_session(&mut self, at: MediaTime);

    /// Whether `track` can take another sample without buffering beyond
    /// the writer's capacity
    fn is_ready_for_more_data(&self, track: TrackId) -> bool;

    /// Hand a sample to the writer. Ownership moves in regardless of outcome.
    fn append(&mut self, track: TrackId, sample: SampleStream) -> WriterResult<()>;

    /// No further samples will be appended to `track`
    fn mark_finished(&mut self, track: TrackId);

    /// Flush and close the container. May block; the coordinator calls it
    /// off the capture threads.
    fn finish(self: Box<Self>) -> WriterResult<WriterOutput>;
}

/// Builds one writer per recording cycle
pub trait WriterFactory: Send + Sync {
    fn create(&self, target: &Path, config: &RecordingConfig) -> WriterResult<Box<dyn ContainerWriter>>;
}

impl<F> WriterFactory for F
where
    F: Fn(&Path, &RecordingConfig) -> WriterResult<Box<dyn ContainerWriter>> + Send + Sync,
{
    fn create(&self, target: &Path, config: &RecordingConfig) -> WriterResult<Box<dyn ContainerWriter>> {
        self(target, config)
    }
}
