//! Live A/V recording
//!
//! A [`RecordingCoordinator`] accepts video and audio samples from
//! independent capture threads and writes them into one container per
//! recording cycle:
//!
//! ```text
//! Idle → Starting → Writing → Finalizing → Closed → Idle
//! ```
//!
//! The first video sample accepted in a cycle becomes the session origin.
//! Audio that arrives before it, and any sample stamped earlier than it, is
//! dropped. Samples are appended only while their track reports ready;
//! otherwise they are dropped, never queued.
//!
//! # Example
//! ```rust,ignore
//! use crabrecord::recording::{RecordingCoordinator, TimestampedTarget};
//! use crabrecord::writer::Mp4WriterFactory;
//!
//! let coordinator = RecordingCoordinator::builder(Mp4WriterFactory)
//!     .target(TimestampedTarget::new("recordings", "mp4"))
//!     .build()?;
//!
//! coordinator.start()?;
//! // capture threads: coordinator.on_sample(sample);
//! coordinator.stop();
//! ```

mod config;
mod coordinator;
mod listener;
mod state;
mod target;

pub use config::{RecordingConfig, RecordingQuality};
pub use coordinator::{RecordingCoordinator, RecordingCoordinatorBuilder};
pub use listener::{ChannelListener, LogListener, RecordingEvent, RecordingListener};
pub use state::{CycleStats, RecordingPhase, SampleOutcome};
pub use target::{FixedTarget, OutputTarget, TimestampedTarget};
