//! CrabRecord: live camera and microphone recording into a single container
//!
//! Capture callbacks for video and audio run on independent threads. A
//! [`RecordingCoordinator`] receives every sample, anchors the session on the
//! first accepted video frame, drops anything the writer cannot take right
//! now, and finalizes the container off the capture path.
//!
//! # Features
//! - Explicit recording state machine (idle, starting, writing, finalizing, closed)
//! - Video-anchored session origin; pre-anchor audio is discarded
//! - Drop-on-backpressure per track, never unbounded queueing
//! - Asynchronous finalization with completion listeners
//! - Background writer thread with bounded per-track queues
//! - MP4 output via `muxide` (feature `mp4`)
//!
//! # Usage
//! ```toml
//! [dependencies]
//! crabrecord = { version = "0.1", features = ["mp4"] }
//! ```
//!
//! ```rust,ignore
//! use crabrecord::config::CrabRecordConfig;
//! use crabrecord::recording::RecordingCoordinatorBuilder;
//! use crabrecord::writer::Mp4WriterFactory;
//!
//! crabrecord::init_logging();
//! let settings = CrabRecordConfig::load_or_default();
//! let coordinator = RecordingCoordinatorBuilder::from_settings(&settings, Mp4WriterFactory).build()?;
//!
//! coordinator.start()?;
//! // camera thread:     coordinator.on_sample(SampleStream::video(clock.now(), nal, keyframe));
//! // microphone thread: coordinator.on_sample(SampleStream::audio(clock.now(), aac));
//! coordinator.stop();
//! ```
pub mod capture;
pub mod config;
pub mod errors;
pub mod invariant_ppt;
pub mod recording;
pub mod timing;
pub mod types;
pub mod writer;

// Testing utilities - mock writer and synthetic capture for offline testing
pub mod testing;

// Re-exports for convenience
pub use capture::SampleSink;
pub use errors::{RecordingError, WriterError};
pub use recording::{RecordingCoordinator, RecordingPhase, SampleOutcome};
pub use timing::{MediaTime, PTSClock};
pub use types::{MediaKind, SampleStream};

/// Initialize logging for the recording system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "crabrecord=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        mp4: cfg!(feature = "mp4"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Whether the MP4 writer is compiled in
    pub mp4: bool,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_get_info() {
        let info = get_info();
        assert_eq!(info.name, "crabrecord");
        assert_eq!(info.version, VERSION);
        assert!(!info.description.is_empty());
        assert_eq!(info.mp4, cfg!(feature = "mp4"));
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging();
        init_logging();
    }
}
