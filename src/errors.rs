//! Error types for the recording coordinator and the container writer seam

use thiserror::Error;

/// Errors reported to the caller of the recording control surface.
///
/// Returned synchronously from `start()` or delivered asynchronously through
/// `RecordingListener::on_failed`. Never raised on a capture thread.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("Output target unavailable: {0}")]
    TargetUnavailable(String),

    #[error("Writer construction failed: {0}")]
    WriterConstructionFailed(String),

    #[error("Track registration failed: {0}")]
    TrackRegistrationFailed(String),

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Finalize failed: {0}")]
    FinalizeFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RecordingError {
    /// Short machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            RecordingError::TargetUnavailable(_) => "TARGET_UNAVAILABLE",
            RecordingError::WriterConstructionFailed(_) => "WRITER_CONSTRUCTION_FAILED",
            RecordingError::TrackRegistrationFailed(_) => "TRACK_REGISTRATION_FAILED",
            RecordingError::AlreadyRecording => "ALREADY_RECORDING",
            RecordingError::FinalizeFailed(_) => "FINALIZE_FAILED",
            RecordingError::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

/// Errors raised by a [`ContainerWriter`](crate::writer::ContainerWriter)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Unknown track: {0}")]
    InvalidTrack(String),

    #[error("Track already registered: {0}")]
    DuplicateTrack(String),

    #[error("Writer is not writing (status: {0})")]
    NotWriting(String),

    #[error("Track already marked finished: {0}")]
    TrackFinished(String),

    #[error("Muxing error: {0}")]
    Muxer(String),

    #[error("Writer closed")]
    Closed,

    #[error("Rejected: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for WriterError {
    fn from(e: std::io::Error) -> Self {
        WriterError::Io(e.to_string())
    }
}

/// Result type for recording control operations
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Result type for writer operations
pub type WriterResult<T> = Result<T, WriterError>;
