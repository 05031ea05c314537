#[cfg(test)]
mod error_tests {
    use crabrecord::errors::{RecordingError, WriterError};
    use std::error::Error;

    #[test]
    fn test_recording_error_display() {
        let error = RecordingError::TargetUnavailable("no documents directory".to_string());
        assert_eq!(
            error.to_string(),
            "Output target unavailable: no documents directory"
        );
        assert_eq!(RecordingError::AlreadyRecording.to_string(), "Already recording");
    }

    #[test]
    fn test_recording_error_codes() {
        let errors = vec![
            RecordingError::TargetUnavailable("t".to_string()),
            RecordingError::WriterConstructionFailed("w".to_string()),
            RecordingError::TrackRegistrationFailed("r".to_string()),
            RecordingError::AlreadyRecording,
            RecordingError::FinalizeFailed("f".to_string()),
            RecordingError::InvalidConfig("c".to_string()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes[3], "ALREADY_RECORDING");
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_recording_error_debug_format() {
        let error = RecordingError::FinalizeFailed("moov write failed".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("FinalizeFailed"));
        assert!(debug_str.contains("moov write failed"));
    }

    #[test]
    fn test_errors_implement_error_trait() {
        let recording = RecordingError::WriterConstructionFailed("disk full".to_string());
        let _error_trait: &dyn Error = &recording;
        assert!(recording.source().is_none());

        let writer = WriterError::Muxer("bad SPS".to_string());
        let _error_trait: &dyn Error = &writer;
        assert_eq!(writer.to_string(), "Muxing error: bad SPS");
    }

    #[test]
    fn test_writer_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume");
        let error: WriterError = io.into();
        assert!(matches!(error, WriterError::Io(ref msg) if msg.contains("read-only volume")));
    }

    #[test]
    fn test_recording_error_clone_and_eq() {
        let error = RecordingError::TrackRegistrationFailed("audio: unsupported".to_string());
        assert_eq!(error.clone(), error);
        assert_ne!(error, RecordingError::AlreadyRecording);
    }
}
