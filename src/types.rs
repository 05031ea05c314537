//! Core sample types shared by the capture side and the writer side

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timing::MediaTime;

/// Media kind carried by a sample or a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped unit of captured media.
///
/// The payload is opaque to the coordinator. Appending a sample moves it
/// into the writer; a sample that is dropped is simply released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleStream {
    kind: MediaKind,
    presentation_time: MediaTime,
    keyframe: bool,
    payload: Bytes,
}

impl SampleStream {
    /// Video frame; `keyframe` marks a sync sample (IDR/I frame)
    pub fn video(presentation_time: MediaTime, payload: impl Into<Bytes>, keyframe: bool) -> Self {
        Self {
            kind: MediaKind::Video,
            presentation_time,
            keyframe,
            payload: payload.into(),
        }
    }

    /// Audio frame; every audio frame is a sync sample
    pub fn audio(presentation_time: MediaTime, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: MediaKind::Audio,
            presentation_time,
            keyframe: true,
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn presentation_time(&self) -> MediaTime {
        self.presentation_time
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consume the sample and take its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_sample() {
        let sample = SampleStream::video(MediaTime::from_millis(33), vec![0u8, 0, 0, 1, 0x65], true);
        assert_eq!(sample.kind(), MediaKind::Video);
        assert_eq!(sample.presentation_time(), MediaTime::from_millis(33));
        assert!(sample.is_keyframe());
        assert_eq!(sample.len(), 5);
    }

    #[test]
    fn test_audio_sample_is_always_sync() {
        let sample = SampleStream::audio(MediaTime::from_millis(20), Bytes::from_static(b"aac"));
        assert_eq!(sample.kind(), MediaKind::Audio);
        assert!(sample.is_keyframe());
        assert_eq!(sample.into_payload(), Bytes::from_static(b"aac"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MediaKind::Video.to_string(), "video");
        assert_eq!(MediaKind::Audio.to_string(), "audio");
    }
}
