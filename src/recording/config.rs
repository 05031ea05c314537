//! Recording configuration types

use serde::{Deserialize, Serialize};

use crate::errors::{RecordingError, RecordingResult};
use crate::writer::{AudioTrackConfig, VideoCodec, VideoTrackConfig};

/// Quality presets for the video track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingQuality {
    /// 720p at 30fps, lower bitrate
    Low,
    /// 1080p at 30fps, standard bitrate
    Medium,
    /// 1080p at 30fps, high bitrate
    High,
    /// Portrait 720x1280, the phone-camera default
    Portrait,
    /// Custom settings
    Custom,
}

impl RecordingQuality {
    /// Recommended bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        match self {
            RecordingQuality::Low => 2_500_000,
            RecordingQuality::Medium => 5_000_000,
            RecordingQuality::High => 10_000_000,
            RecordingQuality::Portrait => 4_000_000,
            RecordingQuality::Custom => 5_000_000,
        }
    }

    /// Recommended resolution (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            RecordingQuality::Low => (1280, 720),
            RecordingQuality::Medium => (1920, 1080),
            RecordingQuality::High => (1920, 1080),
            RecordingQuality::Portrait => (720, 1280),
            RecordingQuality::Custom => (1920, 1080),
        }
    }

    pub fn fps(&self) -> f64 {
        30.0
    }
}

impl Default for RecordingQuality {
    fn default() -> Self {
        RecordingQuality::Portrait
    }
}

/// Track layout and container options for one recording cycle.
///
/// When deserialized, the video track starts from the `quality` preset and
/// any field given under `video` overrides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordingConfigFile")]
pub struct RecordingConfig {
    pub video: VideoTrackConfig,
    pub audio: AudioTrackConfig,
    /// Quality preset the video track was derived from
    pub quality: RecordingQuality,
    /// Write the index before the media data (moov before mdat)
    pub fast_start: bool,
    /// Optional title metadata
    pub title: Option<String>,
}

impl RecordingConfig {
    /// Explicit video dimensions with default audio
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            video: VideoTrackConfig::new(width, height, fps),
            audio: AudioTrackConfig::default(),
            quality: RecordingQuality::Custom,
            fast_start: true,
            title: None,
        }
    }

    pub fn from_quality(quality: RecordingQuality) -> Self {
        let (width, height) = quality.resolution();
        let mut video = VideoTrackConfig::new(width, height, quality.fps());
        video.bitrate = quality.bitrate();
        Self {
            video,
            audio: AudioTrackConfig::default(),
            quality,
            fast_start: true,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_fast_start(mut self, enabled: bool) -> Self {
        self.fast_start = enabled;
        self
    }

    pub fn with_audio(mut self, audio: AudioTrackConfig) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.video.bitrate = bitrate;
        self
    }

    pub fn validate(&self) -> RecordingResult<()> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(RecordingError::InvalidConfig(format!(
                "video resolution {}x{} is empty",
                self.video.width, self.video.height
            )));
        }
        if !(self.video.fps > 0.0 && self.video.fps <= 240.0) {
            return Err(RecordingError::InvalidConfig(format!(
                "video fps {} must be within (0, 240]",
                self.video.fps
            )));
        }
        if self.audio.sample_rate == 0 {
            return Err(RecordingError::InvalidConfig("audio sample rate is zero".to_string()));
        }
        if !(1..=2).contains(&self.audio.channels) {
            return Err(RecordingError::InvalidConfig(format!(
                "audio channel count {} (expected 1 or 2)",
                self.audio.channels
            )));
        }
        Ok(())
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self::from_quality(RecordingQuality::default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoOverrides {
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<f64>,
    bitrate: Option<u32>,
    codec: Option<VideoCodec>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RecordingConfigFile {
    video: VideoOverrides,
    audio: AudioTrackConfig,
    quality: RecordingQuality,
    fast_start: bool,
    title: Option<String>,
}

impl Default for RecordingConfigFile {
    fn default() -> Self {
        let defaults = RecordingConfig::default();
        Self {
            video: VideoOverrides::default(),
            audio: defaults.audio,
            quality: defaults.quality,
            fast_start: defaults.fast_start,
            title: defaults.title,
        }
    }
}

impl From<RecordingConfigFile> for RecordingConfig {
    fn from(file: RecordingConfigFile) -> Self {
        let mut config = RecordingConfig::from_quality(file.quality);
        let overrides = file.video;
        let video = &mut config.video;
        video.width = overrides.width.unwrap_or(video.width);
        video.height = overrides.height.unwrap_or(video.height);
        video.fps = overrides.fps.unwrap_or(video.fps);
        video.bitrate = overrides.bitrate.unwrap_or(video.bitrate);
        video.codec = overrides.codec.unwrap_or(video.codec);

        config.audio = file.audio;
        config.fast_start = file.fast_start;
        config.title = file.title;
        config
    }
}
