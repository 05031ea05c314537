//! Configuration management for CrabRecord
//!
//! Provides loading, saving and validation of the recording settings: the
//! track layout of each cycle, where output files go, and how the writer is
//! driven.

use crate::errors::{RecordingError, RecordingResult};
use crate::recording::{RecordingConfig, TimestampedTarget};
use crate::writer::DEFAULT_TRACK_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for layered overrides, e.g.
/// `CRABRECORD_WRITER__TRACK_CAPACITY=128`
pub const ENV_PREFIX: &str = "CRABRECORD";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrabRecordConfig {
    pub recording: RecordingConfig,
    pub output: OutputConfig,
    pub writer: WriterConfig,
}

/// Where recordings land
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for recordings; created on first use
    pub directory: PathBuf,
    /// File extension without the dot
    pub extension: String,
    /// chrono format for file names
    pub name_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./recordings"),
            extension: "mp4".to_string(),
            name_format: TimestampedTarget::DEFAULT_NAME_FORMAT.to_string(),
        }
    }
}

/// How the container writer is driven
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Run each writer on its own thread behind a queue
    pub background: bool,
    /// Samples in flight per track before it reports not ready
    pub track_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            background: true,
            track_capacity: DEFAULT_TRACK_CAPACITY,
        }
    }
}

impl CrabRecordConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> RecordingResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            RecordingError::InvalidConfig(format!("Failed to read config file: {}", e))
        })?;

        let config: CrabRecordConfig = toml::from_str(&contents).map_err(|e| {
            RecordingError::InvalidConfig(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> RecordingResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RecordingError::InvalidConfig(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            RecordingError::InvalidConfig(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            RecordingError::InvalidConfig(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Defaults, then the TOML file at `path` if it exists, then
    /// `CRABRECORD_*` environment variables (`__` separates sections).
    /// The result is validated.
    pub fn load_layered<P: AsRef<Path>>(path: Option<P>) -> RecordingResult<Self> {
        let mut defaults = toml::Value::try_from(Self::default()).map_err(|e| {
            RecordingError::InvalidConfig(format!("Failed to serialize defaults: {}", e))
        })?;
        // The video track follows whichever quality preset wins the layering
        if let Some(recording) = defaults.get_mut("recording").and_then(|r| r.as_table_mut()) {
            recording.remove("video");
        }
        let defaults = toml::to_string(&defaults).map_err(|e| {
            RecordingError::InvalidConfig(format!("Failed to serialize defaults: {}", e))
        })?;

        let mut builder = ::config::Config::builder()
            .add_source(::config::File::from_str(&defaults, ::config::FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path.as_ref()).required(false));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: CrabRecordConfig = builder
            .build()
            .and_then(|layered| layered.try_deserialize())
            .map_err(|e| RecordingError::InvalidConfig(format!("Failed to load layered config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabrecord.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> RecordingResult<()> {
        self.recording.validate()?;

        if self.output.directory.as_os_str().is_empty() {
            return Err(RecordingError::InvalidConfig("Output directory is empty".to_string()));
        }
        if self.output.extension.contains(['/', '\\']) {
            return Err(RecordingError::InvalidConfig(format!(
                "Output extension {:?} contains a path separator",
                self.output.extension
            )));
        }
        if self.output.name_format.trim().is_empty() {
            return Err(RecordingError::InvalidConfig("Output name format is empty".to_string()));
        }
        if self.writer.track_capacity == 0 || self.writer.track_capacity > 4096 {
            return Err(RecordingError::InvalidConfig(
                "Writer track capacity must be between 1 and 4096".to_string(),
            ));
        }

        Ok(())
    }
}
