//! MP4 container writer backed by muxide
//!
//! Accepts pre-encoded H.264 (Annex B) video and AAC or Opus audio. Sample
//! timestamps are written relative to the session origin passed to
//! `begin_session`, so the first anchored video frame lands at t=0.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use muxide::api::{
    AacProfile, AudioCodec as MuxAudioCodec, Metadata, Muxer, MuxerBuilder, MuxerError,
    VideoCodec as MuxVideoCodec,
};

use super::{
    AudioCodec, AudioTrackConfig, ContainerWriter, TrackConfig, TrackId, VideoCodec, VideoTrackConfig,
    WriterFactory, WriterOutput, WriterStatus,
};
use crate::errors::{WriterError, WriterResult};
use crate::recording::RecordingConfig;
use crate::timing::MediaTime;
use crate::types::{MediaKind, SampleStream};

struct Track<C> {
    id: TrackId,
    config: C,
    finished: bool,
}

/// Writes one video and one audio track into an MP4 file
pub struct Mp4Writer {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    muxer: Option<Muxer<BufWriter<File>>>,
    video: Option<Track<VideoTrackConfig>>,
    audio: Option<Track<AudioTrackConfig>>,
    fast_start: bool,
    title: Option<String>,
    status: WriterStatus,
    anchor: Option<MediaTime>,
    video_committed: u64,
}

impl Mp4Writer {
    /// Create the output file. Tracks are declared afterwards.
    pub fn create<P: AsRef<Path>>(path: P, config: &RecordingConfig) -> WriterResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|e| WriterError::Io(format!("Failed to create output file {:?}: {}", path, e)))?;

        Ok(Self {
            path,
            file: Some(BufWriter::new(file)),
            muxer: None,
            video: None,
            audio: None,
            fast_start: config.fast_start,
            title: config.title.clone(),
            status: WriterStatus::Unopened,
            anchor: None,
            video_committed: 0,
        })
    }

    fn relative_pts(&self, sample: &SampleStream) -> WriterResult<f64> {
        let anchor = self
            .anchor
            .ok_or_else(|| WriterError::Rejected("session has not started".to_string()))?;
        sample
            .presentation_time()
            .since(anchor)
            .map(|d| d.as_secs_f64())
            .ok_or_else(|| {
                WriterError::Rejected(format!(
                    "sample at {} precedes session start {}",
                    sample.presentation_time(),
                    anchor
                ))
            })
    }

    /// Per-sample validation errors reject just that sample; an I/O error
    /// means the file is no longer being written and fails the writer.
    fn muxer_error(&mut self, what: &str, error: MuxerError) -> WriterError {
        if matches!(error, MuxerError::Io(_) | MuxerError::AlreadyFinished) {
            self.status = WriterStatus::Failed;
            log::error!("MP4 writer for {:?} failed: {}", self.path, error);
        }
        WriterError::Muxer(format!("Failed to write {}: {}", what, error))
    }
}

impl ContainerWriter for Mp4Writer {
    fn output_path(&self) -> &Path {
        &self.path
    }

    fn add_track(&mut self, config: &TrackConfig) -> WriterResult<TrackId> {
        if self.status != WriterStatus::Unopened {
            return Err(WriterError::Rejected("tracks must be declared before writing starts".to_string()));
        }

        match config {
            TrackConfig::Video(video) => {
                if self.video.is_some() {
                    return Err(WriterError::DuplicateTrack("video".to_string()));
                }
                if video.codec != VideoCodec::H264 {
                    return Err(WriterError::Rejected(format!("unsupported video codec {:?}", video.codec)));
                }
                if video.width == 0 || video.height == 0 || video.fps <= 0.0 {
                    return Err(WriterError::Rejected(format!(
                        "invalid video geometry {}x{} @ {}fps",
                        video.width, video.height, video.fps
                    )));
                }
                let id = TrackId::new(0, MediaKind::Video);
                self.video = Some(Track { id, config: video.clone(), finished: false });
                Ok(id)
            }
            TrackConfig::Audio(audio) => {
                if self.audio.is_some() {
                    return Err(WriterError::DuplicateTrack("audio".to_string()));
                }
                if audio.sample_rate == 0 || audio.channels == 0 {
                    return Err(WriterError::Rejected(format!(
                        "invalid audio format {}Hz x{}",
                        audio.sample_rate, audio.channels
                    )));
                }
                let id = TrackId::new(1, MediaKind::Audio);
                self.audio = Some(Track { id, config: audio.clone(), finished: false });
                Ok(id)
            }
        }
    }

    fn start_writing(&mut self) -> WriterResult<()> {
        if self.status != WriterStatus::Unopened {
            return Err(WriterError::Rejected("writer already started".to_string()));
        }
        let video = self
            .video
            .as_ref()
            .ok_or_else(|| WriterError::Rejected("an MP4 needs a video track".to_string()))?;
        let file = self.file.take().ok_or(WriterError::Closed)?;

        let mut builder = MuxerBuilder::new(file)
            .video(MuxVideoCodec::H264, video.config.width, video.config.height, video.config.fps)
            .with_fast_start(self.fast_start);

        if let Some(audio) = &self.audio {
            let codec = match audio.config.codec {
                AudioCodec::Aac => MuxAudioCodec::Aac(AacProfile::Lc),
                AudioCodec::Opus => MuxAudioCodec::Opus,
            };
            builder = builder.audio(codec, audio.config.sample_rate, audio.config.channels);
        }

        let metadata = match &self.title {
            Some(title) => Metadata::new().with_title(title).with_current_time(),
            None => Metadata::new().with_current_time(),
        };
        builder = builder.with_metadata(metadata);

        match builder.build() {
            Ok(muxer) => {
                self.muxer = Some(muxer);
                self.status = WriterStatus::Writing;
                Ok(())
            }
            Err(e) => {
                self.status = WriterStatus::Failed;
                Err(WriterError::Muxer(format!("Failed to create muxer: {}", e)))
            }
        }
    }

    fn status(&self) -> WriterStatus {
        self.status
    }

    fn begin_session(&mut self, at: MediaTime) {
        if self.anchor.is_none() {
            self.anchor = Some(at);
        }
    }

    fn is_ready_for_more_data(&self, track: TrackId) -> bool {
        if self.status != WriterStatus::Writing {
            return false;
        }
        match track.kind() {
            MediaKind::Video => self.video.as_ref().is_some_and(|t| t.id == track && !t.finished),
            MediaKind::Audio => self.audio.as_ref().is_some_and(|t| t.id == track && !t.finished),
        }
    }

    fn append(&mut self, track: TrackId, sample: SampleStream) -> WriterResult<()> {
        if self.status != WriterStatus::Writing {
            return Err(WriterError::NotWriting(self.status.to_string()));
        }
        let finished = match track.kind() {
            MediaKind::Video => self.video.as_ref().filter(|t| t.id == track).map(|t| t.finished),
            MediaKind::Audio => self.audio.as_ref().filter(|t| t.id == track).map(|t| t.finished),
        };
        match finished {
            None => return Err(WriterError::InvalidTrack(track.to_string())),
            Some(true) => return Err(WriterError::TrackFinished(track.to_string())),
            Some(false) => {}
        }

        let pts = self.relative_pts(&sample)?;
        let muxer = self.muxer.as_mut().ok_or(WriterError::Closed)?;
        let written = match track.kind() {
            MediaKind::Video => muxer.write_video(pts, sample.payload(), sample.is_keyframe()),
            MediaKind::Audio => muxer.write_audio(pts, sample.payload()),
        };
        match written {
            Ok(()) => {
                if track.kind() == MediaKind::Video {
                    self.video_committed += 1;
                }
                Ok(())
            }
            Err(e) => Err(self.muxer_error(track.kind().as_str(), e)),
        }
    }

    fn mark_finished(&mut self, track: TrackId) {
        match track.kind() {
            MediaKind::Video => {
                if let Some(t) = self.video.as_mut().filter(|t| t.id == track) {
                    t.finished = true;
                }
            }
            MediaKind::Audio => {
                if let Some(t) = self.audio.as_mut().filter(|t| t.id == track) {
                    t.finished = true;
                }
            }
        }
    }

    fn finish(self: Box<Self>) -> WriterResult<WriterOutput> {
        let mut this = *self;
        let muxer = this
            .muxer
            .take()
            .ok_or_else(|| WriterError::NotWriting(this.status.to_string()))?;

        if this.status == WriterStatus::Failed {
            return Err(WriterError::Muxer(format!("{:?} stopped accepting writes", this.path)));
        }
        // A container without a single video frame has no codec configuration
        // and is not a recording
        if this.video_committed == 0 {
            return Err(WriterError::Muxer(format!(
                "no video frames were committed to {:?}",
                this.path
            )));
        }

        let stats = muxer
            .finish_with_stats()
            .map_err(|e| WriterError::Muxer(format!("Failed to finalize recording: {}", e)))?;

        log::info!(
            "MP4 finalized: {} video / {} audio frames, {:.2}s, {} bytes",
            stats.video_frames,
            stats.audio_frames,
            stats.duration_secs,
            stats.bytes_written
        );

        Ok(WriterOutput {
            path: this.path,
            video_frames: stats.video_frames,
            audio_frames: stats.audio_frames,
            duration_secs: stats.duration_secs,
            bytes_written: stats.bytes_written,
        })
    }
}

/// Builds an [`Mp4Writer`] per cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4WriterFactory;

impl WriterFactory for Mp4WriterFactory {
    fn create(&self, target: &Path, config: &RecordingConfig) -> WriterResult<Box<dyn ContainerWriter>> {
        Ok(Box::new(Mp4Writer::create(target, config)?))
    }
}
