//! Two free-running producer threads standing in for a camera and a
//! microphone

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::synthetic_data::{synthetic_audio_sample, synthetic_video_sample};
use crate::capture::SampleSink;
use crate::timing::PTSClock;
use crate::types::SampleStream;

/// Per-stream delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    pub delivered: u64,
    pub appended: u64,
}

/// What a [`SyntheticCapture`] run delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub video: StreamReport,
    pub audio: StreamReport,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    appended: AtomicU64,
}

impl Counters {
    fn report(&self) -> StreamReport {
        StreamReport {
            delivered: self.delivered.load(Ordering::Relaxed),
            appended: self.appended.load(Ordering::Relaxed),
        }
    }
}

/// Synthetic camera + microphone sharing one [`PTSClock`]
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    clock: PTSClock,
    video_interval: Duration,
    audio_interval: Duration,
}

impl SyntheticCapture {
    pub fn new(video_fps: f64, audio_blocks_per_sec: f64) -> Self {
        Self {
            clock: PTSClock::new(),
            video_interval: Duration::from_secs_f64(1.0 / video_fps.max(1.0)),
            audio_interval: Duration::from_secs_f64(1.0 / audio_blocks_per_sec.max(1.0)),
        }
    }

    pub fn with_clock(mut self, clock: PTSClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &PTSClock {
        &self.clock
    }

    /// Start both producers against `sink`
    pub fn spawn<S: SampleSink + Clone + 'static>(&self, sink: S) -> std::io::Result<SyntheticCaptureHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let video = Arc::new(Counters::default());
        let audio = Arc::new(Counters::default());

        let video_thread = {
            let clock = self.clock.clone();
            let producer = Producer::new(sink.clone(), running.clone(), video.clone(), self.video_interval);
            std::thread::Builder::new()
                .name("synthetic-video".to_string())
                .spawn(move || producer.run(|n| synthetic_video_sample(n, clock.now())))?
        };

        let audio_thread = {
            let clock = self.clock.clone();
            let producer = Producer::new(sink, running.clone(), audio.clone(), self.audio_interval);
            let spawned = std::thread::Builder::new()
                .name("synthetic-audio".to_string())
                .spawn(move || producer.run(|n| synthetic_audio_sample(n, clock.now())));
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    running.store(false, Ordering::Release);
                    let _ = video_thread.join();
                    return Err(e);
                }
            }
        };

        Ok(SyntheticCaptureHandle {
            running,
            threads: vec![video_thread, audio_thread],
            video,
            audio,
        })
    }
}

struct Producer<S> {
    sink: S,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    interval: Duration,
}

impl<S: SampleSink> Producer<S> {
    fn new(sink: S, running: Arc<AtomicBool>, counters: Arc<Counters>, interval: Duration) -> Self {
        Self { sink, running, counters, interval }
    }

    fn run(self, make: impl Fn(u64) -> SampleStream) {
        let mut frame_number = 0u64;
        while self.running.load(Ordering::Acquire) {
            let outcome = self.sink.on_sample(make(frame_number));
            self.counters.delivered.fetch_add(1, Ordering::Relaxed);
            if outcome.is_appended() {
                self.counters.appended.fetch_add(1, Ordering::Relaxed);
            }
            frame_number += 1;
            std::thread::sleep(self.interval);
        }
    }
}

/// Running producers; stop them to collect the report
pub struct SyntheticCaptureHandle {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    video: Arc<Counters>,
    audio: Arc<Counters>,
}

impl SyntheticCaptureHandle {
    /// Counts so far, without stopping
    pub fn report(&self) -> CaptureReport {
        CaptureReport {
            video: self.video.report(),
            audio: self.audio.report(),
        }
    }

    pub fn stop(mut self) -> CaptureReport {
        self.running.store(false, Ordering::Release);
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                log::warn!("Synthetic producer thread panicked");
            }
        }
        self.report()
    }
}

impl Drop for SyntheticCaptureHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
