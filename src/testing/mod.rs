//! Testing utilities
//!
//! A scriptable mock writer, synthetic samples, and a synthetic two-thread
//! capture source, for exercising the recording path without hardware or a
//! real container.

mod capture;
mod mock_writer;
pub mod synthetic_data;

pub use capture::{CaptureReport, StreamReport, SyntheticCapture, SyntheticCaptureHandle};
pub use mock_writer::{Gate, MockWriter, MockWriterFactory, MockWriterHandle, WriterCall};
pub use synthetic_data::{synthetic_audio_sample, synthetic_video_sample};
