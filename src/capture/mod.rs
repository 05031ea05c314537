//! Capture-side seam
//!
//! Camera and microphone callbacks run on their own threads and hand every
//! sample to a [`SampleSink`]. The sink must return quickly and never block
//! on I/O.

use crate::recording::SampleOutcome;
use crate::types::SampleStream;

/// Receives samples from capture threads
pub trait SampleSink: Send + Sync {
    fn on_sample(&self, sample: SampleStream) -> SampleOutcome;
}

impl<S: SampleSink + ?Sized> SampleSink for std::sync::Arc<S> {
    fn on_sample(&self, sample: SampleStream) -> SampleOutcome {
        (**self).on_sample(sample)
    }
}
