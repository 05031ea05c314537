//! Contract tests: the coordinator's runtime invariant checks must actually
//! run when a cycle is driven.
//!
//! Invariants are recorded per thread, so every sample here is delivered on
//! the test thread.

use crabrecord::invariant_ppt::{clear_invariant_log, contract_test, invariants_checked};
use crabrecord::recording::{FixedTarget, RecordingCoordinator};
use crabrecord::testing::MockWriterFactory;
use crabrecord::{MediaKind, MediaTime, SampleStream};

fn coordinator() -> (RecordingCoordinator, crabrecord::testing::MockWriterHandle) {
    let factory = MockWriterFactory::new();
    let handle = factory.handle();
    let coordinator = RecordingCoordinator::builder(factory)
        .inline_writer()
        .target(FixedTarget::new(std::env::temp_dir().join("crabrecord-contract.mov")))
        .build()
        .unwrap();
    (coordinator, handle)
}

#[test]
fn contract_session_anchor() {
    clear_invariant_log();
    let (coordinator, _handle) = coordinator();
    coordinator.start().unwrap();

    coordinator.on_sample(SampleStream::video(MediaTime::from_millis(100), vec![0u8], true));
    coordinator.on_sample(SampleStream::audio(MediaTime::from_millis(110), vec![0u8]));

    contract_test(
        "session anchor",
        &[
            "Session anchor is written once per cycle",
            "No sample is appended before the session anchor",
        ],
    );
    coordinator.stop();
}

#[test]
fn dropped_samples_check_nothing() {
    clear_invariant_log();
    let (coordinator, handle) = coordinator();
    coordinator.start().unwrap();

    coordinator.on_sample(SampleStream::audio(MediaTime::from_millis(5), vec![0u8]));
    handle.set_ready(MediaKind::Video, false);
    coordinator.on_sample(SampleStream::video(MediaTime::from_millis(10), vec![0u8], true));

    assert!(invariants_checked().is_empty());
    coordinator.stop();
}
