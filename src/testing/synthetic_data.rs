//! Synthetic samples for offline testing
//!
//! Payloads are framed the way an encoder hands them over: H.264 Annex B
//! access units (keyframes carry SPS and PPS ahead of the IDR slice) and
//! ADTS-framed AAC-LC. Slice and raw AAC bodies are filler, so files play
//! structurally but decode to nothing meaningful. They exercise timing, flow
//! control and container framing, not codecs.

use crate::timing::MediaTime;
use crate::types::SampleStream;

/// Keyframe interval of synthetic video, in frames
pub const SYNTHETIC_GOP: u64 = 30;

/// PCM frames covered by one AAC access unit (about 23ms at 44.1kHz)
pub const SYNTHETIC_AUDIO_FRAMES: usize = 1024;

/// Sample rate the synthetic ADTS headers declare
pub const SYNTHETIC_SAMPLE_RATE: u32 = 44_100;

/// Channel count the synthetic ADTS headers declare
pub const SYNTHETIC_CHANNELS: u16 = 2;

const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

// Baseline profile, level 3.0
const SPS: [u8; 10] = [0x67, 0x42, 0x00, 0x1e, 0xda, 0x02, 0x80, 0x2d, 0x8b, 0x11];
const PPS: [u8; 4] = [0x68, 0xce, 0x38, 0x80];

const ADTS_HEADER_LEN: usize = 7;
const ADTS_SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// A synthetic video access unit stamped at `time`.
///
/// Every [`SYNTHETIC_GOP`]th frame is a keyframe carrying SPS, PPS and an IDR
/// slice; the rest are single non-IDR slices. The slice body varies with
/// `frame_number` so consecutive samples differ.
pub fn synthetic_video_sample(frame_number: u64, time: MediaTime) -> SampleStream {
    let keyframe = frame_number % SYNTHETIC_GOP == 0;

    let mut payload = Vec::with_capacity(96);
    if keyframe {
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&SPS);
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&PPS);
    }
    payload.extend_from_slice(&START_CODE);
    payload.push(if keyframe { 0x65 } else { 0x41 });

    // Consecutive bytes never repeat, so no emulated start code appears
    let base = (frame_number % 256) as u8;
    payload.extend((0u8..59).map(|i| base.wrapping_add(i)));

    SampleStream::video(time, payload, keyframe)
}

/// A synthetic ADTS-framed AAC-LC access unit stamped at `time`, declaring
/// [`SYNTHETIC_SAMPLE_RATE`] and [`SYNTHETIC_CHANNELS`]
pub fn synthetic_audio_sample(frame_number: u64, time: MediaTime) -> SampleStream {
    let mut body = vec![0x21, 0x00, 0x49, 0x90, 0x02, 0x19, 0x00, 0x23, 0x80];
    let base = (frame_number % 256) as u8;
    body.extend((0u8..15).map(|i| base.wrapping_add(i)));

    let mut payload = adts_header(SYNTHETIC_SAMPLE_RATE, SYNTHETIC_CHANNELS, body.len()).to_vec();
    payload.extend_from_slice(&body);
    SampleStream::audio(time, payload)
}

/// Seven-byte ADTS header (MPEG-4, AAC-LC, no CRC) for a raw block of
/// `body_len` bytes. Unknown sample rates fall back to 44.1kHz.
pub fn adts_header(sample_rate: u32, channels: u16, body_len: usize) -> [u8; ADTS_HEADER_LEN] {
    let rate_index = ADTS_SAMPLE_RATES
        .iter()
        .position(|r| *r == sample_rate)
        .unwrap_or(4) as u8;
    let channels = (channels.min(7)) as u8;
    let frame_len = ADTS_HEADER_LEN + body_len;

    [
        0xFF,
        0xF1,
        (1 << 6) | (rate_index << 2) | ((channels >> 2) & 0x01),
        ((channels & 0x03) << 6) | ((frame_len >> 11) & 0x03) as u8,
        ((frame_len >> 3) & 0xFF) as u8,
        (((frame_len & 0x07) << 5) as u8) | 0x1F,
        0xFC,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaKind;

    fn nal_types(payload: &[u8]) -> Vec<u8> {
        payload
            .windows(5)
            .filter(|w| w[..4] == START_CODE)
            .map(|w| w[4] & 0x1f)
            .collect()
    }

    #[test]
    fn test_video_keyframe_cadence() {
        assert!(synthetic_video_sample(0, MediaTime::ZERO).is_keyframe());
        assert!(!synthetic_video_sample(1, MediaTime::ZERO).is_keyframe());
        assert!(synthetic_video_sample(SYNTHETIC_GOP, MediaTime::ZERO).is_keyframe());
    }

    #[test]
    fn test_keyframes_carry_parameter_sets() {
        let key = synthetic_video_sample(0, MediaTime::ZERO);
        assert_eq!(key.kind(), MediaKind::Video);
        assert_eq!(nal_types(key.payload()), vec![7, 8, 5]);

        let delta = synthetic_video_sample(1, MediaTime::from_millis(33));
        assert_eq!(nal_types(delta.payload()), vec![1]);
        assert_ne!(
            synthetic_video_sample(3, MediaTime::ZERO).payload(),
            synthetic_video_sample(4, MediaTime::ZERO).payload()
        );
    }

    #[test]
    fn test_audio_is_adts_framed() {
        let sample = synthetic_audio_sample(0, MediaTime::ZERO);
        let frame = sample.payload();
        assert_eq!(sample.kind(), MediaKind::Audio);

        // Syncword, MPEG-4, layer 0, no CRC
        assert_eq!(&frame[..2], &[0xFF, 0xF1]);
        // AAC-LC at 44.1kHz
        assert_eq!(frame[2] >> 6, 1);
        assert_eq!((frame[2] >> 2) & 0x0F, 4);
        let channels = ((frame[2] & 0x01) << 2) | (frame[3] >> 6);
        assert_eq!(channels as u16, SYNTHETIC_CHANNELS);

        let frame_len = (((frame[3] & 0x03) as usize) << 11)
            | ((frame[4] as usize) << 3)
            | ((frame[5] as usize) >> 5);
        assert_eq!(frame_len, frame.len());
    }

    #[test]
    fn test_adts_header_encodes_rate_and_length() {
        let header = adts_header(48_000, 1, 300);
        assert_eq!((header[2] >> 2) & 0x0F, 3);
        assert_eq!(((header[2] & 0x01) << 2) | (header[3] >> 6), 1);
        let frame_len = (((header[3] & 0x03) as usize) << 11)
            | ((header[4] as usize) << 3)
            | ((header[5] as usize) >> 5);
        assert_eq!(frame_len, 307);
    }
}
