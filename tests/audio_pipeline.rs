//! Integration coverage for the carrier media frame codec pumped through the
//! audio transforms, matching the phone→AI direction of the pump in
//! `engine::media` (§4.2, §4.5, §6).

use audio_bridge::audio::codec::chunk_bytes_for_20ms;
use audio_bridge::audio::{chunk, resample, ulaw_to_pcm16le};
use audio_bridge::carrier::framer::{self, CarrierFrame, Encoding, StreamFormat};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

#[test]
fn pcmu_start_frame_then_media_frame_decodes_to_resampled_pcm() {
    let start = r#"{"event":"start","start":{"mediaFormat":{"encoding":"PCMU","sampleRate":8000}}}"#;
    let format = match framer::parse_frame(start).unwrap() {
        CarrierFrame::Start(format) => format,
        other => panic!("expected a start frame, got {other:?}"),
    };
    assert_eq!(format, StreamFormat { encoding: Encoding::Pcmu, sample_rate: 8000, big_endian: false });

    // A full silence byte (0xFF) in mu-law decodes to ~0 PCM.
    let payload = BASE64.encode([0xFFu8; 160]);
    let media = format!(r#"{{"event":"media","media":{{"payload":"{payload}"}}}}"#);
    let audio = match framer::parse_frame(&media).unwrap() {
        CarrierFrame::Media(Some(audio)) => audio,
        other => panic!("expected a media frame with a payload, got {other:?}"),
    };
    assert_eq!(audio.len(), 160);

    let pcm16 = ulaw_to_pcm16le(&audio);
    assert_eq!(pcm16.len(), 160 * 2);

    let resampled = resample(&pcm16, format.sample_rate, 16000);
    assert_eq!(resampled.len(), pcm16.len() * 2); // 8 kHz -> 16 kHz doubles the sample count
}

#[test]
fn outbound_audio_message_round_trips_through_the_parser() {
    let message = framer::format_audio_message(b"synthesized-audio-bytes");
    let frame = framer::parse_frame(&message).unwrap();
    assert_eq!(frame, CarrierFrame::Media(Some(b"synthesized-audio-bytes".to_vec())));
}

#[test]
fn stop_frame_and_unknown_events_are_distinguishable() {
    assert_eq!(framer::parse_frame(r#"{"event":"stop"}"#).unwrap(), CarrierFrame::Stop);
    assert_eq!(framer::parse_frame(r#"{"event":"mark","name":"ping"}"#).unwrap(), CarrierFrame::Other);
}

/// One second of 24 kHz voice-AI audio, resampled down to the carrier's
/// 8 kHz line and split into 20 ms chunks, must yield exactly 50 chunks —
/// the cadence the paced sender (§4.6.7) relies on to stay in real time.
#[test]
fn one_second_of_audio_splits_into_fifty_20ms_chunks_at_8khz() {
    let one_second_of_samples = 24_000usize;
    let pcm_24k: Vec<u8> = (0..one_second_of_samples)
        .flat_map(|i| (i as i16).to_le_bytes())
        .collect();

    let pcm_8k = resample(&pcm_24k, 24_000, 8_000);
    assert_eq!(pcm_8k.len() / 2, 8_000);

    let chunk_size = chunk_bytes_for_20ms(8_000);
    assert_eq!(chunk_size, 320); // 8000 Hz * 0.02 s * 2 bytes/sample

    let chunks = chunk(&pcm_8k, chunk_size);
    assert_eq!(chunks.len(), 50);
    assert!(chunks.iter().all(|c| c.len() == chunk_size));
}
