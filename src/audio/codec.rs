//! G.711 µ-law expansion, 16-bit endianness swap, linear PCM resampling, and
//! fixed-size chunking.
//!
//! Ported from the reference bridge's `audio_utils.py`, with the µ-law
//! expansion kept bit-for-bit identical (sign/exponent/mantissa, bias 0x84)
//! and the resampler reimplemented as linear interpolation rather than an
//! FFT-based resample — adequate for 8/16/24 kHz telephony rates and free of
//! a DSP dependency, matching the teacher's habit of keeping small transforms
//! dependency-free (`voice/audio.rs`).

/// Bytes of 20 ms of 16-bit PCM at `sample_rate`.
pub fn chunk_bytes_for_20ms(sample_rate: u32) -> usize {
    ((sample_rate as f64) * 0.02 * 2.0).round() as usize
}

/// Decode G.711 µ-law samples to little-endian 16-bit linear PCM.
///
/// Bijective on the 256 µ-law code points; empty input yields empty output.
pub fn ulaw_to_pcm16le(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        let sample = ulaw_decode_sample(byte);
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

fn ulaw_decode_sample(byte: u8) -> i16 {
    let ulaw = !byte as i32;
    let sign = (ulaw >> 7) & 1;
    let exponent = (ulaw >> 4) & 0x07;
    let mantissa = ulaw & 0x0F;
    let magnitude = (((mantissa << 1) | 0x21) << (exponent + 2)) - 0x84;
    let signed = if sign != 0 { -magnitude } else { magnitude };
    signed.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Swap the byte order of each 16-bit sample. An involution: applying it
/// twice returns the original bytes. A single function covers both
/// directions (LE→BE and BE→LE are the same byte-pair swap).
pub fn swap_endianness16(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut pairs = data.chunks_exact(2);
    for pair in &mut pairs {
        out.push(pair[1]);
        out.push(pair[0]);
    }
    out.extend_from_slice(pairs.remainder());
    out
}

/// Linearly resample little-endian 16-bit PCM from `from_rate` to `to_rate`.
///
/// Identity when the rates match or the input is empty. Output sample count
/// is `round(input_samples * to_rate / from_rate)`.
pub fn resample(data: &[u8], from_rate: u32, to_rate: u32) -> Vec<u8> {
    if data.is_empty() || from_rate == to_rate || from_rate == 0 {
        return data.to_vec();
    }

    let samples: Vec<i16> = data
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect();
    if samples.is_empty() {
        return Vec::new();
    }

    let out_len = ((samples.len() as u64 * to_rate as u64) as f64 / from_rate as f64).round() as usize;
    let mut out = Vec::with_capacity(out_len * 2);
    if out_len == 0 {
        return out;
    }
    if samples.len() == 1 {
        for _ in 0..out_len {
            out.extend_from_slice(&samples[0].to_le_bytes());
        }
        return out;
    }

    let ratio = (samples.len() - 1) as f64 / (out_len.max(1) - 1).max(1) as f64;
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;
        let a = samples[idx.min(samples.len() - 1)] as f64;
        let b = samples[(idx + 1).min(samples.len() - 1)] as f64;
        let interpolated = a + (b - a) * frac;
        let sample = interpolated.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Split `data` into consecutive slices of exactly `size` bytes; the last
/// slice may be shorter. Concatenating the result equals `data`.
pub fn chunk(data: &[u8], size: usize) -> Vec<Vec<u8>> {
    if size == 0 {
        return vec![data.to_vec()];
    }
    data.chunks(size).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ulaw_empty_input_yields_empty_output() {
        assert!(ulaw_to_pcm16le(&[]).is_empty());
    }

    #[test]
    fn ulaw_silence_code_decodes_near_zero() {
        // 0xFF is the µ-law code for (positive) zero.
        let pcm = ulaw_to_pcm16le(&[0xFF]);
        let sample = i16::from_le_bytes([pcm[0], pcm[1]]);
        assert!(sample.abs() < 10, "expected near-zero, got {sample}");
    }

    #[test]
    fn ulaw_decode_is_bijective_on_all_256_codepoints() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for byte in 0u8..=255 {
            let sample = ulaw_decode_sample(byte);
            assert!(seen.insert(sample), "duplicate decode for byte {byte}: {sample}");
        }
    }

    #[test]
    fn swap_endianness_is_an_involution() {
        let data = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        let once = swap_endianness16(&data);
        let twice = swap_endianness16(&once);
        assert_eq!(twice, data);
    }

    #[test]
    fn resample_identity_when_rates_match() {
        let data = vec![1, 0, 2, 0, 3, 0, 4, 0];
        assert_eq!(resample(&data, 16000, 16000), data);
    }

    #[test]
    fn resample_identity_on_empty_input() {
        assert!(resample(&[], 8000, 16000).is_empty());
    }

    #[test]
    fn resample_output_length_matches_ratio() {
        // 100 samples at 8kHz -> 16kHz should yield ~200 samples.
        let mut data = Vec::new();
        for i in 0..100i16 {
            data.extend_from_slice(&i.to_le_bytes());
        }
        let out = resample(&data, 8000, 16000);
        let out_samples = out.len() / 2;
        assert_eq!(out_samples, 200);
    }

    #[test]
    fn chunk_concatenation_equals_input_and_only_last_is_short() {
        let data: Vec<u8> = (0..25u8).collect();
        let chunks = chunk(&data, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[1].len(), 10);
        assert_eq!(chunks[2].len(), 5);
        let reassembled: Vec<u8> = chunks.into_iter().flatten().collect();
        assert_eq!(reassembled, data);
    }

    #[test]
    fn chunk_bytes_for_20ms_matches_known_rates() {
        assert_eq!(chunk_bytes_for_20ms(16000), 640);
        assert_eq!(chunk_bytes_for_20ms(8000), 320);
    }
}
