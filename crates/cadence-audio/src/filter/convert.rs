//! Sample representation conversion between raw bytes and f32.

use cadence_core::SampleFormat;

/// Append the samples in `bytes` to `out` as f32 in [-1.0, 1.0].
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn bytes_to_f32(bytes: &[u8], format: SampleFormat, out: &mut Vec<f32>) {
    out.reserve(bytes.len() / format.bytes_per_sample());
    match format {
        SampleFormat::U8 => {
            out.extend(bytes.iter().map(|&b| (f32::from(b) - 128.0) / 128.0));
        }
        SampleFormat::S16 => {
            out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|c| f32::from(i16::from_ne_bytes([c[0], c[1]])) / 32768.0),
            );
        }
        SampleFormat::S32 => {
            out.extend(bytes.chunks_exact(4).map(|c| {
                let v = i32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
                (f64::from(v) / 2_147_483_648.0) as f32
            }));
        }
        SampleFormat::F32 => {
            out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])),
            );
        }
    }
}

/// Append `samples` to `out` in the given representation, clipping to range.
pub fn f32_to_bytes(samples: &[f32], format: SampleFormat, out: &mut Vec<u8>) {
    out.reserve(samples.len() * format.bytes_per_sample());
    match format {
        SampleFormat::U8 => {
            out.extend(
                samples
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * 127.0 + 128.0).round() as u8),
            );
        }
        SampleFormat::S16 => {
            for &s in samples {
                let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
                out.extend_from_slice(&v.to_ne_bytes());
            }
        }
        SampleFormat::S32 => {
            for &s in samples {
                let v = (f64::from(s.clamp(-1.0, 1.0)) * 2_147_483_647.0).round() as i32;
                out.extend_from_slice(&v.to_ne_bytes());
            }
        }
        SampleFormat::F32 => {
            for &s in samples {
                out.extend_from_slice(&s.to_ne_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_s16_conversion() {
        let mut bytes = Vec::new();
        for v in [0i16, 16384, -32768] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let mut samples = Vec::new();
        bytes_to_f32(&bytes, SampleFormat::S16, &mut samples);
        assert_eq!(samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_clipping_on_encode() {
        let mut out = Vec::new();
        f32_to_bytes(&[2.0, -2.0], SampleFormat::S16, &mut out);
        assert_eq!(i16::from_ne_bytes([out[0], out[1]]), 32767);
        assert_eq!(i16::from_ne_bytes([out[2], out[3]]), -32767);
    }

    #[test]
    fn test_partial_sample_ignored() {
        let mut samples = Vec::new();
        bytes_to_f32(&[0, 0, 0], SampleFormat::S16, &mut samples);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_u8_midpoint_is_silence() {
        let mut samples = Vec::new();
        bytes_to_f32(&[128], SampleFormat::U8, &mut samples);
        let mut out = Vec::new();
        f32_to_bytes(&samples, SampleFormat::U8, &mut out);
        assert_eq!(out, vec![128]);
    }
}
