//! Stereo image stages
//!
//! - Mid/side reshape with side high-pass and side gain
//! - Haas-delay widener with a mono-folded low band

use rm_core::{AudioBuffer, CoreResult, Sample, db_to_linear};

use crate::filter::{high_pass_plane, low_pass_plane};

/// Default side-channel high-pass crossover
pub const DEFAULT_SIDE_CROSSOVER_HZ: f64 = 500.0;

/// Default widener band split; below this the image is folded to mono
pub const DEFAULT_WIDENER_CROSSOVER_HZ: f64 = 150.0;

/// Per-leg trim applied when encoding to mid/side
const ENCODE_TRIM_DB: f64 = -3.0;

// ═══════════════════════════════════════════════════════════════════════════════
// MID/SIDE
// ═══════════════════════════════════════════════════════════════════════════════

/// Mid/side planes in the normalized floating domain
#[derive(Debug, Clone, PartialEq)]
pub struct MidSide {
    pub mid: Vec<Sample>,
    pub side: Vec<Sample>,
}

impl MidSide {
    /// Encode a stereo buffer. Mono buffers have no side and yield `None`.
    pub fn encode(buffer: &AudioBuffer) -> Option<Self> {
        if buffer.channel_count() != 2 {
            return None;
        }

        let trim = db_to_linear(ENCODE_TRIM_DB);
        let planes = buffer.to_normalized();
        let (left, right) = (&planes[0], &planes[1]);

        let mid = left
            .iter()
            .zip(right)
            .map(|(l, r)| trim * l + trim * r)
            .collect();
        let side = left
            .iter()
            .zip(right)
            .map(|(l, r)| trim * l - trim * r)
            .collect();

        Some(Self { mid, side })
    }

    /// Decode back to L/R in the format of `template`
    pub fn decode(&self, template: &AudioBuffer) -> CoreResult<AudioBuffer> {
        let scale = 1.0 / (2.0 * db_to_linear(ENCODE_TRIM_DB));

        let left = self
            .mid
            .iter()
            .zip(&self.side)
            .map(|(m, s)| (m + s) * scale)
            .collect();
        let right = self
            .mid
            .iter()
            .zip(&self.side)
            .map(|(m, s)| (m - s) * scale)
            .collect();

        template.with_normalized(vec![left, right])
    }
}

/// Reshapes the side channel without moving the center image
#[derive(Debug, Clone, Copy)]
pub struct MidSideProcessor {
    crossover_hz: f64,
    side_gain_db: f64,
}

impl Default for MidSideProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_SIDE_CROSSOVER_HZ, 0.0)
    }
}

impl MidSideProcessor {
    pub fn new(crossover_hz: f64, side_gain_db: f64) -> Self {
        Self {
            crossover_hz,
            side_gain_db,
        }
    }

    /// Encode, high-pass and gain the side, decode. Mono input is returned
    /// unchanged.
    pub fn process(&self, buffer: &AudioBuffer) -> CoreResult<AudioBuffer> {
        let Some(mut encoded) = MidSide::encode(buffer) else {
            return Ok(buffer.clone());
        };

        let side_gain = db_to_linear(self.side_gain_db);
        encoded.side = high_pass_plane(&encoded.side, self.crossover_hz, buffer.sample_rate())
            .into_iter()
            .map(|s| s * side_gain)
            .collect();

        log::debug!(
            "Mid/side: side HP {:.0} Hz, side gain {:+.1} dB",
            self.crossover_hz,
            self.side_gain_db
        );

        encoded.decode(buffer)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIDENER
// ═══════════════════════════════════════════════════════════════════════════════

/// Haas-effect stereo widener
#[derive(Debug, Clone, Copy)]
pub struct StereoWidener {
    /// Right-channel delay (ms)
    delay_ms: f64,
    /// Blend amount (0..1), mapped to a wet level of -10..0 dB
    dry_wet: f64,
    /// Band split for the mono-safe variant (Hz)
    crossover_hz: f64,
}

impl StereoWidener {
    pub fn new(delay_ms: f64, dry_wet: f64, crossover_hz: f64) -> Self {
        Self {
            delay_ms,
            dry_wet,
            crossover_hz,
        }
    }

    /// Level of the delayed copy summed onto the dry signal
    #[inline]
    pub fn wet_gain_db(&self) -> f64 {
        10.0 * self.dry_wet - 10.0
    }

    /// Delay R, then blend the widened pair onto the original
    pub fn widen(&self, buffer: &AudioBuffer) -> CoreResult<AudioBuffer> {
        let stereo = buffer.to_stereo();
        let frames = stereo.frames();
        let delay = stereo.ms_to_frame(self.delay_ms).min(frames);

        let mut delayed_right = vec![0i32; delay];
        delayed_right.extend_from_slice(&stereo.channel(1)[..frames - delay]);

        let widened = AudioBuffer::new(
            vec![stereo.channel(0).to_vec(), delayed_right],
            stereo.sample_rate(),
            stereo.bit_depth(),
        )?;

        Ok(stereo.overlay(&widened.apply_gain_db(self.wet_gain_db())))
    }

    /// Fold the band below the crossover to mono and widen only the band above
    pub fn widen_crossover_safe(&self, buffer: &AudioBuffer) -> CoreResult<AudioBuffer> {
        let stereo = buffer.to_stereo();
        let sample_rate = stereo.sample_rate();
        let planes = stereo.to_normalized();

        let low: Vec<Vec<Sample>> = planes
            .iter()
            .map(|plane| low_pass_plane(plane, self.crossover_hz, sample_rate))
            .collect();
        let high: Vec<Vec<Sample>> = planes
            .iter()
            .map(|plane| high_pass_plane(plane, self.crossover_hz, sample_rate))
            .collect();

        let low_mono = stereo.with_normalized(low)?.to_mono().to_stereo();
        let high_wide = self.widen(&stereo.with_normalized(high)?)?;

        log::debug!(
            "Widener: {:.1} ms Haas, wet {:+.1} dB above {:.0} Hz",
            self.delay_ms,
            self.wet_gain_db(),
            self.crossover_hz
        );

        Ok(low_mono.overlay(&high_wide))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rm_core::BitDepth;
    use std::f64::consts::PI;

    const SAMPLE_RATE: u32 = 44100;

    fn stereo_tones(frames: usize) -> AudioBuffer {
        let left = (0..frames)
            .map(|i| 0.4 * (2.0 * PI * 440.0 * i as f64 / SAMPLE_RATE as f64).sin())
            .collect();
        let right = (0..frames)
            .map(|i| 0.3 * (2.0 * PI * 660.0 * i as f64 / SAMPLE_RATE as f64).sin())
            .collect();
        AudioBuffer::from_normalized(vec![left, right], SAMPLE_RATE, BitDepth::Bits16).unwrap()
    }

    #[test]
    fn test_mid_side_round_trip() {
        let buffer = stereo_tones(4410);
        let decoded = MidSide::encode(&buffer).unwrap().decode(&buffer).unwrap();

        for ch in 0..2 {
            for (a, b) in buffer.channel(ch).iter().zip(decoded.channel(ch)) {
                assert!((a - b).abs() <= 1, "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_mid_side_mono_passthrough() {
        let mono = stereo_tones(1000).to_mono();
        let out = MidSideProcessor::default().process(&mono).unwrap();
        assert_eq!(out, mono);
    }

    #[test]
    fn test_identical_channels_have_no_side() {
        let mono = stereo_tones(2000).to_mono().to_stereo();
        let encoded = MidSide::encode(&mono).unwrap();
        assert!(encoded.side.iter().all(|s| s.abs() < 1e-12));

        let out = MidSideProcessor::new(500.0, 6.0).process(&mono).unwrap();
        assert_eq!(out.channel(0), out.channel(1));
    }

    #[test]
    fn test_side_gain_cut_narrows_image() {
        let buffer = stereo_tones(SAMPLE_RATE as usize);
        let out = MidSideProcessor::new(500.0, -60.0).process(&buffer).unwrap();

        let diff = |b: &AudioBuffer| -> f64 {
            b.channel(0)
                .iter()
                .zip(b.channel(1))
                .map(|(l, r)| ((l - r) as f64).abs())
                .sum()
        };
        assert!(diff(&out) < diff(&buffer) * 0.1);
    }

    #[test]
    fn test_wet_gain_mapping() {
        assert_eq!(StereoWidener::new(12.0, 0.0, 150.0).wet_gain_db(), -10.0);
        assert_eq!(StereoWidener::new(12.0, 1.0, 150.0).wet_gain_db(), 0.0);
    }

    #[test]
    fn test_widen_upmixes_mono() {
        let mono = stereo_tones(4410).to_mono();
        let out = StereoWidener::new(12.0, 0.25, 150.0).widen(&mono).unwrap();
        assert_eq!(out.channel_count(), 2);
        assert_eq!(out.frames(), mono.frames());
        assert_ne!(out.channel(0), out.channel(1));
    }

    #[test]
    fn test_delay_longer_than_buffer_is_silent_wet_right() {
        let buffer = AudioBuffer::new(vec![vec![100; 10], vec![200; 10]], 1000, BitDepth::Bits16)
            .unwrap();
        let out = StereoWidener::new(50.0, 1.0, 150.0).widen(&buffer).unwrap();
        // Wet right is all zeros, so R is only the dry signal
        assert_eq!(out.channel(1), &[200; 10]);
        assert_eq!(out.channel(0), &[200; 10]);
    }

    #[test]
    fn test_crossover_safe_keeps_length() {
        let buffer = stereo_tones(8820);
        let out = StereoWidener::new(12.0, 0.25, 150.0)
            .widen_crossover_safe(&buffer)
            .unwrap();
        assert_eq!(out.frames(), buffer.frames());
        assert_eq!(out.channel_count(), 2);
    }
}
