//! Dynamics stage: peak ceiling, soft saturation, headroom normalization

use rm_core::{AudioBuffer, BitDepth, Sample, db_to_linear, linear_to_db};

/// Largest level on the `bit_depth` grid that does not exceed `ceiling_dbfs`.
///
/// Scaling a peak onto this value and rounding can never land above the
/// requested ceiling.
pub fn ceiling_linear(ceiling_dbfs: f64, bit_depth: BitDepth) -> f64 {
    let full_scale = bit_depth.full_scale();
    (db_to_linear(ceiling_dbfs) * full_scale).floor() / full_scale
}

/// Scale all planes by one gain so the peak sits at `ceiling`.
/// Returns the applied gain in dB (0 when already under the ceiling).
pub fn limit_planes(planes: &mut [Vec<Sample>], ceiling: f64) -> f64 {
    let peak = planes
        .iter()
        .flat_map(|p| p.iter())
        .fold(0.0f64, |m, s| m.max(s.abs()));

    if peak <= ceiling {
        return 0.0;
    }

    let gain = ceiling / peak;
    for plane in planes.iter_mut() {
        for s in plane.iter_mut() {
            *s *= gain;
        }
    }
    linear_to_db(gain)
}

fn scale_peak_to(buffer: &AudioBuffer, target: f64) -> AudioBuffer {
    let peak = buffer.peak();
    if peak == 0.0 {
        return buffer.clone();
    }
    let gain = target / peak;
    buffer.map_planes(|plane| plane.iter().map(|s| s * gain).collect())
}

/// Global peak limiter: one gain reduction when the peak exceeds the ceiling,
/// otherwise a no-op.
pub fn limit(buffer: &AudioBuffer, ceiling_dbfs: f64) -> AudioBuffer {
    let ceiling = ceiling_linear(ceiling_dbfs, buffer.bit_depth());
    if buffer.peak() <= ceiling {
        return buffer.clone();
    }

    log::debug!(
        "Limiter: peak {:.2} dBFS -> {:.2} dBFS",
        buffer.peak_dbfs(),
        ceiling_dbfs
    );
    scale_peak_to(buffer, ceiling)
}

/// Pull the peak down to `-headroom_db` dBFS when it is above that margin.
///
/// Attenuate-only: a buffer already inside the margin (a loudness-matched
/// master, or silence) is returned unchanged.
pub fn normalize_headroom(buffer: &AudioBuffer, headroom_db: f64) -> AudioBuffer {
    let target = ceiling_linear(-headroom_db.abs(), buffer.bit_depth());
    if buffer.peak() <= target {
        return buffer.clone();
    }

    log::debug!(
        "Headroom: peak {:.2} dBFS -> {:.2} dBFS",
        buffer.peak_dbfs(),
        -headroom_db.abs()
    );
    scale_peak_to(buffer, target)
}

/// tanh saturator with make-up attenuation
#[derive(Debug, Clone, Copy)]
pub struct SoftClipper {
    drive: f64,
}

impl SoftClipper {
    pub fn new(drive_db: f64) -> Self {
        Self {
            drive: db_to_linear(drive_db),
        }
    }

    /// Output magnitude bound (normalized)
    #[inline]
    pub fn ceiling(&self) -> f64 {
        1.0 / self.drive
    }

    #[inline]
    pub fn process_sample(&self, x: Sample) -> Sample {
        (x * self.drive).tanh() / self.drive
    }

    pub fn process(&self, plane: &[Sample]) -> Vec<Sample> {
        plane.iter().map(|&x| self.process_sample(x)).collect()
    }
}

/// Saturate with `drive_db` of pre-gain and matching post-attenuation
pub fn soft_clip(buffer: &AudioBuffer, drive_db: f64) -> AudioBuffer {
    let clipper = SoftClipper::new(drive_db);
    buffer.map_planes(|plane| clipper.process(plane))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_buffer(depth: BitDepth) -> AudioBuffer {
        let plane: Vec<f64> = (0..1000).map(|i| (i as f64 / 500.0) - 1.0).collect();
        let quiet: Vec<f64> = plane.iter().map(|s| s * 0.25).collect();
        AudioBuffer::from_normalized(vec![plane, quiet], 44100, depth).unwrap()
    }

    #[test]
    fn test_limit_holds_ceiling() {
        for depth in [BitDepth::Bits16, BitDepth::Bits24] {
            let limited = limit(&ramp_buffer(depth), -3.0);
            assert!(limited.peak_dbfs() <= -3.0);
            assert_relative_eq!(limited.peak_dbfs(), -3.0, epsilon = 0.01);
        }
    }

    #[test]
    fn test_limit_under_ceiling_is_noop() {
        let buffer = ramp_buffer(BitDepth::Bits16).apply_gain_db(-12.0);
        assert_eq!(limit(&buffer, -1.0), buffer);
    }

    #[test]
    fn test_soft_clip_bounded_by_drive() {
        let full_scale = AudioBuffer::from_normalized(
            vec![vec![1.0, -1.0, 0.5, -0.999]; 2],
            44100,
            BitDepth::Bits16,
        )
        .unwrap();
        for drive_db in [0.0, 3.0, 6.0, 12.0, 24.0] {
            let bound = db_to_linear(-drive_db) + 1.0 / 32768.0;
            for input in [&full_scale, &ramp_buffer(BitDepth::Bits16)] {
                let clipped = soft_clip(input, drive_db);
                assert!(
                    clipped.peak() <= bound,
                    "drive {drive_db} dB: peak {} > {bound}",
                    clipped.peak()
                );
            }
        }
    }

    #[test]
    fn test_soft_clip_small_signals_nearly_linear() {
        let clipper = SoftClipper::new(3.0);
        assert_relative_eq!(clipper.process_sample(0.001), 0.001, epsilon = 1e-6);
        assert_relative_eq!(clipper.ceiling(), db_to_linear(-3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_headroom_only_attenuates() {
        let quiet = ramp_buffer(BitDepth::Bits24).apply_gain_db(-20.0);
        assert_eq!(normalize_headroom(&quiet, 1.0), quiet);

        let cut = normalize_headroom(&ramp_buffer(BitDepth::Bits24), 6.0);
        assert!(cut.peak_dbfs() <= -6.0);
        assert_relative_eq!(cut.peak_dbfs(), -6.0, epsilon = 0.001);
    }

    #[test]
    fn test_normalize_silence_unchanged() {
        let silent = AudioBuffer::silent(2, 100, 44100, BitDepth::Bits16).unwrap();
        assert_eq!(normalize_headroom(&silent, 1.0), silent);
    }
}
