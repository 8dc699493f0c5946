//! Loudness metering and matching (ITU-R BS.1770-4)
//!
//! Implements:
//! - K-weighting pre-filter computed for any sample rate
//! - Integrated loudness with absolute gating (-70 LUFS) and relative gating (-10 LU)
//! - Loudness range (10th to 95th percentile of 3 s short-term blocks)
//! - Loudness matching against a target with a peak ceiling
//! - Mono-fold compatibility check and streaming-level advisories

use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;

use rm_core::{AudioBuffer, CoreResult, Sample, db_to_linear};

use crate::dynamics::{ceiling_linear, limit_planes};

/// Absolute gate for integrated loudness
pub const ABSOLUTE_GATE_LUFS: f64 = -70.0;
/// Relative gate below the absolute-gated level
pub const RELATIVE_GATE_LU: f64 = -10.0;
/// Relative gate used by loudness range
const LRA_RELATIVE_GATE_LU: f64 = -20.0;

/// Hop between gating blocks
const SEGMENT_MS: f64 = 100.0;
/// 400 ms momentary block
const BLOCK_SEGMENTS: usize = 4;
/// 3 s short-term block
const SHORT_TERM_SEGMENTS: usize = 30;

/// Stereo-to-mono loudness loss above which the fold is flagged
pub const MONO_PHASE_DROP_LIMIT_DB: f64 = 3.0;
/// Below this the master is quieter than streaming platforms normalize to
pub const QUIET_LIMIT_LUFS: f64 = -16.0;
/// Above this the master is likely over-compressed
pub const LOUD_LIMIT_LUFS: f64 = -9.0;

#[inline]
fn power_to_lufs(power: f64) -> f64 {
    if power <= 0.0 {
        f64::NEG_INFINITY
    } else {
        -0.691 + 10.0 * power.log10()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// K-WEIGHTING FILTER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// TDF-II over a whole plane, zero initial state
    fn process(&self, input: &[Sample]) -> Vec<Sample> {
        let mut z1 = 0.0;
        let mut z2 = 0.0;
        input
            .iter()
            .map(|&x| {
                let y = self.b0 * x + z1;
                z1 = self.b1 * x - self.a1 * y + z2;
                z2 = self.b2 * x - self.a2 * y;
                y
            })
            .collect()
    }
}

/// K-weighting pre-filter (two stages)
/// Stage 1: high shelf, about +4 dB above 1.5 kHz
/// Stage 2: RLB high-pass, about 38 Hz
#[derive(Debug, Clone, Copy)]
struct KWeightingFilter {
    shelf: Biquad,
    high_pass: Biquad,
}

impl KWeightingFilter {
    fn new(sample_rate: u32) -> Self {
        let fs = sample_rate as f64;
        Self {
            shelf: Self::high_shelf(fs),
            high_pass: Self::rlb_high_pass(fs),
        }
    }

    fn high_shelf(fs: f64) -> Biquad {
        let gain_db = 3.999843853973347;
        let f0 = 1681.974450955533;
        let q = 0.7071752369554196;

        let k = (PI * f0 / fs).tan();
        let vh = 10.0_f64.powf(gain_db / 20.0);
        let vb = vh.powf(0.4996667741545416);
        let a0 = 1.0 + k / q + k * k;

        Biquad {
            b0: (vh + vb * k / q + k * k) / a0,
            b1: 2.0 * (k * k - vh) / a0,
            b2: (vh - vb * k / q + k * k) / a0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        }
    }

    fn rlb_high_pass(fs: f64) -> Biquad {
        let f0 = 38.13547087602444;
        let q = 0.5003270373238773;

        let k = (PI * f0 / fs).tan();
        let a0 = 1.0 + k / q + k * k;

        Biquad {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / q + k * k) / a0,
        }
    }

    fn process(&self, plane: &[Sample]) -> Vec<Sample> {
        self.high_pass.process(&self.shelf.process(plane))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METER
// ═══════════════════════════════════════════════════════════════════════════════

/// Offline loudness summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoudnessReport {
    /// Integrated loudness (LUFS), -inf when nothing passes the gates
    pub integrated_lufs: f64,
    /// Loudness range (LU)
    pub loudness_range_lu: f64,
    /// Sample peak (dBFS)
    pub sample_peak_dbfs: f64,
}

/// Whole-buffer BS.1770 meter
#[derive(Debug, Clone, Copy)]
pub struct LoudnessMeter {
    sample_rate: u32,
}

impl LoudnessMeter {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    fn segment_len(&self) -> usize {
        ((self.sample_rate as f64 * SEGMENT_MS / 1000.0).round() as usize).max(1)
    }

    /// K-weighted energy of each 100 ms segment, summed over channels
    /// (all channel weights are 1.0 for mono and stereo)
    fn segment_energies(&self, planes: &[Vec<Sample>]) -> Vec<f64> {
        let filter = KWeightingFilter::new(self.sample_rate);
        let seg_len = self.segment_len();
        let frames = planes.first().map_or(0, Vec::len);
        let mut energies = vec![0.0; frames / seg_len];

        for plane in planes {
            let weighted = filter.process(plane);
            for (energy, segment) in energies.iter_mut().zip(weighted.chunks_exact(seg_len)) {
                *energy += segment.iter().map(|s| s * s).sum::<f64>();
            }
        }

        energies
    }

    /// Mean-square power of each overlapping block of `span` segments
    fn block_powers(&self, energies: &[f64], span: usize) -> Vec<f64> {
        let denom = (span * self.segment_len()) as f64;
        energies
            .windows(span)
            .map(|w| w.iter().sum::<f64>() / denom)
            .collect()
    }

    fn gated_integrated(powers: &[f64]) -> f64 {
        let above_absolute: Vec<f64> = powers
            .iter()
            .copied()
            .filter(|&p| power_to_lufs(p) > ABSOLUTE_GATE_LUFS)
            .collect();
        if above_absolute.is_empty() {
            return f64::NEG_INFINITY;
        }

        let abs_mean = above_absolute.iter().sum::<f64>() / above_absolute.len() as f64;
        let rel_threshold = power_to_lufs(abs_mean) + RELATIVE_GATE_LU;

        let (sum, count) = above_absolute
            .iter()
            .filter(|&&p| power_to_lufs(p) > rel_threshold)
            .fold((0.0, 0usize), |(s, c), &p| (s + p, c + 1));

        if count == 0 {
            f64::NEG_INFINITY
        } else {
            power_to_lufs(sum / count as f64)
        }
    }

    fn range(powers: &[f64]) -> f64 {
        let above_absolute: Vec<f64> = powers
            .iter()
            .copied()
            .filter(|&p| power_to_lufs(p) > ABSOLUTE_GATE_LUFS)
            .collect();
        if above_absolute.len() < 2 {
            return 0.0;
        }

        let abs_mean = above_absolute.iter().sum::<f64>() / above_absolute.len() as f64;
        let rel_threshold = power_to_lufs(abs_mean) + LRA_RELATIVE_GATE_LU;

        let mut loudnesses: Vec<f64> = above_absolute
            .iter()
            .map(|&p| power_to_lufs(p))
            .filter(|&l| l > rel_threshold)
            .collect();
        if loudnesses.len() < 2 {
            return 0.0;
        }

        loudnesses.sort_by(f64::total_cmp);

        // 10th to 95th percentile
        let low_idx = (loudnesses.len() as f64 * 0.10) as usize;
        let high_idx = ((loudnesses.len() as f64 * 0.95) as usize).min(loudnesses.len() - 1);

        loudnesses[high_idx] - loudnesses[low_idx]
    }

    /// Integrated loudness of normalized planes (LUFS)
    pub fn integrated(&self, planes: &[Vec<Sample>]) -> f64 {
        let energies = self.segment_energies(planes);
        Self::gated_integrated(&self.block_powers(&energies, BLOCK_SEGMENTS))
    }

    /// Integrated loudness, loudness range and sample peak
    pub fn analyze(&self, planes: &[Vec<Sample>]) -> LoudnessReport {
        let energies = self.segment_energies(planes);
        let peak = planes
            .iter()
            .flat_map(|p| p.iter())
            .fold(0.0f64, |m, s| m.max(s.abs()));

        LoudnessReport {
            integrated_lufs: Self::gated_integrated(&self.block_powers(&energies, BLOCK_SEGMENTS)),
            loudness_range_lu: Self::range(&self.block_powers(&energies, SHORT_TERM_SEGMENTS)),
            sample_peak_dbfs: rm_core::linear_to_db(peak),
        }
    }
}

/// Integrated loudness of a buffer (LUFS)
pub fn measure(buffer: &AudioBuffer) -> f64 {
    LoudnessMeter::new(buffer.sample_rate()).integrated(&buffer.to_normalized())
}

/// Full loudness report of a buffer
pub fn analyze(buffer: &AudioBuffer) -> LoudnessReport {
    LoudnessMeter::new(buffer.sample_rate()).analyze(&buffer.to_normalized())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ADVISORIES
// ═══════════════════════════════════════════════════════════════════════════════

/// Non-fatal finding about the master. Never alters the output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Advisory {
    /// Mono fold loses more than the allowed loudness
    MonoPhaseDrop { drop_db: f64 },
    /// Below streaming reference level
    TooQuiet { lufs: f64 },
    /// Above the loud/compressed threshold
    TooLoud { lufs: f64 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MonoPhaseDrop { drop_db } => write!(
                f,
                "mono fold loses {drop_db:.1} dB, the mono downmix may sound hollow"
            ),
            Self::TooQuiet { lufs } => write!(f, "{lufs:.1} LUFS is too quiet for streaming"),
            Self::TooLoud { lufs } => write!(f, "{lufs:.1} LUFS is very loud/compressed"),
        }
    }
}

/// Streaming-level advisory for a measured loudness
pub fn loudness_advisory(lufs: f64) -> Option<Advisory> {
    if lufs < QUIET_LIMIT_LUFS {
        Some(Advisory::TooQuiet { lufs })
    } else if lufs > LOUD_LIMIT_LUFS {
        Some(Advisory::TooLoud { lufs })
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// How a loudness match resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    /// Gain applied; `limiter_db` is the extra (<= 0) gain the ceiling imposed
    Matched { gain_db: f64, limiter_db: f64 },
    /// Nothing measurable; buffer left unchanged
    Silent,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub buffer: AudioBuffer,
    pub measured_lufs: f64,
    pub outcome: MatchOutcome,
}

/// Gain to a loudness target, then hold peaks under a ceiling
#[derive(Debug, Clone, Copy)]
pub struct LoudnessMatcher {
    target_lufs: f64,
    ceiling_dbfs: f64,
}

impl LoudnessMatcher {
    pub fn new(target_lufs: f64, ceiling_dbfs: f64) -> Self {
        Self {
            target_lufs,
            ceiling_dbfs,
        }
    }

    pub fn match_target(&self, buffer: &AudioBuffer) -> CoreResult<MatchResult> {
        let measured_lufs = measure(buffer);
        if !measured_lufs.is_finite() {
            log::debug!("Loudness match skipped: nothing above the gates");
            return Ok(MatchResult {
                buffer: buffer.clone(),
                measured_lufs,
                outcome: MatchOutcome::Silent,
            });
        }

        let gain_db = self.target_lufs - measured_lufs;
        let gain = db_to_linear(gain_db);

        let mut planes = buffer.to_normalized();
        for plane in planes.iter_mut() {
            for s in plane.iter_mut() {
                *s *= gain;
            }
        }
        let limiter_db = limit_planes(
            &mut planes,
            ceiling_linear(self.ceiling_dbfs, buffer.bit_depth()),
        );

        log::debug!(
            "Loudness match: {:.2} LUFS -> {:.2} LUFS, gain {:+.2} dB, limiter {:+.2} dB",
            measured_lufs,
            self.target_lufs,
            gain_db,
            limiter_db
        );

        Ok(MatchResult {
            buffer: buffer.with_normalized(planes)?,
            measured_lufs,
            outcome: MatchOutcome::Matched {
                gain_db,
                limiter_db,
            },
        })
    }
}

/// Match `buffer` to `target_lufs` with peaks held at or below `ceiling_dbfs`
pub fn match_target(
    buffer: &AudioBuffer,
    target_lufs: f64,
    ceiling_dbfs: f64,
) -> CoreResult<MatchResult> {
    LoudnessMatcher::new(target_lufs, ceiling_dbfs).match_target(buffer)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MONO COMPATIBILITY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonoCompatibility {
    pub stereo_lufs: f64,
    pub mono_lufs: f64,
    /// Stereo minus mono-fold loudness (dB); +inf when the fold cancels
    pub phase_drop_db: f64,
}

impl MonoCompatibility {
    pub fn advisory(&self) -> Option<Advisory> {
        (self.phase_drop_db > MONO_PHASE_DROP_LIMIT_DB).then_some(Advisory::MonoPhaseDrop {
            drop_db: self.phase_drop_db,
        })
    }
}

/// Compare loudness before and after folding to mono.
///
/// The fold is duplicated back to the source channel count so the comparison
/// only reflects cancellation, not the channel-count difference.
pub fn check_mono_compatibility(buffer: &AudioBuffer) -> MonoCompatibility {
    let stereo_lufs = measure(buffer);
    if buffer.channel_count() == 1 {
        return MonoCompatibility {
            stereo_lufs,
            mono_lufs: stereo_lufs,
            phase_drop_db: 0.0,
        };
    }

    let mono_lufs = measure(&buffer.to_mono().to_stereo());
    let phase_drop_db = match (stereo_lufs.is_finite(), mono_lufs.is_finite()) {
        (false, _) => 0.0,
        (true, false) => f64::INFINITY,
        (true, true) => stereo_lufs - mono_lufs,
    };

    MonoCompatibility {
        stereo_lufs,
        mono_lufs,
        phase_drop_db,
    }
}
