//! Spectral filter stage
//!
//! - First-order RC high-pass / low-pass (-3 dB at cutoff)
//! - First-order spectral tilt shelf around 1 kHz

use std::f64::consts::PI;

use rm_core::{AudioBuffer, Sample};

/// Nominal pivot of the tilt shelf
pub const TILT_PIVOT_HZ: f64 = 1000.0;

// ═══════════════════════════════════════════════════════════════════════════════
// ONE-POLE CUTOFF FILTERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnePoleKind {
    LowPass,
    HighPass,
}

/// RC-style single-pole filter
#[derive(Debug, Clone, Copy)]
pub struct OnePoleFilter {
    kind: OnePoleKind,
    alpha: f64,
}

impl OnePoleFilter {
    /// Create low-pass filter
    pub fn lowpass(cutoff_hz: f64, sample_rate: u32) -> Self {
        let (rc, dt) = Self::rc_dt(cutoff_hz, sample_rate);
        Self {
            kind: OnePoleKind::LowPass,
            alpha: dt / (rc + dt),
        }
    }

    /// Create high-pass filter
    pub fn highpass(cutoff_hz: f64, sample_rate: u32) -> Self {
        let (rc, dt) = Self::rc_dt(cutoff_hz, sample_rate);
        Self {
            kind: OnePoleKind::HighPass,
            alpha: rc / (rc + dt),
        }
    }

    fn rc_dt(cutoff_hz: f64, sample_rate: u32) -> (f64, f64) {
        (1.0 / (2.0 * PI * cutoff_hz), 1.0 / sample_rate as f64)
    }

    /// Filter one plane. The output is seeded with the first input sample.
    pub fn process(&self, samples: &[Sample]) -> Vec<Sample> {
        let Some(&first) = samples.first() else {
            return Vec::new();
        };

        let mut output = Vec::with_capacity(samples.len());
        output.push(first);
        let mut prev_out = first;

        match self.kind {
            OnePoleKind::LowPass => {
                for &x in &samples[1..] {
                    prev_out += self.alpha * (x - prev_out);
                    output.push(prev_out);
                }
            }
            OnePoleKind::HighPass => {
                for pair in samples.windows(2) {
                    prev_out = self.alpha * (prev_out + pair[1] - pair[0]);
                    output.push(prev_out);
                }
            }
        }

        output
    }
}

/// Low-pass a single floating plane
pub fn low_pass_plane(samples: &[Sample], cutoff_hz: f64, sample_rate: u32) -> Vec<Sample> {
    OnePoleFilter::lowpass(cutoff_hz, sample_rate).process(samples)
}

/// High-pass a single floating plane
pub fn high_pass_plane(samples: &[Sample], cutoff_hz: f64, sample_rate: u32) -> Vec<Sample> {
    OnePoleFilter::highpass(cutoff_hz, sample_rate).process(samples)
}

/// High-pass every channel at `cutoff_hz`
pub fn high_pass(buffer: &AudioBuffer, cutoff_hz: f64) -> AudioBuffer {
    let filter = OnePoleFilter::highpass(cutoff_hz, buffer.sample_rate());
    buffer.map_planes(|plane| filter.process(plane))
}

/// Low-pass every channel at `cutoff_hz`
pub fn low_pass(buffer: &AudioBuffer, cutoff_hz: f64) -> AudioBuffer {
    let filter = OnePoleFilter::lowpass(cutoff_hz, buffer.sample_rate());
    buffer.map_planes(|plane| filter.process(plane))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TILT SHELF
// ═══════════════════════════════════════════════════════════════════════════════

/// First-order tilt shelf.
///
/// `G = 10^(t/40)`, `alpha = (G-1)/(G+1)`, feed-forward `[1, alpha]`,
/// feedback `[1, alpha/2]`. These coefficients must stay as they are: exported
/// masters are expected to match earlier renders bit for bit.
#[derive(Debug, Clone, Copy)]
pub struct TiltFilter {
    b: [f64; 2],
    a: [f64; 2],
}

impl TiltFilter {
    pub fn new(tilt_db: f64) -> Self {
        let gain = 10.0_f64.powf(tilt_db / 40.0);
        let alpha = (gain - 1.0) / (gain + 1.0);
        Self {
            b: [1.0, alpha],
            a: [1.0, alpha / 2.0],
        }
    }

    /// Feed-forward and feedback coefficients
    pub fn coefficients(&self) -> ([f64; 2], [f64; 2]) {
        (self.b, self.a)
    }

    /// Direct-form filter with zero initial state
    pub fn process(&self, samples: &[Sample]) -> Vec<Sample> {
        let mut x1 = 0.0;
        let mut y1 = 0.0;
        samples
            .iter()
            .map(|&x| {
                let y = (self.b[0] * x + self.b[1] * x1 - self.a[1] * y1) / self.a[0];
                x1 = x;
                y1 = y;
                y
            })
            .collect()
    }
}

/// Apply spectral tilt. A tilt of exactly 0 dB returns the input untouched.
pub fn tilt(buffer: &AudioBuffer, tilt_db: f64) -> AudioBuffer {
    if tilt_db == 0.0 {
        return buffer.clone();
    }

    let filter = TiltFilter::new(tilt_db);
    buffer.map_planes(|plane| filter.process(plane))
}
