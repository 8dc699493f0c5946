//! Dither stage
//!
//! Two flavours:
//! - `ProgramDerived`: the program's own non-silent material, pushed down to
//!   -110 dBFS and mixed back in. Below one LSB at 16-bit, so it quantizes to
//!   nothing there; deeper formats do receive it.
//! - `Triangular`: seeded TPDF noise of ±1 LSB.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use rm_core::{AudioBuffer, db_to_linear};

/// Peak level of the program-derived dither signal
pub const PROGRAM_DITHER_DBFS: f64 = -110.0;
/// Windows quieter than this are stripped from the dither source
pub const SILENCE_THRESHOLD_DBFS: f64 = -50.0;
/// Window used to detect silence in the dither source
pub const SILENCE_WINDOW_MS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DitherMode {
    None,
    ProgramDerived,
    Triangular { seed: u64 },
}

impl Default for DitherMode {
    fn default() -> Self {
        Self::ProgramDerived
    }
}

pub fn apply_dither(buffer: &AudioBuffer, mode: DitherMode) -> AudioBuffer {
    match mode {
        DitherMode::None => buffer.clone(),
        DitherMode::ProgramDerived => program_derived(buffer),
        DitherMode::Triangular { seed } => triangular(buffer, seed),
    }
}

/// Drop every window whose RMS (over all channels) is below the threshold
fn strip_silence(buffer: &AudioBuffer) -> AudioBuffer {
    let window = buffer.ms_to_frame(SILENCE_WINDOW_MS).max(1);
    let planes = buffer.to_normalized();
    let threshold = db_to_linear(SILENCE_THRESHOLD_DBFS);

    let mut kept = Vec::new();
    for start in (0..buffer.frames()).step_by(window) {
        let end = (start + window).min(buffer.frames());
        let count = ((end - start) * planes.len()) as f64;
        let energy: f64 = planes
            .iter()
            .map(|p| p[start..end].iter().map(|s| s * s).sum::<f64>())
            .sum();

        if (energy / count).sqrt() >= threshold {
            kept.push(start..end);
        }
    }

    buffer.gather_frames(&kept)
}

fn program_derived(buffer: &AudioBuffer) -> AudioBuffer {
    let source = strip_silence(buffer);
    let peak = source.peak();
    if peak == 0.0 {
        return buffer.clone();
    }

    let gain = db_to_linear(PROGRAM_DITHER_DBFS) / peak;
    let noise = source.map_planes(|plane| plane.iter().map(|s| s * gain).collect());

    log::debug!(
        "Dither: program-derived at {:.0} dBFS ({} of {} frames non-silent)",
        PROGRAM_DITHER_DBFS,
        source.frames(),
        buffer.frames()
    );

    buffer.overlay(&noise)
}

fn triangular(buffer: &AudioBuffer, seed: u64) -> AudioBuffer {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let lsb = 1.0 / buffer.bit_depth().full_scale();

    buffer.map_planes(|plane| {
        plane
            .iter()
            .map(|s| {
                let tpdf = rng.random_range(0.0..1.0) + rng.random_range(0.0..1.0) - 1.0;
                s + tpdf * lsb
            })
            .collect()
    })
}
