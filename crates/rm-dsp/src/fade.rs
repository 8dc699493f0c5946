//! Linear fade-in / fade-out

use rm_core::AudioBuffer;

/// Fade length in frames, clamped to half the buffer
fn fade_frames(buffer: &AudioBuffer, fade_ms: f64) -> usize {
    buffer.ms_to_frame(fade_ms).min(buffer.frames() / 2)
}

/// Linear ramp from silence over the first `fade_ms`
pub fn fade_in(buffer: &AudioBuffer, fade_ms: f64) -> AudioBuffer {
    apply_ramp(buffer, fade_frames(buffer, fade_ms), false)
}

/// Linear ramp to silence over the last `fade_ms`
pub fn fade_out(buffer: &AudioBuffer, fade_ms: f64) -> AudioBuffer {
    apply_ramp(buffer, fade_frames(buffer, fade_ms), true)
}

/// Fade in and out by the same duration
pub fn fade(buffer: &AudioBuffer, fade_ms: f64) -> AudioBuffer {
    fade_out(&fade_in(buffer, fade_ms), fade_ms)
}

fn apply_ramp(buffer: &AudioBuffer, length: usize, at_end: bool) -> AudioBuffer {
    if length == 0 {
        return buffer.clone();
    }

    let frames = buffer.frames();
    buffer.map_planes(|plane| {
        let mut out = plane.to_vec();
        for j in 0..length {
            let (idx, gain) = if at_end {
                (frames - length + j, 1.0 - (j + 1) as f64 / length as f64)
            } else {
                (j, j as f64 / length as f64)
            };
            out[idx] *= gain;
        }
        out
    })
}
