//! Zero-crossing search for click-free edit points

use rm_core::AudioBuffer;

/// Default search radius around a requested edit time
pub const DEFAULT_SEARCH_WINDOW_MS: f64 = 20.0;

/// Find the zero crossing nearest to `target_ms` within ±`search_window_ms`.
///
/// A crossing is an adjacent sample pair on channel 0 whose signs differ or
/// where either sample is exactly zero; the member of the pair with the
/// smaller magnitude is the reported edit point. Returns `target_ms`
/// unchanged when the window holds no crossing.
pub fn locate(buffer: &AudioBuffer, target_ms: f64, search_window_ms: f64) -> f64 {
    let frames = buffer.frames();
    if frames < 2 {
        return target_ms;
    }

    let reference = buffer.channel(0);
    let target = buffer.ms_to_frame(target_ms).min(frames - 1);
    let radius = buffer.ms_to_frame(search_window_ms);
    let lo = target.saturating_sub(radius);
    let hi = (target + radius).min(frames - 1);

    // (distance from target, frame index)
    let mut best: Option<(usize, usize)> = None;

    for i in lo..hi {
        let (a, b) = (reference[i], reference[i + 1]);
        if a != 0 && b != 0 && (a < 0) == (b < 0) {
            continue;
        }

        let idx = if (a as i64).abs() <= (b as i64).abs() { i } else { i + 1 };
        let distance = idx.abs_diff(target);
        if best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, idx));
        }
    }

    match best {
        Some((_, idx)) => buffer.frame_to_ms(idx),
        None => target_ms,
    }
}

/// Result of a zero-crossing aligned trim
#[derive(Debug, Clone)]
pub struct ZeroCrossingTrim {
    pub buffer: AudioBuffer,
    /// Adjusted start (ms)
    pub start_ms: f64,
    /// Adjusted end (ms)
    pub end_ms: f64,
}

/// Move both trim boundaries to nearby zero crossings, then slice.
///
/// If the adjusted boundaries would collapse the region, the requested
/// boundaries are used as given.
pub fn trim_to_zero_crossings(
    buffer: &AudioBuffer,
    start_ms: f64,
    end_ms: f64,
    search_window_ms: f64,
) -> ZeroCrossingTrim {
    let mut start = locate(buffer, start_ms, search_window_ms);
    let mut end = locate(buffer, end_ms, search_window_ms);

    if end <= start {
        start = start_ms;
        end = end_ms;
    }

    log::debug!(
        "Zero-crossing trim: {:.2}ms -> {:.2}ms, {:.2}ms -> {:.2}ms",
        start_ms,
        start,
        end_ms,
        end
    );

    ZeroCrossingTrim {
        buffer: buffer.slice_ms(start, end),
        start_ms: start,
        end_ms: end,
    }
}
