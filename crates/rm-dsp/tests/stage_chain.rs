//! Stage chain integration tests
//!
//! Runs the mastering stages back to back on synthetic program material.
//! Verifies:
//! - Frame count and channel layout survive the chain
//! - Ceiling holds after loudness match and limiting
//! - The chain is deterministic
//! - Mono input is handled by every stage
//! - The clean dynamics path never lifts a matched master

use rm_core::db_to_linear;
use rm_dsp::dither::DitherMode;
use rm_dsp::stereo::DEFAULT_SIDE_CROSSOVER_HZ;
use rm_dsp::zero_crossing::DEFAULT_SEARCH_WINDOW_MS;
use rm_dsp::*;

const SAMPLE_RATE: u32 = 44100;

/// Two detuned partials per channel plus a little deterministic noise
fn generate_program(seconds: f64, channels: usize) -> AudioBuffer {
    let frames = (SAMPLE_RATE as f64 * seconds) as usize;
    let mut state = 0x2545_f491_u32;
    let planes = (0..channels)
        .map(|ch| {
            (0..frames)
                .map(|i| {
                    let t = i as f64 / SAMPLE_RATE as f64;
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    let noise = (state as f64 / u32::MAX as f64) * 2.0 - 1.0;
                    0.3 * (2.0 * std::f64::consts::PI * (110.0 + ch as f64) * t).sin()
                        + 0.15 * (2.0 * std::f64::consts::PI * 2500.0 * t).sin()
                        + 0.02 * noise
                })
                .collect()
        })
        .collect();
    AudioBuffer::from_normalized(planes, SAMPLE_RATE, BitDepth::Bits16).unwrap()
}

fn run_chain(input: &AudioBuffer) -> AudioBuffer {
    let trimmed = trim_to_zero_crossings(input, 100.0, 2900.0, DEFAULT_SEARCH_WINDOW_MS).buffer;
    let filtered = low_pass(&high_pass(&trimmed, 40.0), 15000.0);
    let tilted = tilt(&filtered, 1.5);
    let shaped = MidSideProcessor::new(DEFAULT_SIDE_CROSSOVER_HZ, -1.0)
        .process(&tilted)
        .unwrap();
    let wide = StereoWidener::new(12.0, 0.25, 150.0)
        .widen_crossover_safe(&shaped)
        .unwrap();
    let matched = match_target(&wide, -14.0, -1.0).unwrap().buffer;
    let clipped = limit(&soft_clip(&matched, 3.0), -1.0);
    apply_dither(&fade(&clipped, 50.0), DitherMode::Triangular { seed: 1 })
}

#[test]
fn test_full_chain_shape_and_ceiling() {
    let input = generate_program(3.0, 2);
    let output = run_chain(&input);

    assert_eq!(output.channel_count(), 2);
    let expected = input.ms_to_frame(2800.0) as i64;
    assert!((output.frames() as i64 - expected).abs() <= input.ms_to_frame(40.0) as i64);

    // Dither adds at most one LSB on top of the limited peak
    assert!(output.peak() <= dynamics::ceiling_linear(-1.0, BitDepth::Bits16) + 1.0 / 32768.0);
    // Fade-in starts from silence; dither may leave one LSB
    assert!(output.channel(0)[0].abs() <= 1);
}

#[test]
fn test_chain_is_deterministic() {
    let input = generate_program(3.0, 2);
    assert_eq!(run_chain(&input), run_chain(&input));
}

#[test]
fn test_mono_input_becomes_stereo_at_widener() {
    let input = generate_program(3.0, 1);
    let shaped = MidSideProcessor::default().process(&input).unwrap();
    assert_eq!(shaped, input);

    let output = run_chain(&input);
    assert_eq!(output.channel_count(), 2);
}

#[test]
fn test_loudness_lands_near_target() {
    let input = generate_program(3.0, 2);
    let matched = match_target(&input, -14.0, -1.0).unwrap();
    let measured = measure(&matched.buffer);
    assert!((measured - -14.0).abs() < 0.2, "measured {measured}");
    assert!(loudness_advisory(measured).is_none());
}

#[test]
fn test_clean_path_keeps_matched_loudness() {
    // Low crest factor: the matched peak sits well under the ceiling
    let frames = SAMPLE_RATE as usize * 5;
    let plane: Vec<f64> = (0..frames)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            db_to_linear(-30.0) * (2.0 * std::f64::consts::PI * 1000.0 * t).sin()
        })
        .collect();
    let sine = AudioBuffer::from_normalized(vec![plane.clone(), plane], SAMPLE_RATE, BitDepth::Bits16)
        .unwrap();

    let matched = match_target(&sine, -14.0, -1.0).unwrap().buffer;
    assert!(matched.peak_dbfs() < -1.0);

    let clean = normalize_headroom(&matched, 1.0);
    assert_eq!(clean, matched);

    let measured = measure(&clean);
    assert!((measured - -14.0).abs() < 0.2, "measured {measured}");
    assert!(loudness_advisory(measured).is_none());
}

#[test]
fn test_clean_path_pulls_hot_peaks_to_margin() {
    let hot = generate_program(3.0, 2).apply_gain_db(6.0);
    let clean = normalize_headroom(&hot, 1.0);
    assert!(clean.peak() <= dynamics::ceiling_linear(-1.0, BitDepth::Bits16));
    assert!(clean.peak_dbfs() > -1.01);
}
