//! Mastering parameters

use std::path::Path;

use serde::{Deserialize, Serialize};

use rm_dsp::DitherMode;

use crate::error::{MasterError, MasterResult};
use crate::formats::ExportFormat;

/// Highest cutoff/crossover accepted before the sample rate is known
pub const MAX_FREQUENCY_HZ: f64 = 96_000.0;

/// Creator string written to the encoder tag
pub const DEFAULT_CREATOR: &str = "ReelMaster";

/// One mastering run's settings. Validated once, then read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringParameters {
    /// Trim start (seconds)
    pub trim_start_s: f64,
    /// Trim end (seconds)
    pub trim_end_s: f64,
    /// Zero-crossing search radius around each trim point (ms)
    pub zero_crossing_window_ms: f64,

    /// High-pass cutoff (Hz)
    pub high_pass_hz: f64,
    /// Low-pass cutoff (Hz)
    pub low_pass_hz: f64,
    /// Spectral tilt (dB)
    pub tilt_db: f64,

    /// Side-channel high-pass crossover (Hz)
    pub mid_side_crossover_hz: f64,
    /// Side-channel gain (dB)
    pub side_gain_db: f64,

    /// Widener band split (Hz)
    pub widener_crossover_hz: f64,
    /// Haas delay (ms)
    pub widener_delay_ms: f64,
    /// Widener blend (0..1)
    pub dry_wet: f64,

    /// Loudness target (LUFS)
    pub target_lufs: f64,
    /// Peak ceiling (dBFS)
    pub ceiling_dbfs: f64,

    /// Fade in/out duration (ms)
    pub fade_ms: f64,

    /// Soft clip + limiter instead of headroom normalization
    pub soft_clip: bool,
    /// Soft-clip drive (dB)
    pub clip_drive_db: f64,

    pub dither: DitherMode,
    pub export_format: ExportFormat,

    /// Write encoder/date tags to the exported file
    pub write_tags: bool,
    pub creator: String,
}

impl Default for MasteringParameters {
    fn default() -> Self {
        Self {
            trim_start_s: 0.0,
            trim_end_s: 30.0,
            zero_crossing_window_ms: 20.0,
            high_pass_hz: 40.0,
            low_pass_hz: 15_000.0,
            tilt_db: 0.0,
            mid_side_crossover_hz: 500.0,
            side_gain_db: 0.0,
            widener_crossover_hz: 150.0,
            widener_delay_ms: 12.0,
            dry_wet: 0.25,
            target_lufs: -14.0,
            ceiling_dbfs: -1.0,
            fade_ms: 50.0,
            soft_clip: false,
            clip_drive_db: 3.0,
            dither: DitherMode::default(),
            export_format: ExportFormat::default(),
            write_tags: true,
            creator: DEFAULT_CREATOR.to_string(),
        }
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> MasterResult<()> {
    if ok {
        Ok(())
    } else {
        Err(MasterError::InvalidParameter(message()))
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> MasterResult<()> {
    check(value >= min && value <= max, || {
        format!("{name} = {value} outside [{min}, {max}]")
    })
}

fn check_frequency(name: &str, value: f64) -> MasterResult<()> {
    check(value > 0.0 && value <= MAX_FREQUENCY_HZ, || {
        format!("{name} = {value} Hz outside (0, {MAX_FREQUENCY_HZ}]")
    })
}

impl MasteringParameters {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> MasterResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MasterError::InvalidParameter(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            MasterError::InvalidParameter(format!("bad parameter file {}: {}", path.display(), e))
        })
    }

    /// Set trim range (seconds)
    pub fn with_trim(mut self, start_s: f64, end_s: f64) -> Self {
        self.trim_start_s = start_s;
        self.trim_end_s = end_s;
        self
    }

    /// Set export format
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.export_format = format;
        self
    }

    /// Set soft clipping
    pub fn with_soft_clip(mut self, enabled: bool) -> Self {
        self.soft_clip = enabled;
        self
    }

    /// Range checks that do not depend on the input
    pub fn validate(&self) -> MasterResult<()> {
        let finite = [
            ("trim_start_s", self.trim_start_s),
            ("trim_end_s", self.trim_end_s),
            ("zero_crossing_window_ms", self.zero_crossing_window_ms),
            ("high_pass_hz", self.high_pass_hz),
            ("low_pass_hz", self.low_pass_hz),
            ("tilt_db", self.tilt_db),
            ("mid_side_crossover_hz", self.mid_side_crossover_hz),
            ("side_gain_db", self.side_gain_db),
            ("widener_crossover_hz", self.widener_crossover_hz),
            ("widener_delay_ms", self.widener_delay_ms),
            ("dry_wet", self.dry_wet),
            ("target_lufs", self.target_lufs),
            ("ceiling_dbfs", self.ceiling_dbfs),
            ("fade_ms", self.fade_ms),
            ("clip_drive_db", self.clip_drive_db),
        ];
        for (name, value) in finite {
            check(value.is_finite(), || format!("{name} is not a finite number"))?;
        }

        check(self.trim_start_s >= 0.0, || {
            format!("trim start {} s is negative", self.trim_start_s)
        })?;
        check(self.trim_end_s > self.trim_start_s, || {
            format!(
                "trim end {} s must be after trim start {} s",
                self.trim_end_s, self.trim_start_s
            )
        })?;
        check_range("zero_crossing_window_ms", self.zero_crossing_window_ms, 0.0, 1000.0)?;

        check_frequency("high_pass_hz", self.high_pass_hz)?;
        check_frequency("low_pass_hz", self.low_pass_hz)?;
        check(self.high_pass_hz < self.low_pass_hz, || {
            format!(
                "high-pass {} Hz must be below low-pass {} Hz",
                self.high_pass_hz, self.low_pass_hz
            )
        })?;
        check_range("tilt_db", self.tilt_db, -24.0, 24.0)?;

        check_frequency("mid_side_crossover_hz", self.mid_side_crossover_hz)?;
        check_range("side_gain_db", self.side_gain_db, -60.0, 24.0)?;
        check_frequency("widener_crossover_hz", self.widener_crossover_hz)?;
        check(
            self.widener_delay_ms > 0.0 && self.widener_delay_ms <= 50.0,
            || format!("widener_delay_ms = {} outside (0, 50]", self.widener_delay_ms),
        )?;
        check_range("dry_wet", self.dry_wet, 0.0, 1.0)?;

        check_range("target_lufs", self.target_lufs, -60.0, 0.0)?;
        check_range("ceiling_dbfs", self.ceiling_dbfs, -20.0, 0.0)?;
        check_range("fade_ms", self.fade_ms, 0.0, 10_000.0)?;
        check_range("clip_drive_db", self.clip_drive_db, 0.0, 24.0)?;

        Ok(())
    }

    /// Reject cutoffs and crossovers at or above Nyquist for `sample_rate`
    pub fn validate_for_sample_rate(&self, sample_rate: u32) -> MasterResult<()> {
        let nyquist = sample_rate as f64 / 2.0;
        for (name, value) in [
            ("high_pass_hz", self.high_pass_hz),
            ("low_pass_hz", self.low_pass_hz),
            ("mid_side_crossover_hz", self.mid_side_crossover_hz),
            ("widener_crossover_hz", self.widener_crossover_hz),
        ] {
            check(value < nyquist, || {
                format!("{name} = {value} Hz is not below Nyquist ({nyquist} Hz)")
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = MasteringParameters::default();
        assert!(params.validate().is_ok());
        assert!(params.validate_for_sample_rate(44100).is_ok());
        assert_eq!(params.creator, "ReelMaster");
        assert_eq!(params.dither, DitherMode::ProgramDerived);
    }

    #[test]
    fn test_rejects_inverted_trim() {
        let params = MasteringParameters::default().with_trim(10.0, 5.0);
        assert!(matches!(
            params.validate(),
            Err(MasterError::InvalidParameter(_))
        ));
        let params = MasteringParameters::default().with_trim(3.0, 3.0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases: Vec<Box<dyn Fn(&mut MasteringParameters)>> = vec![
            Box::new(|p| p.trim_start_s = -1.0),
            Box::new(|p| p.high_pass_hz = 0.0),
            Box::new(|p| p.high_pass_hz = 20_000.0),
            Box::new(|p| p.tilt_db = 30.0),
            Box::new(|p| p.widener_delay_ms = 0.0),
            Box::new(|p| p.dry_wet = 1.5),
            Box::new(|p| p.ceiling_dbfs = 0.5),
            Box::new(|p| p.fade_ms = -1.0),
            Box::new(|p| p.target_lufs = f64::NAN),
        ];
        for mutate in cases {
            let mut params = MasteringParameters::default();
            mutate(&mut params);
            assert!(params.validate().is_err(), "{params:?}");
        }
    }

    #[test]
    fn test_rejects_cutoff_above_nyquist() {
        let params = MasteringParameters::default();
        assert!(params.validate_for_sample_rate(22050).is_err());
        assert!(params.validate_for_sample_rate(32000).is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(
            &path,
            r#"{ "target_lufs": -16.0, "export_format": "flac", "dither": { "mode": "none" } }"#,
        )
        .unwrap();

        let params = MasteringParameters::from_json_file(&path).unwrap();
        assert_eq!(params.target_lufs, -16.0);
        assert_eq!(params.export_format, ExportFormat::Flac);
        assert_eq!(params.dither, DitherMode::None);
        assert_eq!(params.high_pass_hz, 40.0);
    }

    #[test]
    fn test_bad_json_is_parameter_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MasteringParameters::from_json_file(&path),
            Err(MasterError::InvalidParameter(_))
        ));
    }
}
