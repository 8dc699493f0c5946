//! Mastering pipeline
//!
//! Fixed stage order, one path:
//! trim → HP/LP → tilt → mid/side → widen → loudness match →
//! (soft clip + limit | headroom normalize) → analysis → fade → dither →
//! export → tags → signature → visualizer.
//!
//! Advisories never stop a run. Cancellation is checked between stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rm_core::AudioBuffer;
use rm_dsp::loudness::{self, LoudnessReport, MatchOutcome};
use rm_dsp::{
    Advisory, MidSideProcessor, StereoWidener, apply_dither, check_mono_compatibility,
    dynamics, fade, filter, loudness_advisory, match_target, trim_to_zero_crossings,
};

use crate::config::MasteringParameters;
use crate::decoder::AudioDecoder;
use crate::encoder::{encoder_for, export};
use crate::error::{MasterError, MasterResult};
use crate::events::{EventSink, NullSink, PipelineEvent, Stage};
use crate::integrity::stamp_file;
use crate::tags::{ExportTags, write_tags};

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Shared cancel flag, checked between stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Renders a before/after view once the master is on disk.
///
/// Called with the original and mastered paths after the exported file has
/// been closed. Failures are reported as status events and do not fail the run.
pub trait Visualizer: Send + Sync {
    fn visualize(
        &self,
        original: &Path,
        mastered: &Path,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Output of the in-memory stage chain
#[derive(Debug, Clone)]
pub struct ProcessedAudio {
    pub buffer: AudioBuffer,
    /// Loudness after dynamics, before fades and dither
    pub loudness: LoudnessReport,
    /// Stereo minus mono-fold loudness (dB)
    pub phase_drop_db: f64,
    /// How the loudness match resolved
    pub match_outcome: MatchOutcome,
    /// Zero-crossing adjusted trim range (ms)
    pub trim_ms: (f64, f64),
    pub advisories: Vec<Advisory>,
}

/// Terminal result of a file run
#[derive(Debug, Clone)]
pub struct MasteringResult {
    pub buffer: AudioBuffer,
    pub loudness_lufs: f64,
    pub loudness: LoudnessReport,
    pub phase_drop_db: f64,
    /// SHA-256 of the exported file, lowercase hex
    pub signature: String,
    pub output_path: PathBuf,
    pub advisories: Vec<Advisory>,
    pub trim_ms: (f64, f64),
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

pub struct MasteringPipeline {
    params: MasteringParameters,
    sink: Arc<dyn EventSink>,
    visualizer: Option<Arc<dyn Visualizer>>,
    cancel: CancelToken,
}

impl MasteringPipeline {
    /// Validate parameters and build a pipeline with no sink or visualizer
    pub fn new(params: MasteringParameters) -> MasterResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            sink: Arc::new(NullSink),
            visualizer: None,
            cancel: CancelToken::new(),
        })
    }

    /// Set event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set visualizer
    pub fn with_visualizer(mut self, visualizer: Arc<dyn Visualizer>) -> Self {
        self.visualizer = Some(visualizer);
        self
    }

    /// Share a cancel token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    fn emit(&self, event: PipelineEvent) {
        event.log();
        self.sink.emit(&event);
    }

    fn status(&self, message: impl Into<String>) {
        self.emit(PipelineEvent::Status(message.into()));
    }

    /// Cancellation point, then announce the stage
    fn enter(&self, stage: Stage) -> MasterResult<()> {
        if self.cancel.is_cancelled() {
            self.status(format!("Cancelled before {stage}"));
            return Err(MasterError::Cancelled);
        }
        self.emit(PipelineEvent::Stage(stage));
        Ok(())
    }

    /// Run the stage chain on a decoded buffer. Deterministic for a fixed
    /// input and parameter set.
    pub fn process_buffer(&self, input: &AudioBuffer) -> MasterResult<ProcessedAudio> {
        let p = &self.params;
        p.validate_for_sample_rate(input.sample_rate())?;

        self.enter(Stage::Trimming)?;
        let trim = trim_to_zero_crossings(
            input,
            p.trim_start_s * 1000.0,
            p.trim_end_s * 1000.0,
            p.zero_crossing_window_ms,
        );
        if trim.buffer.is_empty() {
            return Err(MasterError::InvalidParameter(format!(
                "trim start {:.3} s is beyond the input ({:.3} s)",
                p.trim_start_s,
                input.duration_ms() / 1000.0
            )));
        }
        let trim_ms = (trim.start_ms, trim.end_ms);
        let mut buffer = trim.buffer;

        self.enter(Stage::Filtering)?;
        buffer = filter::low_pass(&filter::high_pass(&buffer, p.high_pass_hz), p.low_pass_hz);

        self.enter(Stage::Tilt)?;
        buffer = filter::tilt(&buffer, p.tilt_db);

        self.enter(Stage::MidSide)?;
        buffer = MidSideProcessor::new(p.mid_side_crossover_hz, p.side_gain_db)
            .process(&buffer)
            .map_err(MasterError::processing(Stage::MidSide))?;

        self.enter(Stage::Widening)?;
        buffer = StereoWidener::new(p.widener_delay_ms, p.dry_wet, p.widener_crossover_hz)
            .widen_crossover_safe(&buffer)
            .map_err(MasterError::processing(Stage::Widening))?;

        self.enter(Stage::LoudnessMatch)?;
        let matched = match_target(&buffer, p.target_lufs, p.ceiling_dbfs)
            .map_err(MasterError::processing(Stage::LoudnessMatch))?;
        match matched.outcome {
            MatchOutcome::Matched { gain_db, limiter_db } => self.status(format!(
                "Loudness {:.1} LUFS -> {:.1} LUFS (gain {:+.1} dB, ceiling {:+.1} dB)",
                matched.measured_lufs, p.target_lufs, gain_db, limiter_db
            )),
            MatchOutcome::Silent => {
                self.status("No measurable program; loudness match skipped")
            }
        }
        let match_outcome = matched.outcome;
        buffer = matched.buffer;

        self.enter(Stage::Dynamics)?;
        buffer = if p.soft_clip {
            dynamics::limit(
                &dynamics::soft_clip(&buffer, p.clip_drive_db),
                p.ceiling_dbfs,
            )
        } else {
            dynamics::normalize_headroom(&buffer, p.ceiling_dbfs.abs())
        };

        self.enter(Stage::Analysis)?;
        let report = loudness::analyze(&buffer);
        let mono = check_mono_compatibility(&buffer);
        self.status(format!(
            "Final loudness {:.1} LUFS, LRA {:.1} LU, peak {:.2} dBFS, mono drop {:.1} dB",
            report.integrated_lufs,
            report.loudness_range_lu,
            report.sample_peak_dbfs,
            mono.phase_drop_db
        ));

        let advisories: Vec<Advisory> = mono
            .advisory()
            .into_iter()
            .chain(loudness_advisory(report.integrated_lufs))
            .collect();
        for advisory in &advisories {
            self.emit(PipelineEvent::Advisory(*advisory));
        }

        self.enter(Stage::Fade)?;
        buffer = fade(&buffer, p.fade_ms);

        self.enter(Stage::Dither)?;
        buffer = apply_dither(&buffer, p.dither);

        Ok(ProcessedAudio {
            buffer,
            loudness: report,
            phase_drop_db: mono.phase_drop_db,
            match_outcome,
            trim_ms,
            advisories,
        })
    }

    /// Decode `input`, master it, and write the export to `output`
    pub fn master_file(&self, input: &Path, output: &Path) -> MasterResult<MasteringResult> {
        let p = &self.params;

        self.enter(Stage::Loading)?;
        let source = AudioDecoder::decode(input)?;
        self.status(format!(
            "Loaded {} ({} ch, {} Hz, {}-bit, {:.2} s)",
            input.display(),
            source.channel_count(),
            source.sample_rate(),
            source.bit_depth().bits(),
            source.duration_ms() / 1000.0
        ));

        let processed = self.process_buffer(&source)?;

        self.enter(Stage::Encoding)?;
        log::debug!(
            "Encoding {} as .{}",
            output.display(),
            encoder_for(p.export_format).extension()
        );
        if !p.export_format.is_lossless() {
            self.status("Lossy export: 16-bit stereo, 320 kbps");
        }
        export(&processed.buffer, output, p.export_format)?;

        if p.write_tags {
            self.enter(Stage::Tagging)?;
            write_tags(output, &ExportTags::now(p.creator.as_str()))?;
        }

        self.enter(Stage::Signing)?;
        let signature = stamp_file(output)?;
        self.status(format!("Signature {signature}"));

        if let Some(visualizer) = &self.visualizer {
            self.enter(Stage::Visualizing)?;
            if let Err(e) = visualizer.visualize(input, output) {
                self.status(format!("Visualizer failed: {e}"));
            }
        }

        self.emit(PipelineEvent::Stage(Stage::Complete));
        self.status(format!("Mastered {} -> {}", input.display(), output.display()));

        Ok(MasteringResult {
            buffer: processed.buffer,
            loudness_lufs: processed.loudness.integrated_lufs,
            loudness: processed.loudness,
            phase_drop_db: processed.phase_drop_db,
            signature,
            output_path: output.to_path_buf(),
            advisories: processed.advisories,
            trim_ms: processed.trim_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use rm_core::BitDepth;

    fn program(seconds: f64) -> AudioBuffer {
        let frames = (44100.0 * seconds) as usize;
        let left = (0..frames)
            .map(|i| 0.3 * (2.0 * std::f64::consts::PI * 220.0 * i as f64 / 44100.0).sin())
            .collect();
        let right = (0..frames)
            .map(|i| 0.3 * (2.0 * std::f64::consts::PI * 330.0 * i as f64 / 44100.0).sin())
            .collect();
        AudioBuffer::from_normalized(vec![left, right], 44100, BitDepth::Bits16).unwrap()
    }

    #[test]
    fn test_invalid_parameters_rejected_up_front() {
        let params = MasteringParameters::default().with_trim(5.0, 1.0);
        assert!(matches!(
            MasteringPipeline::new(params),
            Err(MasterError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_process_buffer_stage_order() {
        let log = Arc::new(EventLog::new());
        let pipeline = MasteringPipeline::new(MasteringParameters::default().with_trim(0.0, 2.0))
            .unwrap()
            .with_event_sink(log.clone());

        let processed = pipeline.process_buffer(&program(3.0)).unwrap();
        assert!((processed.buffer.duration_ms() - 2000.0).abs() <= 40.0);
        assert!(processed.buffer.peak_dbfs() <= -1.0 + 0.001);

        let stages: Vec<Stage> = log
            .snapshot()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::Stage(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::Trimming,
                Stage::Filtering,
                Stage::Tilt,
                Stage::MidSide,
                Stage::Widening,
                Stage::LoudnessMatch,
                Stage::Dynamics,
                Stage::Analysis,
                Stage::Fade,
                Stage::Dither,
            ]
        );
    }

    #[test]
    fn test_process_buffer_is_deterministic() {
        let pipeline = MasteringPipeline::new(MasteringParameters::default()).unwrap();
        let input = program(2.0);
        let a = pipeline.process_buffer(&input).unwrap();
        let b = pipeline.process_buffer(&input).unwrap();
        assert_eq!(a.buffer, b.buffer);
    }

    #[test]
    fn test_cancel_between_stages() {
        let token = CancelToken::new();
        let pipeline = MasteringPipeline::new(MasteringParameters::default())
            .unwrap()
            .with_cancel_token(token.clone());
        token.cancel();
        assert!(matches!(
            pipeline.process_buffer(&program(1.0)),
            Err(MasterError::Cancelled)
        ));
    }

    #[test]
    fn test_trim_beyond_input_is_parameter_error() {
        let params = MasteringParameters::default().with_trim(10.0, 20.0);
        let pipeline = MasteringPipeline::new(params).unwrap();
        let err = pipeline.process_buffer(&program(1.0)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parameter);
    }

    #[test]
    fn test_silent_input_completes_with_quiet_advisory() {
        let silent = AudioBuffer::silent(2, 44100 * 2, 44100, BitDepth::Bits16).unwrap();
        let pipeline = MasteringPipeline::new(MasteringParameters::default()).unwrap();
        let processed = pipeline.process_buffer(&silent).unwrap();
        assert_eq!(processed.match_outcome, MatchOutcome::Silent);
        assert!(
            processed
                .advisories
                .iter()
                .any(|a| matches!(a, Advisory::TooQuiet { .. }))
        );
    }

    #[test]
    fn test_nyquist_checked_against_input_rate() {
        let params = MasteringParameters {
            low_pass_hz: 15_000.0,
            ..Default::default()
        };
        let pipeline = MasteringPipeline::new(params).unwrap();
        let low_rate = AudioBuffer::silent(1, 22050, 22050, BitDepth::Bits16).unwrap();
        assert!(matches!(
            pipeline.process_buffer(&low_rate),
            Err(MasterError::InvalidParameter(_))
        ));
    }
}
