//! Folder-at-a-time mastering
//!
//! Files are processed one after another, in name order, each in its own
//! pipeline run. A failing file is recorded and the batch moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::config::MasteringParameters;
use crate::error::{MasterError, MasterResult};
use crate::events::{EventSink, NullSink, PipelineEvent};
use crate::formats::ExportFormat;
use crate::pipeline::{CancelToken, MasteringPipeline, MasteringResult};
use rm_dsp::Advisory;

/// Prefix for batch outputs
pub const OUTPUT_PREFIX: &str = "mastered_";

/// Per-file summary of a successful run
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub loudness_lufs: f64,
    pub phase_drop_db: f64,
    pub signature: String,
    pub advisories: Vec<Advisory>,
}

impl From<&MasteringResult> for FileSummary {
    fn from(result: &MasteringResult) -> Self {
        Self {
            loudness_lufs: result.loudness_lufs,
            phase_drop_db: result.phase_drop_db,
            signature: result.signature.clone(),
            advisories: result.advisories.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Error text on failure
    pub result: Result<FileSummary, String>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    /// Entries without a supported audio extension
    pub skipped: Vec<PathBuf>,
    /// Set when the run stopped on a cancel request
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0 && !self.cancelled
    }
}

/// Masters every supported file directly inside a folder
pub struct BatchProcessor {
    params: MasteringParameters,
    sink: Arc<dyn EventSink>,
    cancel: CancelToken,
}

impl BatchProcessor {
    pub fn new(params: MasteringParameters) -> MasterResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            sink: Arc::new(NullSink),
            cancel: CancelToken::new(),
        })
    }

    /// Set event sink (shared by every file's pipeline)
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// `<output_dir>/mastered_<file name>`
    pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        output_dir.join(format!("{OUTPUT_PREFIX}{name}"))
    }

    /// Split the folder's regular files into (audio, skipped), both sorted by name
    pub fn collect_inputs(input_dir: &Path) -> MasterResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        if !input_dir.is_dir() {
            return Err(MasterError::InputNotFound(input_dir.display().to_string()));
        }

        let mut audio = Vec::new();
        let mut skipped = Vec::new();

        for entry in WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Unreadable entry in {}: {}", input_dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            if ExportFormat::from_path(&path).is_ok() {
                audio.push(path);
            } else {
                skipped.push(path);
            }
        }

        Ok((audio, skipped))
    }

    fn emit(&self, event: PipelineEvent) {
        event.log();
        self.sink.emit(&event);
    }

    /// Master one file; the export format follows the input extension
    fn process_file(&self, input: &Path, output: &Path) -> MasterResult<MasteringResult> {
        let format = ExportFormat::from_path(input)?;

        MasteringPipeline::new(self.params.clone().with_format(format))?
            .with_event_sink(self.sink.clone())
            .with_cancel_token(self.cancel.clone())
            .master_file(input, output)
    }

    /// Master every supported file of `input_dir` into `output_dir`
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> MasterResult<BatchReport> {
        let (inputs, skipped) = Self::collect_inputs(input_dir)?;
        std::fs::create_dir_all(output_dir)
            .map_err(|e| MasterError::Write(format!("{}: {}", output_dir.display(), e)))?;

        for path in &skipped {
            log::debug!("Skipping {} (not wav/mp3/flac)", path.display());
        }
        self.emit(PipelineEvent::Status(format!(
            "Batch: {} file(s) to master, {} skipped",
            inputs.len(),
            skipped.len()
        )));

        let mut report = BatchReport {
            skipped,
            ..Default::default()
        };
        let total = inputs.len();

        for (index, input) in inputs.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let output = Self::output_path_for(&input, output_dir);
            self.emit(PipelineEvent::Status(format!(
                "[{}/{}] {}",
                index + 1,
                total,
                input.display()
            )));

            let result = match self.process_file(&input, &output) {
                Ok(result) => Ok(FileSummary::from(&result)),
                Err(MasterError::Cancelled) => {
                    report.cancelled = true;
                    Err(MasterError::Cancelled.to_string())
                }
                Err(e) => {
                    log::warn!("Failed to master {}: {}", input.display(), e);
                    Err(e.to_string())
                }
            };

            report.outcomes.push(FileOutcome {
                input,
                output,
                result,
            });
            if report.cancelled {
                break;
            }
        }

        self.emit(PipelineEvent::Status(format!(
            "Batch done: {} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped.len()
        )));

        Ok(report)
    }
}
