//! ReelMaster command line
//!
//! Usage:
//!   reelmaster master <INPUT> [-o OUTPUT] - Master one file
//!   reelmaster batch <IN_DIR> <OUT_DIR>   - Master every wav/mp3/flac in a folder

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use rm_offline::{
    BatchProcessor, EventSink, ExportFormat, MasteringParameters, MasteringPipeline,
    PipelineEvent, Visualizer,
};

#[derive(Parser)]
#[command(name = "reelmaster", version, about = "Offline audio mastering")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Do not print progress events
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Master one file
    Master {
        input: PathBuf,

        /// Output file (defaults to mastered_<input name> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (defaults to the output extension)
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Program run with <INPUT> <OUTPUT> after export
        #[arg(long)]
        visualizer: Option<String>,

        #[command(flatten)]
        settings: Settings,
    },
    /// Master every wav/mp3/flac directly inside a folder
    Batch {
        input_dir: PathBuf,
        output_dir: PathBuf,

        #[command(flatten)]
        settings: Settings,
    },
}

/// Overrides on top of the parameter file (or the defaults)
#[derive(Args)]
struct Settings {
    /// JSON parameter file
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Trim start (seconds)
    #[arg(long)]
    start: Option<f64>,
    /// Trim end (seconds)
    #[arg(long)]
    end: Option<f64>,
    /// High-pass cutoff (Hz)
    #[arg(long = "hp")]
    high_pass: Option<f64>,
    /// Low-pass cutoff (Hz)
    #[arg(long = "lp")]
    low_pass: Option<f64>,
    /// Spectral tilt (dB)
    #[arg(long, allow_hyphen_values = true)]
    tilt: Option<f64>,
    /// Side channel gain above the mid/side crossover (dB)
    #[arg(long, allow_hyphen_values = true)]
    side_gain: Option<f64>,
    /// Widener blend, 0..1
    #[arg(long)]
    dry_wet: Option<f64>,
    /// Loudness target (LUFS)
    #[arg(long, allow_hyphen_values = true)]
    target: Option<f64>,
    /// Peak ceiling (dBFS)
    #[arg(long, allow_hyphen_values = true)]
    ceiling: Option<f64>,
    /// Fade in/out length (ms)
    #[arg(long)]
    fade: Option<f64>,
    /// Soft clip then limit instead of headroom normalizing
    #[arg(long)]
    soft_clip: bool,
    /// Skip encoder/date tags
    #[arg(long)]
    no_tags: bool,
}

impl Settings {
    fn resolve(&self) -> Result<MasteringParameters> {
        let mut params = match &self.params {
            Some(path) => MasteringParameters::from_json_file(path)?,
            None => MasteringParameters::default(),
        };

        let overrides = [
            (self.start, &mut params.trim_start_s),
            (self.end, &mut params.trim_end_s),
            (self.high_pass, &mut params.high_pass_hz),
            (self.low_pass, &mut params.low_pass_hz),
            (self.tilt, &mut params.tilt_db),
            (self.side_gain, &mut params.side_gain_db),
            (self.dry_wet, &mut params.dry_wet),
            (self.target, &mut params.target_lufs),
            (self.ceiling, &mut params.ceiling_dbfs),
            (self.fade, &mut params.fade_ms),
        ];
        for (value, field) in overrides {
            if let Some(value) = value {
                *field = value;
            }
        }
        if self.soft_clip {
            params.soft_clip = true;
        }
        if self.no_tags {
            params.write_tags = false;
        }

        params.validate()?;
        Ok(params)
    }
}

/// Hands the before/after pair to an external program
struct CommandVisualizer {
    program: String,
}

impl Visualizer for CommandVisualizer {
    fn visualize(
        &self,
        original: &Path,
        mastered: &Path,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let status = Command::new(&self.program)
            .arg(original)
            .arg(mastered)
            .status()?;
        if !status.success() {
            return Err(format!("{} exited with {}", self.program, status).into());
        }
        Ok(())
    }
}

fn event_sink(quiet: bool) -> Arc<dyn EventSink> {
    Arc::new(move |event: &PipelineEvent| {
        if quiet {
            return;
        }
        match event {
            PipelineEvent::Stage(stage) => eprintln!("▸ {stage}"),
            PipelineEvent::Status(message) => eprintln!("  {message}"),
            // Advisories already reach stderr through the log mirror
            PipelineEvent::Advisory(_) => {}
        }
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let sink = event_sink(cli.quiet);

    match cli.command {
        Commands::Master {
            input,
            output,
            format,
            visualizer,
            settings,
        } => {
            let output = output.unwrap_or_else(|| {
                let dir = input.parent().unwrap_or_else(|| Path::new(""));
                BatchProcessor::output_path_for(&input, dir)
            });
            let format = match format {
                Some(format) => format,
                None => ExportFormat::from_path(&output)
                    .context("cannot infer export format; pass --format")?,
            };
            let params = settings.resolve()?.with_format(format);

            let mut pipeline = MasteringPipeline::new(params)?.with_event_sink(sink);
            if let Some(program) = visualizer {
                pipeline = pipeline.with_visualizer(Arc::new(CommandVisualizer { program }));
            }

            let result = pipeline
                .master_file(&input, &output)
                .with_context(|| format!("mastering {} failed", input.display()))?;

            println!("{}  {}", result.signature, result.output_path.display());
            log::info!(
                "{:.1} LUFS, mono drop {:.1} dB, {} advisories",
                result.loudness_lufs,
                result.phase_drop_db,
                result.advisories.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Batch {
            input_dir,
            output_dir,
            settings,
        } => {
            let report = BatchProcessor::new(settings.resolve()?)?
                .with_event_sink(sink)
                .run(&input_dir, &output_dir)?;

            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(summary) => println!("{}  {}", summary.signature, outcome.output.display()),
                    Err(e) => eprintln!("FAILED {}: {}", outcome.input.display(), e),
                }
            }

            if report.cancelled {
                bail!("batch cancelled");
            }
            Ok(if report.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
