//! Progress and diagnostic events
//!
//! The pipeline reports where it is and what it noticed through an
//! [`EventSink`]. Every event is also mirrored to the `log` facade, so a
//! caller that installs no sink still sees the run in its logs.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use rm_dsp::Advisory;

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Loading,
    Trimming,
    Filtering,
    Tilt,
    MidSide,
    Widening,
    LoudnessMatch,
    Dynamics,
    Analysis,
    Fade,
    Dither,
    Encoding,
    Tagging,
    Signing,
    Visualizing,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Trimming => "zero-crossing trim",
            Self::Filtering => "high/low-pass",
            Self::Tilt => "tilt",
            Self::MidSide => "mid/side",
            Self::Widening => "stereo widening",
            Self::LoudnessMatch => "loudness match",
            Self::Dynamics => "dynamics",
            Self::Analysis => "analysis",
            Self::Fade => "fade",
            Self::Dither => "dither",
            Self::Encoding => "encoding",
            Self::Tagging => "tagging",
            Self::Signing => "signing",
            Self::Visualizing => "visualizing",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    /// A stage is starting
    Stage(Stage),
    /// Free-form status line
    Status(String),
    /// Non-fatal finding; processing continues
    Advisory(Advisory),
}

impl PipelineEvent {
    /// Mirror to the log facade
    pub fn log(&self) {
        match self {
            Self::Stage(stage) => log::debug!("Stage: {stage}"),
            Self::Status(message) => log::info!("{message}"),
            Self::Advisory(advisory) => log::warn!("Advisory: {advisory}"),
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(stage) => write!(f, "[{stage}]"),
            Self::Status(message) => f.write_str(message),
            Self::Advisory(advisory) => write!(f, "advisory: {advisory}"),
        }
    }
}

/// Receiver of pipeline events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn emit(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Discards events (they still reach the log)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// Ordered in-memory record of every event
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<PipelineEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Recorded advisories, in order
    pub fn advisories(&self) -> Vec<Advisory> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Advisory(a) => Some(*a),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &PipelineEvent) {
        self.events.lock().push(event.clone());
    }
}
