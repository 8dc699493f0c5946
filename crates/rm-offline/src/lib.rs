//! RM-Offline: file-level mastering engine
//!
//! Turns one audio file (or a folder of them) into a mastered, tagged and
//! signed export:
//! - Decode WAV / MP3 / FLAC into an integer PCM buffer
//! - Run the fixed mastering chain from `rm-dsp`
//! - Encode, tag, and hash the written file
//! - Hand the input/output pair to a visualizer
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      MasteringPipeline                           │
//! │                                                                  │
//! │  ┌─────────┐   ┌─────────────┐   ┌──────────┐   ┌─────────────┐ │
//! │  │ Decoder │ → │ Stage chain │ → │ Encoder  │ → │ Tags + SHA  │ │
//! │  │(symph.) │   │  (rm-dsp)   │   │ (format) │   │ Visualizer  │ │
//! │  └─────────┘   └─────────────┘   └──────────┘   └─────────────┘ │
//! │        │              │                │                │        │
//! │        └──────────────┴── EventSink ───┴────────────────┘        │
//! └──────────────────────────────────────────────────────────────────┘
//!                 ▲
//!   BatchProcessor: one isolated run per file, strictly sequential
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rm_offline::{MasteringParameters, MasteringPipeline};
//!
//! let pipeline = MasteringPipeline::new(MasteringParameters::default())?;
//! let result = pipeline.master_file("mix.wav".as_ref(), "mastered_mix.wav".as_ref())?;
//! println!("{:.1} LUFS, sha256 {}", result.loudness_lufs, result.signature);
//! ```

mod batch;
mod config;
mod decoder;
mod encoder;
mod error;
mod events;
mod formats;
mod integrity;
mod pipeline;
mod tags;

pub use batch::*;
pub use config::*;
pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use events::*;
pub use formats::*;
pub use integrity::*;
pub use pipeline::*;
pub use tags::*;

pub use rm_dsp::{Advisory, DitherMode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
