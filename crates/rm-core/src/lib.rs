//! rm-core: Shared types for ReelMaster
//!
//! Provides the PCM container every mastering stage consumes and produces,
//! plus the level conversions the stages share.

mod buffer;
mod error;
mod sample;

pub use buffer::*;
pub use error::*;
pub use sample::*;
