//! Export container formats

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MasterError;

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// PCM WAV at the buffer's bit depth
    Wav,
    /// MPEG-1 Layer III, CBR 320 kbps
    Mp3,
    /// FLAC, 8-24 bit
    Flac,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Wav
    }
}

impl ExportFormat {
    /// File extension (without dot)
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
        }
    }

    /// Check if format is lossless
    pub fn is_lossless(&self) -> bool {
        !matches!(self, Self::Mp3)
    }

    /// Format implied by a path's extension
    pub fn from_path(path: &Path) -> Result<Self, MasterError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| MasterError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl FromStr for ExportFormat {
    type Err = MasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            "flac" => Ok(Self::Flac),
            other => Err(MasterError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
