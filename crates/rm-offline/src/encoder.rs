//! Audio encoding module
//!
//! Supports:
//! - WAV (via hound) at the buffer's bit depth
//! - FLAC (via flac-bound), 8 to 24 bit
//! - MP3 (via mp3lame-encoder), 16-bit PCM in, CBR 320 kbps out

use std::io::Cursor;
use std::path::Path;

use rm_core::{AudioBuffer, BitDepth};

use crate::error::{MasterError, MasterResult};
use crate::formats::ExportFormat;

/// FLAC compression level (0 fastest, 8 smallest)
const FLAC_COMPRESSION_LEVEL: u32 = 5;
/// Frames per FLAC process call
const FLAC_BLOCK_FRAMES: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════════
// ENCODER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Audio encoder trait
pub trait AudioEncoder {
    /// Encode audio buffer to bytes
    fn encode(&self, buffer: &AudioBuffer) -> MasterResult<Vec<u8>>;

    /// Get file extension
    fn extension(&self) -> &'static str;
}

/// Encoder for an export format
pub fn encoder_for(format: ExportFormat) -> Box<dyn AudioEncoder> {
    match format {
        ExportFormat::Wav => Box::new(WavEncoder),
        ExportFormat::Flac => Box::new(FlacEncoder),
        ExportFormat::Mp3 => Box::new(Mp3Encoder),
    }
}

/// Encode `buffer` and write it to `path`, creating parent directories.
/// The file is closed when this returns.
pub fn export(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> MasterResult<()> {
    let bytes = encoder_for(format).encode(buffer)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| MasterError::Write(format!("{}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, &bytes)
        .map_err(|e| MasterError::Write(format!("{}: {}", path.display(), e)))?;

    log::debug!(
        "Exported {} ({}, {} bytes)",
        path.display(),
        format,
        bytes.len()
    );
    Ok(())
}

/// Interleave planar channels, optionally requantized to another depth
fn interleave(buffer: &AudioBuffer, depth: BitDepth) -> Vec<i32> {
    let source = buffer.bit_depth();
    let channels = buffer.channels();
    let mut out = Vec::with_capacity(buffer.frames() * channels.len());

    for i in 0..buffer.frames() {
        for data in channels {
            let s = data[i];
            out.push(if depth == source {
                s
            } else {
                depth.quantize(source.normalize(s))
            });
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAV ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// WAV encoder using hound
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn encode(&self, buffer: &AudioBuffer) -> MasterResult<Vec<u8>> {
        let mut output = Vec::new();
        let depth = buffer.bit_depth();

        let spec = hound::WavSpec {
            channels: buffer.channel_count() as u16,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: depth.bits(),
            sample_format: hound::SampleFormat::Int,
        };

        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut output), spec)
                .map_err(|e| MasterError::Encode(e.to_string()))?;

            for sample in interleave(buffer, depth) {
                let written = match depth {
                    BitDepth::Bits8 => writer.write_sample(sample as i8),
                    BitDepth::Bits16 => writer.write_sample(sample as i16),
                    BitDepth::Bits24 | BitDepth::Bits32 => writer.write_sample(sample),
                };
                written.map_err(|e| MasterError::Encode(e.to_string()))?;
            }

            writer
                .finalize()
                .map_err(|e| MasterError::Encode(e.to_string()))?;
        }

        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "wav"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLAC ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// FLAC encoder using flac-bound
pub struct FlacEncoder;

impl FlacEncoder {
    /// FLAC stores at most 24 bits here; 32-bit buffers are reduced
    fn target_depth(depth: BitDepth) -> BitDepth {
        match depth {
            BitDepth::Bits32 => BitDepth::Bits24,
            other => other,
        }
    }
}

impl AudioEncoder for FlacEncoder {
    fn encode(&self, buffer: &AudioBuffer) -> MasterResult<Vec<u8>> {
        use flac_bound::{FlacEncoder as FlacEnc, WriteWrapper};

        let depth = Self::target_depth(buffer.bit_depth());
        let channels = buffer.channel_count();
        let samples = interleave(buffer, depth);

        let mut output = Vec::new();

        let encoder_config = FlacEnc::new()
            .ok_or_else(|| MasterError::Encode("FLAC encoder init failed".to_string()))?
            .channels(channels as u32)
            .sample_rate(buffer.sample_rate())
            .bits_per_sample(depth.bits() as u32)
            .compression_level(FLAC_COMPRESSION_LEVEL);

        let mut wrapper = WriteWrapper(&mut output);
        let mut encoder = encoder_config
            .init_write(&mut wrapper)
            .map_err(|e| MasterError::Encode(format!("FLAC init write failed: {:?}", e)))?;

        for block in samples.chunks(FLAC_BLOCK_FRAMES * channels) {
            encoder
                .process_interleaved(block, (block.len() / channels) as u32)
                .map_err(|_| MasterError::Encode("FLAC process failed".to_string()))?;
        }

        encoder
            .finish()
            .map_err(|_| MasterError::Encode("FLAC finish failed".to_string()))?;

        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "flac"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MP3 ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// MP3 encoder using LAME via mp3lame-encoder
pub struct Mp3Encoder;

impl AudioEncoder for Mp3Encoder {
    fn encode(&self, buffer: &AudioBuffer) -> MasterResult<Vec<u8>> {
        use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, Quality};

        let mut builder = Builder::new()
            .ok_or_else(|| MasterError::Encode("LAME encoder init failed".to_string()))?;

        builder
            .set_num_channels(2)
            .map_err(|e| MasterError::Encode(format!("LAME set channels failed: {:?}", e)))?;
        builder.set_sample_rate(buffer.sample_rate()).map_err(|e| {
            MasterError::Encode(format!("LAME set sample rate failed: {:?}", e))
        })?;
        builder
            .set_brate(Bitrate::Kbps320)
            .map_err(|e| MasterError::Encode(format!("LAME set bitrate failed: {:?}", e)))?;
        builder
            .set_quality(Quality::Best)
            .map_err(|e| MasterError::Encode(format!("LAME set quality failed: {:?}", e)))?;

        let mut encoder = builder
            .build()
            .map_err(|e| MasterError::Encode(format!("LAME build failed: {:?}", e)))?;

        // LAME takes 16-bit PCM; mono is sent as two identical channels
        let stereo = buffer.to_stereo();
        let source = stereo.bit_depth();
        let to_i16 = |data: &[i32]| -> Vec<i16> {
            data.iter()
                .map(|&s| BitDepth::Bits16.quantize(source.normalize(s)) as i16)
                .collect()
        };
        let left = to_i16(stereo.channel(0));
        let right = to_i16(stereo.channel(1));

        let mut mp3_output: Vec<u8> =
            Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(left.len()));

        let input = DualPcm {
            left: &left,
            right: &right,
        };
        let encoded_size = encoder
            .encode(input, mp3_output.spare_capacity_mut())
            .map_err(|e| MasterError::Encode(format!("LAME encode failed: {:?}", e)))?;

        // SAFETY: encoder wrote encoded_size bytes into spare capacity
        unsafe {
            mp3_output.set_len(encoded_size);
        }

        mp3_output.reserve(7200);
        let flush_size = encoder
            .flush::<FlushNoGap>(mp3_output.spare_capacity_mut())
            .map_err(|e| MasterError::Encode(format!("LAME flush failed: {:?}", e)))?;

        // SAFETY: encoder wrote flush_size bytes into spare capacity
        unsafe {
            mp3_output.set_len(mp3_output.len() + flush_size);
        }

        Ok(mp3_output)
    }

    fn extension(&self) -> &'static str {
        "mp3"
    }
}
