//! Audio decoding module
//!
//! Uses symphonia for:
//! - WAV (PCM)
//! - FLAC (lossless)
//! - MP3 (lossy)

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use rm_core::{AudioBuffer, BitDepth};

use crate::error::{MasterError, MasterResult};

/// Bit depth assumed for codecs that do not report one (MP3)
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

// ═══════════════════════════════════════════════════════════════════════════════
// DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// File decoder producing integer PCM buffers
pub struct AudioDecoder;

impl AudioDecoder {
    /// Decode the first audio track of `path`.
    ///
    /// Corrupt packets are skipped. Sources with more than two channels keep
    /// their first two.
    pub fn decode(path: &Path) -> MasterResult<AudioBuffer> {
        if !path.is_file() {
            return Err(MasterError::InputNotFound(path.display().to_string()));
        }

        let file = File::open(path)
            .map_err(|e| MasterError::Decode(format!("{}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| MasterError::Decode(format!("{}: probe failed: {}", path.display(), e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| MasterError::Decode(format!("{}: no audio track", path.display())))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| MasterError::Decode(format!("{}: unknown sample rate", path.display())))?;
        let bits = codec_params
            .bits_per_sample
            .unwrap_or(DEFAULT_BITS_PER_SAMPLE);
        let bit_depth = BitDepth::from_bits(bits as u16)?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| MasterError::Decode(format!("{}: {}", path.display(), e)))?;

        let mut planes: Vec<Vec<f64>> = Vec::new();
        let mut skipped = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    return Err(MasterError::Decode(format!(
                        "{}: packet read failed: {}",
                        path.display(),
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    skipped += 1;
                    log::debug!("Skipping corrupt packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => {
                    return Err(MasterError::Decode(format!("{}: {}", path.display(), e)));
                }
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let channel_count = spec.channels.count();
            let mut sample_buf = SampleBuffer::<f64>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_planar_ref(decoded);
            let samples = sample_buf.samples();

            if planes.is_empty() {
                planes = vec![Vec::new(); channel_count.clamp(1, 2)];
            }
            for (ch, plane) in planes.iter_mut().enumerate() {
                let src = ch.min(channel_count - 1);
                plane.extend_from_slice(&samples[src * frames..(src + 1) * frames]);
            }
        }

        if skipped > 0 {
            log::warn!("{}: skipped {} corrupt packets", path.display(), skipped);
        }

        if planes.first().is_none_or(Vec::is_empty) {
            return Err(MasterError::Decode(format!(
                "{}: no audio frames decoded",
                path.display()
            )));
        }

        let buffer = AudioBuffer::from_normalized(planes, sample_rate, bit_depth)?;
        log::debug!(
            "Decoded {}: {} ch, {} Hz, {}-bit, {:.2} s",
            path.display(),
            buffer.channel_count(),
            buffer.sample_rate(),
            bit_depth.bits(),
            buffer.duration_ms() / 1000.0
        );

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, bits: u16, frames: usize) -> Vec<i32> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let mut written = Vec::new();
        for i in 0..frames {
            let value = ((i as f64 * 0.05).sin() * 12000.0) as i32;
            for ch in 0..channels {
                let v = if ch == 0 { value } else { -value };
                writer.write_sample(v).unwrap();
                written.push(v);
            }
        }
        writer.finalize().unwrap();
        written
    }

    #[test]
    fn test_decode_wav_is_sample_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let written = write_wav(&path, 2, 16, 4410);

        let buffer = AudioDecoder::decode(&path).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.bit_depth(), BitDepth::Bits16);
        assert_eq!(buffer.frames(), 4410);
        assert_eq!(buffer.channel(0)[100], written[200]);
        assert_eq!(buffer.channel(1)[100], written[201]);
    }

    #[test]
    fn test_decode_24_bit_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono24.wav");
        write_wav(&path, 1, 24, 1000);

        let buffer = AudioDecoder::decode(&path).unwrap();
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.bit_depth(), BitDepth::Bits24);
    }

    #[test]
    fn test_missing_file() {
        let err = AudioDecoder::decode(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, MasterError::InputNotFound(_)));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"this is not audio at all").unwrap();
        let err = AudioDecoder::decode(&path).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Input);
    }
}
