//! Planar integer PCM buffer
//!
//! Every mastering stage takes an `&AudioBuffer` and returns a new one; no
//! stage mutates its input. Samples are stored as signed integers at the
//! buffer's bit depth and normalized to [-1, 1] on demand for floating-point
//! processing.

use std::ops::Range;

use crate::error::{CoreError, CoreResult};
use crate::sample::{BitDepth, Sample, db_to_linear, linear_to_db};

/// Immutable-per-stage PCM container (1 or 2 channels, planar)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<i32>>,
    sample_rate: u32,
    bit_depth: BitDepth,
}

impl AudioBuffer {
    /// Create buffer from planar integer channels
    pub fn new(channels: Vec<Vec<i32>>, sample_rate: u32, bit_depth: BitDepth) -> CoreResult<Self> {
        if channels.is_empty() || channels.len() > 2 {
            return Err(CoreError::UnsupportedChannels(channels.len()));
        }
        if sample_rate == 0 {
            return Err(CoreError::InvalidSampleRate(sample_rate));
        }

        let expected = channels[0].len();
        for (channel, data) in channels.iter().enumerate().skip(1) {
            if data.len() != expected {
                return Err(CoreError::ChannelLengthMismatch {
                    channel,
                    expected,
                    actual: data.len(),
                });
            }
        }

        Ok(Self {
            channels,
            sample_rate,
            bit_depth,
        })
    }

    /// Create a silent buffer
    pub fn silent(
        channel_count: usize,
        frames: usize,
        sample_rate: u32,
        bit_depth: BitDepth,
    ) -> CoreResult<Self> {
        Self::new(vec![vec![0; frames]; channel_count], sample_rate, bit_depth)
    }

    /// Quantize normalized floating planes into a buffer (clipping)
    pub fn from_normalized(
        planes: Vec<Vec<Sample>>,
        sample_rate: u32,
        bit_depth: BitDepth,
    ) -> CoreResult<Self> {
        let channels = planes
            .iter()
            .map(|plane| plane.iter().map(|&s| bit_depth.quantize(s)).collect())
            .collect();
        Self::new(channels, sample_rate, bit_depth)
    }

    /// Normalized floating copy of every channel
    pub fn to_normalized(&self) -> Vec<Vec<Sample>> {
        self.channels
            .iter()
            .map(|data| data.iter().map(|&s| self.bit_depth.normalize(s)).collect())
            .collect()
    }

    /// Apply a length-preserving floating transform to every channel and
    /// requantize the result at this buffer's bit depth.
    pub fn map_planes<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[Sample]) -> Vec<Sample>,
    {
        let channels = self
            .to_normalized()
            .iter()
            .map(|plane| {
                let processed = f(plane);
                debug_assert_eq!(processed.len(), plane.len());
                processed
                    .iter()
                    .map(|&s| self.bit_depth.quantize(s))
                    .collect()
            })
            .collect();

        Self {
            channels,
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
        }
    }

    /// Same format, different planar content. Used by stages that build
    /// equal-length planes from this buffer.
    pub fn with_normalized(&self, planes: Vec<Vec<Sample>>) -> CoreResult<Self> {
        Self::from_normalized(planes, self.sample_rate, self.bit_depth)
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[i32] {
        &self.channels[index]
    }

    #[inline]
    pub fn channels(&self) -> &[Vec<i32>] {
        &self.channels
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.frame_to_ms(self.frames())
    }

    /// Convert milliseconds to the nearest frame index (negative clamps to 0)
    pub fn ms_to_frame(&self, ms: f64) -> usize {
        (ms.max(0.0) * self.sample_rate as f64 / 1000.0).round() as usize
    }

    /// Convert a frame index to milliseconds
    pub fn frame_to_ms(&self, frame: usize) -> f64 {
        frame as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Peak magnitude, normalized to full scale
    pub fn peak(&self) -> f64 {
        self.channels
            .iter()
            .flat_map(|data| data.iter())
            .map(|&s| (s as i64).unsigned_abs())
            .max()
            .map(|p| p as f64 / self.bit_depth.full_scale())
            .unwrap_or(0.0)
    }

    /// Peak level in dBFS (-inf for silence)
    pub fn peak_dbfs(&self) -> f64 {
        linear_to_db(self.peak())
    }

    /// Uniform gain in dB, clipped to the representable range
    pub fn apply_gain_db(&self, gain_db: f64) -> Self {
        let gain = db_to_linear(gain_db);
        self.map_planes(|plane| plane.iter().map(|s| s * gain).collect())
    }

    /// Slice by frame range (clamped to the buffer)
    pub fn slice_frames(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.frames());
        let start = start.min(end);
        Self {
            channels: self
                .channels
                .iter()
                .map(|data| data[start..end].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
        }
    }

    /// Concatenate frame ranges (each clamped to the buffer) into a new buffer
    pub fn gather_frames(&self, ranges: &[Range<usize>]) -> Self {
        let frames = self.frames();
        let channels = self
            .channels
            .iter()
            .map(|data| {
                ranges
                    .iter()
                    .flat_map(|r| {
                        let end = r.end.min(frames);
                        &data[r.start.min(end)..end]
                    })
                    .copied()
                    .collect()
            })
            .collect();

        Self {
            channels,
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
        }
    }

    /// Slice by millisecond range (clamped to the buffer)
    pub fn slice_ms(&self, start_ms: f64, end_ms: f64) -> Self {
        self.slice_frames(self.ms_to_frame(start_ms), self.ms_to_frame(end_ms))
    }

    /// Fold to mono by averaging channels
    pub fn to_mono(&self) -> Self {
        if self.channels.len() == 1 {
            return self.clone();
        }

        let count = self.channels.len() as f64;
        let mono = (0..self.frames())
            .map(|i| {
                let sum: i64 = self.channels.iter().map(|data| data[i] as i64).sum();
                (sum as f64 / count).round() as i32
            })
            .collect();

        Self {
            channels: vec![mono],
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
        }
    }

    /// Upmix mono to stereo by duplication (stereo is returned unchanged)
    pub fn to_stereo(&self) -> Self {
        if self.channels.len() == 2 {
            return self.clone();
        }

        Self {
            channels: vec![self.channels[0].clone(), self.channels[0].clone()],
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
        }
    }

    /// Split into one mono buffer per channel
    pub fn split_to_mono(&self) -> Vec<Self> {
        self.channels
            .iter()
            .map(|data| Self {
                channels: vec![data.clone()],
                sample_rate: self.sample_rate,
                bit_depth: self.bit_depth,
            })
            .collect()
    }

    /// Combine mono buffers into one multi-channel buffer
    pub fn from_mono_channels(monos: &[Self]) -> CoreResult<Self> {
        let first = monos.first().ok_or(CoreError::UnsupportedChannels(0))?;
        let mut channels = Vec::with_capacity(monos.len());
        for mono in monos {
            if mono.channel_count() != 1 {
                return Err(CoreError::UnsupportedChannels(mono.channel_count()));
            }
            if mono.sample_rate != first.sample_rate {
                return Err(CoreError::InvalidSampleRate(mono.sample_rate));
            }
            channels.push(mono.channels[0].clone());
        }
        Self::new(channels, first.sample_rate, first.bit_depth)
    }

    /// Polarity inversion (clipped, so the most negative value maps to max)
    pub fn invert_phase(&self) -> Self {
        let depth = self.bit_depth;
        Self {
            channels: self
                .channels
                .iter()
                .map(|data| data.iter().map(|&s| depth.clip(-(s as i64))).collect())
                .collect(),
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
        }
    }

    /// Sum `other` onto this buffer from frame 0, clipping. The result keeps
    /// this buffer's length; a mono `other` is spread across all channels.
    pub fn overlay(&self, other: &Self) -> Self {
        let depth = self.bit_depth;
        let scale = depth.full_scale() / other.bit_depth.full_scale();
        let channels = self
            .channels
            .iter()
            .enumerate()
            .map(|(ch, data)| {
                let source = &other.channels[ch.min(other.channels.len() - 1)];
                data.iter()
                    .enumerate()
                    .map(|(i, &s)| match source.get(i) {
                        Some(&o) => depth.clip(s as i64 + (o as f64 * scale).round() as i64),
                        None => s,
                    })
                    .collect()
            })
            .collect();

        Self {
            channels,
            sample_rate: self.sample_rate,
            bit_depth: self.bit_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(left: Vec<i32>, right: Vec<i32>) -> AudioBuffer {
        AudioBuffer::new(vec![left, right], 44100, BitDepth::Bits16).unwrap()
    }

    #[test]
    fn test_rejects_mismatched_channels() {
        let err = AudioBuffer::new(vec![vec![0; 4], vec![0; 3]], 44100, BitDepth::Bits16);
        assert!(matches!(
            err,
            Err(CoreError::ChannelLengthMismatch { channel: 1, .. })
        ));
        assert!(AudioBuffer::new(vec![], 44100, BitDepth::Bits16).is_err());
        assert!(AudioBuffer::new(vec![vec![0; 4]], 0, BitDepth::Bits16).is_err());
    }

    #[test]
    fn test_mono_to_stereo_and_back() {
        let mono = AudioBuffer::new(vec![vec![100, -200, 300]], 44100, BitDepth::Bits16).unwrap();
        let st = mono.to_stereo();
        assert_eq!(st.channel_count(), 2);
        assert_eq!(st.channel(1), &[100, -200, 300]);

        let folded = stereo(vec![100, 100], vec![300, -100]).to_mono();
        assert_eq!(folded.channel(0), &[200, 0]);
    }

    #[test]
    fn test_peak_dbfs() {
        let buffer = stereo(vec![16384, 0], vec![-8192, 0]);
        assert!((buffer.peak() - 0.5).abs() < 1e-9);
        assert!((buffer.peak_dbfs() + 6.0206).abs() < 1e-3);

        let silent = AudioBuffer::silent(2, 10, 44100, BitDepth::Bits16).unwrap();
        assert_eq!(silent.peak_dbfs(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_slice_ms_clamps() {
        let buffer = AudioBuffer::silent(1, 1000, 1000, BitDepth::Bits16).unwrap();
        assert_eq!(buffer.slice_ms(100.0, 250.0).frames(), 150);
        assert_eq!(buffer.slice_ms(900.0, 5000.0).frames(), 100);
        assert_eq!(buffer.slice_ms(2000.0, 3000.0).frames(), 0);
    }

    #[test]
    fn test_gather_frames() {
        let buffer = AudioBuffer::new(vec![(0..10).collect()], 1000, BitDepth::Bits16).unwrap();
        let gathered = buffer.gather_frames(&[0..2, 5..7, 9..20]);
        assert_eq!(gathered.channel(0), &[0, 1, 5, 6, 9]);
    }

    #[test]
    fn test_invert_and_overlay_cancel() {
        let buffer = stereo(vec![1000, -32768, 5], vec![-7, 32767, 0]);
        let inverted = buffer.invert_phase();
        assert_eq!(inverted.channel(0)[1], 32767);

        let sum = buffer.overlay(&inverted);
        assert_eq!(sum.channel(0), &[0, -1, 0]);
        assert_eq!(sum.channel(1), &[0, 0, 0]);
    }

    #[test]
    fn test_overlay_clips_and_keeps_length() {
        let base = stereo(vec![30000, 10, 10], vec![-30000, 10, 10]);
        let short = stereo(vec![10000], vec![-10000]);
        let sum = base.overlay(&short);
        assert_eq!(sum.frames(), 3);
        assert_eq!(sum.channel(0), &[32767, 10, 10]);
        assert_eq!(sum.channel(1), &[-32768, 10, 10]);
    }

    #[test]
    fn test_normalized_round_trip() {
        let buffer = stereo(vec![1, -2, 32767], vec![-32768, 0, 12345]);
        let planes = buffer.to_normalized();
        let rebuilt = buffer.with_normalized(planes).unwrap();
        assert_eq!(rebuilt, buffer);
    }

    #[test]
    fn test_gain_clips() {
        let buffer = stereo(vec![20000], vec![-20000]);
        let louder = buffer.apply_gain_db(12.0);
        assert_eq!(louder.channel(0), &[32767]);
        assert_eq!(louder.channel(1), &[-32768]);
    }

    #[test]
    fn test_split_and_recombine() {
        let buffer = stereo(vec![1, 2], vec![3, 4]);
        let monos = buffer.split_to_mono();
        assert_eq!(monos.len(), 2);
        let rebuilt = AudioBuffer::from_mono_channels(&monos).unwrap();
        assert_eq!(rebuilt, buffer);
    }
}
