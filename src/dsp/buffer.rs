//! Decoded audio buffers.
//!
//! Per-channel f32 sample arrays at a fixed sample rate. Buffers are never
//! mutated once built; share them as `Arc<AudioBuffer>`.

use crate::error::InvalidBufferError;

/// Planar PCM audio: one `Vec<f32>` per channel, index-aligned across
/// channels. Amplitude is nominally in [-1.0, 1.0] but not clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Samples per second.
    pub sample_rate: u32,
    /// One sample array per channel; all the same length.
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        AudioBuffer {
            sample_rate,
            channels,
        }
    }

    /// A buffer of `frame_count` zeroed frames on `channel_count` channels.
    pub fn silent(sample_rate: u32, channel_count: usize, frame_count: usize) -> Self {
        AudioBuffer {
            sample_rate,
            channels: vec![vec![0.0; frame_count]; channel_count],
        }
    }

    /// Mono buffer from f32 samples.
    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        AudioBuffer {
            sample_rate,
            channels: vec![samples],
        }
    }

    /// Split interleaved samples (`L R L R ...`) into planar channels.
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        if channel_count == 0 {
            return AudioBuffer::new(sample_rate, Vec::new());
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        AudioBuffer::new(sample_rate, channels)
    }

    /// Interleave channels frame by frame (`L R L R ...`).
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frame_count();
        let mut out = Vec::with_capacity(frames * self.channel_count());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel.get(i).copied().unwrap_or(0.0));
            }
        }
        out
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Check the structural invariants: at least one channel, a positive
    /// sample rate, and every channel exactly `frame_count` long.
    pub fn validate(&self) -> Result<(), InvalidBufferError> {
        if self.channels.is_empty() {
            return Err(InvalidBufferError::NoChannels);
        }
        if self.sample_rate == 0 {
            return Err(InvalidBufferError::ZeroSampleRate);
        }
        let expected = self.frame_count();
        for (channel, data) in self.channels.iter().enumerate() {
            if data.len() != expected {
                return Err(InvalidBufferError::RaggedChannels {
                    channel,
                    len: data.len(),
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Read a channel at a fractional frame position with linear
    /// interpolation. Out-of-range positions read as silence.
    pub fn read_interpolated(&self, channel: usize, position: f64) -> f32 {
        let Some(data) = self.channels.get(channel) else {
            return 0.0;
        };
        if data.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= data.len() - 1 {
            return if idx < data.len() { data[idx] } else { 0.0 };
        }

        let frac = position - idx as f64;
        (data[idx] as f64 * (1.0 - frac) + data[idx + 1] as f64 * frac) as f32
    }

    /// Convert to another sample rate by linear interpolation. Returns an
    /// unchanged clone when the rates already match.
    pub fn resampled(&self, target_rate: u32) -> AudioBuffer {
        if target_rate == self.sample_rate || self.sample_rate == 0 || target_rate == 0 {
            return self.clone();
        }

        let step = self.sample_rate as f64 / target_rate as f64;
        let frames = (self.frame_count() as f64 / step).round() as usize;
        let channels = (0..self.channel_count())
            .map(|c| {
                (0..frames)
                    .map(|i| self.read_interpolated(c, i as f64 * step))
                    .collect::<Vec<f32>>()
            })
            .collect();

        AudioBuffer::new(target_rate, channels)
    }
}
