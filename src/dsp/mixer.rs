//! Mixer — combines a vocal and an instrumental under mood/energy control.
//!
//! Energy trades vocal level against instrumental level. A negative mood
//! adds a feedback echo on the summed output. Nothing is clipped here;
//! the WAV encoder clamps on export.

use serde::{Deserialize, Serialize};

use super::buffer::AudioBuffer;
use crate::error::MixError;

/// Delay of the mood echo, in samples. Fixed regardless of sample rate.
pub const ECHO_DELAY_SAMPLES: usize = 5000;

/// The output is always stereo.
pub const OUTPUT_CHANNELS: usize = 2;

/// The two-axis creative control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MixParameters {
    /// Sad (-1.0) to happy (+1.0).
    pub mood: f64,
    /// Calm (-1.0) to energetic (+1.0).
    pub energy: f64,
}

impl MixParameters {
    pub fn new(mood: f64, energy: f64) -> Self {
        MixParameters { mood, energy }
    }

    pub fn vocal_gain(&self) -> f64 {
        vocal_gain(self.energy)
    }

    pub fn instrumental_gain(&self) -> f64 {
        instrumental_gain(self.energy)
    }

    /// Feedback amount of the echo, or `None` when mood disables it.
    pub fn echo_feedback(&self) -> Option<f64> {
        (self.mood < 0.0).then(|| self.mood.abs() * 0.2)
    }
}

pub fn vocal_gain(energy: f64) -> f64 {
    0.8 + energy * 0.1
}

pub fn instrumental_gain(energy: f64) -> f64 {
    0.7 - energy * 0.1
}

/// Mix `vocal` and `instrumental` into a stereo buffer at `sample_rate`.
///
/// Both inputs are assumed to already be at `sample_rate`; no resampling
/// happens here. The output is as long as the longer input, and a shorter
/// input reads as silence past its end. Mono inputs feed both output
/// channels.
pub fn mix(
    vocal: &AudioBuffer,
    instrumental: &AudioBuffer,
    params: &MixParameters,
    sample_rate: u32,
) -> Result<AudioBuffer, MixError> {
    vocal.validate().map_err(|source| MixError::InvalidBuffer {
        role: "vocal",
        source,
    })?;
    instrumental
        .validate()
        .map_err(|source| MixError::InvalidBuffer {
            role: "instrumental",
            source,
        })?;

    let frames = vocal.frame_count().max(instrumental.frame_count());
    let vocal_gain = params.vocal_gain();
    let instrumental_gain = params.instrumental_gain();
    let feedback = params.echo_feedback();

    let mut output = AudioBuffer::silent(sample_rate, OUTPUT_CHANNELS, frames);
    for (c, out) in output.channels.iter_mut().enumerate() {
        let v = source_channel(vocal, c);
        let inst = source_channel(instrumental, c);

        // Each step rounds through f32, matching a Float32 output array
        // accumulated with f64 arithmetic.
        for i in 0..frames {
            let mut sample = 0.0f32;
            if let Some(&s) = v.get(i) {
                sample = (sample as f64 + s as f64 * vocal_gain) as f32;
            }
            if let Some(&s) = inst.get(i) {
                sample = (sample as f64 + s as f64 * instrumental_gain) as f32;
            }
            if let Some(feedback) = feedback {
                if i > ECHO_DELAY_SAMPLES {
                    let echo = out[i - ECHO_DELAY_SAMPLES] as f64 * feedback;
                    sample = (sample as f64 + echo) as f32;
                }
            }
            out[i] = sample;
        }
    }

    Ok(output)
}

/// Source channel feeding output channel `c`: channel 0 is reused for
/// every output channel beyond the input's count.
fn source_channel(buffer: &AudioBuffer, c: usize) -> &[f32] {
    let index = c.min(buffer.channel_count() - 1);
    &buffer.channels[index]
}
