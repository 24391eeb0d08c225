//! WAV encoder — serializes an [`AudioBuffer`] as 16-bit PCM WAV bytes.

use super::buffer::AudioBuffer;
use crate::error::EncodeError;

/// Size of the canonical RIFF/WAVE header written by [`encode_wav`].
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;

/// Encode a buffer to a WAV file as bytes (16-bit PCM, interleaved).
///
/// Output is byte-for-byte deterministic for a given buffer. Zero-length
/// buffers produce a bare 44-byte header.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, EncodeError> {
    buffer.validate()?;

    let channels = buffer.channel_count();
    let frames = buffer.frame_count();
    let data_bytes = frames as u64 * channels as u64 * (BITS_PER_SAMPLE as u64 / 8);
    // RIFF size counts everything after the first 8 bytes.
    if data_bytes + (WAV_HEADER_LEN as u64 - 8) > u32::MAX as u64 || channels > u16::MAX as usize {
        return Err(EncodeError::TooLarge { bytes: data_bytes });
    }

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + data_bytes as usize);
    write_header(&mut buf, channels as u16, buffer.sample_rate, data_bytes as u32);

    for i in 0..frames {
        for channel in &buffer.channels {
            buf.extend_from_slice(&quantize(channel[i]).to_le_bytes());
        }
    }

    Ok(buf)
}

/// Encode interleaved f32 samples directly.
pub fn encode_interleaved_wav(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
) -> Result<Vec<u8>, EncodeError> {
    encode_wav(&AudioBuffer::from_interleaved(samples, channels, sample_rate))
}

/// Clamp to [-1, 1] and scale asymmetrically so both extremes land exactly
/// on the i16 range. The cast truncates toward zero.
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

fn write_header(buf: &mut Vec<u8>, channels: u16, sample_rate: u32, data_size: u32) {
    let byte_rate = sample_rate.wrapping_mul(channels as u32 * (BITS_PER_SAMPLE as u32 / 8));
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let file_size = 36 + data_size;

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
}
