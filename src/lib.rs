pub mod bridge;
pub mod config;
pub mod context;
pub mod dsp;
pub mod error;
pub mod session;
pub mod transport;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::dsp::buffer::AudioBuffer;
use crate::dsp::mixer::MixParameters;
use crate::dsp::{decoder, encoder, mixer};
use crate::error::VocalMixError;

pub use crate::bridge::PreviewTransport;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Layout of a decoded blob, as reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferInfo {
    pub sample_rate: u32,
    pub channel_count: usize,
    pub frame_count: usize,
    pub duration: f64,
}

impl From<&AudioBuffer> for BufferInfo {
    fn from(buffer: &AudioBuffer) -> Self {
        BufferInfo {
            sample_rate: buffer.sample_rate,
            channel_count: buffer.channel_count(),
            frame_count: buffer.frame_count(),
            duration: buffer.duration(),
        }
    }
}

/// Decode two blobs, bring both to `sample_rate`, mix them, and encode the
/// result as a 16-bit WAV.
pub fn mix_blobs_to_wav(
    vocal: &[u8],
    instrumental: &[u8],
    params: &MixParameters,
    sample_rate: u32,
) -> Result<Vec<u8>, VocalMixError> {
    let vocal = decoder::decode(vocal)?.resampled(sample_rate);
    let instrumental = decoder::decode(instrumental)?.resampled(sample_rate);
    let mixed = mixer::mix(&vocal, &instrumental, params, sample_rate)?;
    Ok(encoder::encode_wav(&mixed)?)
}

/// WASM-exposed: return the vocalmix-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: mix a vocal and an instrumental blob into a WAV byte array.
#[wasm_bindgen]
pub fn mix_to_wav(
    vocal: &[u8],
    instrumental: &[u8],
    mood: f64,
    energy: f64,
    sample_rate: u32,
) -> Result<Vec<u8>, JsValue> {
    let params = MixParameters::new(mood, energy);
    mix_blobs_to_wav(vocal, instrumental, &params, sample_rate)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: decode a blob and report its layout.
#[wasm_bindgen]
pub fn decode_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let buffer = decoder::decode(bytes).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&BufferInfo::from(&buffer))
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: encode interleaved f32 samples (e.g. a recorded take) as a
/// 16-bit WAV byte array.
#[wasm_bindgen]
pub fn encode_samples_wav(
    samples: &[f32],
    channels: u32,
    sample_rate: u32,
) -> Result<Vec<u8>, JsValue> {
    encoder::encode_interleaved_wav(samples, channels as usize, sample_rate)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn full_pipeline_decode_mix_encode() {
        let vocal = encoder::encode_wav(&AudioBuffer::mono(22050, vec![0.5; 2205])).unwrap();
        let instrumental =
            encoder::encode_wav(&AudioBuffer::new(44100, vec![vec![0.25; 8820]; 2])).unwrap();

        let wav = mix_blobs_to_wav(&vocal, &instrumental, &MixParameters::new(-0.5, 0.2), 44100)
            .unwrap();
        let mixed = decoder::decode(&wav).unwrap();
        let info = BufferInfo::from(&mixed);

        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channel_count, 2);
        // The resampled vocal is 4410 frames; the instrumental is longer.
        assert_eq!(info.frame_count, 8820);
        assert!((info.duration - 0.2).abs() < 1e-9);

        // Not silence.
        assert!(mixed.channels[0].iter().any(|&s| s.abs() > 0.1));
    }

    #[test]
    fn pipeline_reports_decode_failure() {
        let instrumental = encoder::encode_wav(&AudioBuffer::mono(44100, vec![0.0; 8])).unwrap();
        let err = mix_blobs_to_wav(b"nope", &instrumental, &MixParameters::default(), 44100)
            .unwrap_err();
        assert!(matches!(err, VocalMixError::Decode(DecodeError::UnsupportedFormat)));
    }

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }
}
