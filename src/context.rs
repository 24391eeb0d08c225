//! Audio context — the one processing context shared by a session.
//!
//! Owns the session sample rate. Every decode and mix goes through it, so
//! all buffers reaching the mixer share one rate. Created and owned by
//! [`AudioSession`](crate::session::AudioSession) and passed explicitly to
//! whatever needs it.

use std::sync::Arc;

use log::info;

use crate::config::EngineConfig;
use crate::dsp::buffer::AudioBuffer;
use crate::dsp::{decoder, encoder, mixer};
use crate::dsp::mixer::MixParameters;
use crate::error::{ConfigError, DecodeError, EncodeError, MixError};

#[derive(Debug)]
pub struct AudioContext {
    config: EngineConfig,
}

impl AudioContext {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!("audio context created at {} Hz", config.sample_rate);
        Ok(AudioContext { config })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decode a blob and bring it to the context sample rate.
    pub async fn decode_audio_data(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
        let decoded = decoder::decode(bytes)?;
        if self.config.resample_on_decode && decoded.sample_rate != self.sample_rate() {
            info!(
                "resampling {} Hz -> {} Hz",
                decoded.sample_rate,
                self.sample_rate()
            );
            return Ok(decoded.resampled(self.sample_rate()));
        }
        Ok(decoded)
    }

    /// Mix at the context sample rate. With the `native` feature the work
    /// runs on a blocking worker thread.
    pub async fn mix(
        &self,
        vocal: Arc<AudioBuffer>,
        instrumental: Arc<AudioBuffer>,
        params: MixParameters,
    ) -> Result<AudioBuffer, MixError> {
        let sample_rate = self.sample_rate();

        #[cfg(feature = "native")]
        let mixed = tokio::task::spawn_blocking(move || {
            mixer::mix(&vocal, &instrumental, &params, sample_rate)
        })
        .await
        .map_err(|e| MixError::Worker(e.to_string()))??;

        #[cfg(not(feature = "native"))]
        let mixed = mixer::mix(&vocal, &instrumental, &params, sample_rate)?;

        info!(
            "mixed {} frames (mood {:.2}, energy {:.2})",
            mixed.frame_count(),
            params.mood,
            params.energy
        );
        Ok(mixed)
    }

    pub fn encode_wav(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, EncodeError> {
        encoder::encode_wav(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav(rate: u32, frames: usize) -> Vec<u8> {
        encoder::encode_wav(&AudioBuffer::silent(rate, 1, frames)).unwrap()
    }

    #[tokio::test]
    async fn decode_resamples_to_context_rate() {
        let ctx = AudioContext::new(EngineConfig::default()).unwrap();
        let buf = ctx.decode_audio_data(&wav(22050, 2205)).await.unwrap();
        assert_eq!(buf.sample_rate, 44100);
        assert_eq!(buf.frame_count(), 4410);
    }

    #[tokio::test]
    async fn decode_keeps_native_rate_when_disabled() {
        let config = EngineConfig {
            resample_on_decode: false,
            ..EngineConfig::default()
        };
        let ctx = AudioContext::new(config).unwrap();
        let buf = ctx.decode_audio_data(&wav(22050, 100)).await.unwrap();
        assert_eq!(buf.sample_rate, 22050);
    }

    #[tokio::test]
    async fn decode_failure_is_typed() {
        let ctx = AudioContext::new(EngineConfig::default()).unwrap();
        let err = ctx.decode_audio_data(b"garbage").await.unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedFormat);
    }

    #[tokio::test]
    async fn mix_runs_at_context_rate() {
        let ctx = AudioContext::new(EngineConfig {
            sample_rate: 48000,
            ..EngineConfig::default()
        })
        .unwrap();
        let vocal = Arc::new(AudioBuffer::mono(48000, vec![0.5; 10]));
        let inst = Arc::new(AudioBuffer::mono(48000, vec![0.5; 20]));
        let out = ctx.mix(vocal, inst, MixParameters::default()).await.unwrap();
        assert_eq!(out.sample_rate, 48000);
        assert_eq!(out.frame_count(), 20);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            sample_rate: 0,
            ..EngineConfig::default()
        };
        assert!(AudioContext::new(config).is_err());
    }
}
