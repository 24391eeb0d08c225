//! Native preview output through `rodio`.
//!
//! Each voice is its own [`Sink`] fed with a [`SamplesBuffer`] skipped to
//! the start offset, so stopping a voice drops its sink and a new start
//! never overlaps the old one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

use super::backend::{PlaybackBackend, VoiceHandle};
use crate::dsp::buffer::AudioBuffer;
use crate::error::PlaybackError;

pub struct RodioBackend {
    #[allow(dead_code)]
    stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sinks: HashMap<VoiceHandle, Sink>,
    next_voice: u64,
}

impl RodioBackend {
    /// Open the default output device.
    pub fn new() -> Result<Self, PlaybackError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Refused(e.to_string()))?;
        info!("opened default audio output");
        Ok(RodioBackend {
            stream,
            stream_handle,
            sinks: HashMap::new(),
            next_voice: 0,
        })
    }
}

impl PlaybackBackend for RodioBackend {
    fn start(
        &mut self,
        buffer: &Arc<AudioBuffer>,
        offset_seconds: f64,
        rate: f64,
    ) -> Result<VoiceHandle, PlaybackError> {
        let channels = u16::try_from(buffer.channel_count())
            .map_err(|_| PlaybackError::Refused("too many channels".to_string()))?;
        if channels == 0 {
            return Err(PlaybackError::Refused("buffer has no channels".to_string()));
        }

        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| PlaybackError::Refused(e.to_string()))?;
        let source = SamplesBuffer::new(channels, buffer.sample_rate, buffer.to_interleaved())
            .skip_duration(Duration::from_secs_f64(offset_seconds.max(0.0)));
        sink.set_speed(rate as f32);
        sink.append(source);
        sink.play();

        self.next_voice += 1;
        let voice = VoiceHandle(self.next_voice);
        self.sinks.insert(voice, sink);
        Ok(voice)
    }

    fn set_rate(&mut self, voice: VoiceHandle, rate: f64) {
        if let Some(sink) = self.sinks.get(&voice) {
            sink.set_speed(rate as f32);
        }
    }

    fn stop(&mut self, voice: VoiceHandle) {
        if let Some(sink) = self.sinks.remove(&voice) {
            sink.stop();
        }
    }
}
