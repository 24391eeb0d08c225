//! WASM-facing preview transport.
//!
//! The browser owns the real audio graph. It passes `performance.now()` into
//! every call, then drains the queued start/stop/rate commands and applies
//! them to its `AudioBufferSourceNode`s.

use std::sync::Arc;

use wasm_bindgen::prelude::*;

use crate::dsp::decoder;
use crate::error::VocalMixError;
use crate::transport::{Clock, CommandQueue, ManualClock, Transport, TransportStatus, VoiceHandle};

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

#[wasm_bindgen]
pub struct PreviewTransport {
    clock: ManualClock,
    transport: Transport<CommandQueue>,
}

impl PreviewTransport {
    fn sync_clock(&self, now_ms: f64) {
        self.clock.set(now_ms / 1000.0);
    }
}

impl Default for PreviewTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl PreviewTransport {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PreviewTransport {
        let clock = ManualClock::new();
        let transport = Transport::new(CommandQueue::new(), Box::new(clock.clone()));
        PreviewTransport { clock, transport }
    }

    /// Decode and bind a blob. Returns its duration in seconds.
    pub fn bind_audio(&mut self, bytes: &[u8], now_ms: f64) -> Result<f64, JsValue> {
        self.sync_clock(now_ms);
        let buffer = decoder::decode(bytes).map_err(|e| js_error(VocalMixError::from(e)))?;
        let duration = buffer.duration();
        self.transport.bind(Arc::new(buffer));
        Ok(duration)
    }

    pub fn unbind(&mut self, now_ms: f64) {
        self.sync_clock(now_ms);
        self.transport.unbind();
    }

    pub fn toggle(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.sync_clock(now_ms);
        self.transport.toggle_playback().map_err(js_error)
    }

    pub fn seek(&mut self, now_ms: f64, seconds: f64) -> Result<(), JsValue> {
        self.sync_clock(now_ms);
        self.transport.seek(seconds).map_err(js_error)
    }

    pub fn set_rate(&mut self, now_ms: f64, rate: f64) -> Result<(), JsValue> {
        self.sync_clock(now_ms);
        self.transport.set_playback_rate(rate).map_err(js_error)
    }

    /// Call once per animation frame. Returns `true` on the frame playback
    /// reached the end.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.sync_clock(now_ms);
        self.transport.tick()
    }

    /// Forward a source node's `ended` event.
    pub fn notify_ended(&mut self, now_ms: f64, voice: u32) {
        self.sync_clock(now_ms);
        self.transport.notify_ended(VoiceHandle(voice as u64));
    }

    pub fn position(&self, now_ms: f64) -> f64 {
        self.sync_clock(now_ms);
        self.transport.position_seconds()
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn status(&self) -> String {
        match self.transport.status() {
            TransportStatus::Idle => "idle",
            TransportStatus::Playing => "playing",
            TransportStatus::Paused => "paused",
            TransportStatus::Completed => "completed",
        }
        .to_string()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    /// Commands queued since the last drain, as plain JS objects.
    pub fn drain_commands(&mut self) -> Result<JsValue, JsValue> {
        let commands = self.transport.backend_mut().drain();
        serde_wasm_bindgen::to_value(&commands).map_err(js_error)
    }

    /// Host-side clock reading in seconds, as last fed in.
    pub fn clock_seconds(&self) -> f64 {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::buffer::AudioBuffer;
    use crate::dsp::encoder::encode_wav;
    use crate::transport::BackendCommand;

    fn two_second_wav() -> Vec<u8> {
        encode_wav(&AudioBuffer::silent(8000, 1, 16000)).unwrap()
    }

    #[test]
    fn host_timestamps_drive_position() {
        let mut preview = PreviewTransport::new();
        let duration = preview.bind_audio(&two_second_wav(), 1000.0).unwrap();
        assert!((duration - 2.0).abs() < 1e-9);

        preview.toggle(1000.0).unwrap();
        assert_eq!(preview.status(), "playing");
        assert!((preview.position(1500.0) - 0.5).abs() < 1e-9);
        assert!((preview.clock_seconds() - 1.5).abs() < 1e-9);

        assert!(!preview.tick(2500.0));
        assert!(preview.tick(3100.0));
        assert_eq!(preview.status(), "idle");
        assert_eq!(preview.position(3200.0), 0.0);
    }

    #[test]
    fn queued_commands_follow_transport() {
        let mut preview = PreviewTransport::new();
        preview.bind_audio(&two_second_wav(), 0.0).unwrap();
        preview.toggle(0.0).unwrap();
        preview.seek(250.0, 1.0).unwrap();

        let commands = preview.transport.backend_mut().drain();
        assert!(matches!(commands[0], BackendCommand::Start { offset, .. } if offset == 0.0));
        assert!(matches!(commands[1], BackendCommand::Stop { .. }));
        assert!(matches!(commands[2], BackendCommand::Start { offset, .. } if offset == 1.0));
    }
}
