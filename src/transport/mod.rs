//! Transport — the preview playback state machine.
//!
//! Wraps one bound [`AudioBuffer`] and drives a [`PlaybackBackend`] through
//! play/pause/seek/rate changes. Position is derived from a [`Clock`]
//! rather than polled from the backend:
//!
//! ```text
//! position = anchor_position + (now - anchor_wall_clock) * rate
//! ```
//!
//! Backend voices are single-shot, so resuming and seeking always stop the
//! live voice and start a new one. At most one voice is alive per
//! transport.

pub mod backend;
pub mod clock;
#[cfg(feature = "native-playback")]
pub mod rodio_backend;

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::dsp::buffer::AudioBuffer;
use crate::error::PlaybackError;

pub use backend::{BackendCommand, CommandQueue, PlaybackBackend, VoiceHandle};
pub use clock::{Clock, ManualClock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportStatus {
    Idle,
    Playing,
    Paused,
    /// Transient: reached the end of the buffer. The transport settles to
    /// `Idle` before the completion event is delivered.
    Completed,
}

/// Lifecycle notifications delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransportEvent {
    Started { run: u64, offset: f64 },
    Paused { run: u64, position: f64 },
    /// Delivered at most once per playback run.
    Completed { run: u64 },
}

pub type SubscriptionId = u64;

type Observer = Box<dyn FnMut(&TransportEvent)>;

pub struct Transport<B: PlaybackBackend> {
    backend: B,
    clock: Box<dyn Clock>,
    buffer: Option<Arc<AudioBuffer>>,
    status: TransportStatus,
    playback_rate: f64,
    /// Frozen position while not playing.
    position: f64,
    anchor_wall_clock: f64,
    anchor_position: f64,
    voice: Option<VoiceHandle>,
    /// Incremented each time playback starts from Idle or Paused.
    run: u64,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
}

impl<B: PlaybackBackend> Transport<B> {
    pub fn new(backend: B, clock: Box<dyn Clock>) -> Self {
        Self::with_config(backend, clock, &EngineConfig::default())
    }

    pub fn with_config(backend: B, clock: Box<dyn Clock>, config: &EngineConfig) -> Self {
        Transport {
            backend,
            clock,
            buffer: None,
            status: TransportStatus::Idle,
            playback_rate: config.default_playback_rate,
            position: 0.0,
            anchor_wall_clock: 0.0,
            anchor_position: 0.0,
            voice: None,
            run: 0,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn status(&self) -> TransportStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == TransportStatus::Playing
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    /// Duration of the bound buffer in seconds, 0 when nothing is bound.
    pub fn duration(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, |b| b.duration())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current position in seconds, always within `[0, duration]`.
    pub fn position_seconds(&self) -> f64 {
        if self.status != TransportStatus::Playing {
            return self.position;
        }
        let elapsed = self.clock.now() - self.anchor_wall_clock;
        (self.anchor_position + elapsed * self.playback_rate).clamp(0.0, self.duration())
    }

    /// Register an observer for lifecycle events.
    pub fn subscribe(&mut self, observer: impl FnMut(&TransportEvent) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = self.next_subscription;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    /// Bind a new buffer. Any playback in progress is stopped and the
    /// transport resets to `Idle` at position 0. The playback rate is kept.
    pub fn bind(&mut self, buffer: Arc<AudioBuffer>) {
        self.stop_voice();
        debug!(
            "transport: bind {:.3}s buffer ({} ch)",
            buffer.duration(),
            buffer.channel_count()
        );
        self.buffer = Some(buffer);
        self.reset_idle();
    }

    /// Drop the bound buffer, stopping any playback.
    pub fn unbind(&mut self) {
        self.stop_voice();
        self.buffer = None;
        self.reset_idle();
        debug!("transport: unbound");
    }

    /// Start or resume when stopped, pause when playing. A no-op when no
    /// buffer is bound.
    pub fn toggle_playback(&mut self) -> Result<(), PlaybackError> {
        if self.buffer.is_none() {
            return Ok(());
        }
        self.tick();
        match self.status {
            TransportStatus::Playing => {
                self.pause();
                Ok(())
            }
            TransportStatus::Idle | TransportStatus::Paused | TransportStatus::Completed => {
                self.play()
            }
        }
    }

    /// Change the playback rate. A live voice is retuned in place; the
    /// position stays continuous across the change. Any finite positive
    /// rate is accepted.
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<(), PlaybackError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlaybackError::InvalidRate(rate));
        }
        self.tick();
        if self.status == TransportStatus::Playing {
            let position = self.position_seconds();
            self.anchor_position = position;
            self.anchor_wall_clock = self.clock.now();
            if let Some(voice) = self.voice {
                self.backend.set_rate(voice, rate);
            }
        }
        debug!("transport: rate {} -> {}", self.playback_rate, rate);
        self.playback_rate = rate;
        Ok(())
    }

    /// Jump to `seconds`, clamped to `[0, duration]`. While playing, the
    /// live voice is replaced by one starting at the new position.
    ///
    /// If the backend refuses the replacement voice, the transport is left
    /// `Paused` at the new position and the refusal is returned.
    pub fn seek(&mut self, seconds: f64) -> Result<(), PlaybackError> {
        self.tick();
        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, self.duration())
        };
        debug!("transport: seek to {target:.3}s");

        if self.status != TransportStatus::Playing {
            self.position = target;
            return Ok(());
        }

        self.stop_voice();
        match self.start_voice(target) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.position = target;
                self.status = TransportStatus::Paused;
                Err(e)
            }
        }
    }

    /// Animation tick. Detects the end of media; returns `true` when this
    /// tick completed the run. Every control call runs it first, so a run
    /// that ended between ticks completes before the call acts.
    pub fn tick(&mut self) -> bool {
        if self.status == TransportStatus::Playing && self.position_seconds() >= self.duration() {
            self.complete();
            return true;
        }
        false
    }

    /// Backend report that `voice` played out. Reports for voices that were
    /// already replaced or stopped are ignored.
    pub fn notify_ended(&mut self, voice: VoiceHandle) {
        if self.status == TransportStatus::Playing && self.voice == Some(voice) {
            self.complete();
        }
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        let offset = self.position;
        // Idle/Paused never hold a voice, but never leak one either.
        self.stop_voice();
        self.start_voice(offset)?;
        self.run += 1;
        debug!("transport: playing run {} from {offset:.3}s", self.run);
        self.emit(TransportEvent::Started {
            run: self.run,
            offset,
        });
        Ok(())
    }

    fn pause(&mut self) {
        let position = self.position_seconds();
        self.stop_voice();
        self.position = position;
        self.status = TransportStatus::Paused;
        debug!("transport: paused at {position:.3}s");
        self.emit(TransportEvent::Paused {
            run: self.run,
            position,
        });
    }

    fn complete(&mut self) {
        self.stop_voice();
        self.status = TransportStatus::Completed;
        debug!("transport: run {} completed", self.run);
        self.reset_idle();
        self.emit(TransportEvent::Completed { run: self.run });
    }

    /// Start a voice at `offset` and anchor the clock to it. State is only
    /// touched once the backend accepts.
    fn start_voice(&mut self, offset: f64) -> Result<(), PlaybackError> {
        let Some(buffer) = self.buffer.as_ref() else {
            return Ok(());
        };
        let voice = self.backend.start(buffer, offset, self.playback_rate)?;
        self.voice = Some(voice);
        self.anchor_wall_clock = self.clock.now();
        self.anchor_position = offset;
        self.status = TransportStatus::Playing;
        Ok(())
    }

    fn stop_voice(&mut self) {
        if let Some(voice) = self.voice.take() {
            self.backend.stop(voice);
        }
    }

    fn reset_idle(&mut self) {
        self.status = TransportStatus::Idle;
        self.position = 0.0;
        self.anchor_position = 0.0;
    }

    fn emit(&mut self, event: TransportEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }
}

impl<B: PlaybackBackend> Drop for Transport<B> {
    fn drop(&mut self) {
        self.stop_voice();
    }
}
