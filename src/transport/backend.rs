//! Playback backends — the single-shot scheduled sources the transport
//! drives.
//!
//! A started voice plays one buffer from an offset at a rate. It cannot be
//! seeked or restarted; the transport stops it and starts a fresh one
//! instead.

use std::sync::Arc;

use serde::Serialize;

use crate::dsp::buffer::AudioBuffer;
use crate::error::PlaybackError;

/// Identifies one started voice on a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VoiceHandle(pub u64);

pub trait PlaybackBackend {
    /// Schedule `buffer` to play from `offset_seconds` at `rate`.
    fn start(
        &mut self,
        buffer: &Arc<AudioBuffer>,
        offset_seconds: f64,
        rate: f64,
    ) -> Result<VoiceHandle, PlaybackError>;

    /// Change the rate of a live voice without restarting it.
    fn set_rate(&mut self, voice: VoiceHandle, rate: f64);

    /// Stop and dispose of a voice. Stopping an unknown voice is a no-op.
    fn stop(&mut self, voice: VoiceHandle);
}

/// A command recorded by [`CommandQueue`] for the host to carry out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BackendCommand {
    Start {
        voice: VoiceHandle,
        offset: f64,
        rate: f64,
    },
    SetRate {
        voice: VoiceHandle,
        rate: f64,
    },
    Stop {
        voice: VoiceHandle,
    },
}

/// Backend that performs nothing itself and queues commands for a host
/// audio API (e.g. a browser `AudioBufferSourceNode`) to execute.
#[derive(Debug, Default)]
pub struct CommandQueue {
    next_voice: u64,
    live: Option<VoiceHandle>,
    commands: Vec<BackendCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Voice that was started and not yet stopped, if any.
    pub fn live_voice(&self) -> Option<VoiceHandle> {
        self.live
    }

    /// Take every command recorded since the last drain.
    pub fn drain(&mut self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn pending(&self) -> &[BackendCommand] {
        &self.commands
    }
}

impl PlaybackBackend for CommandQueue {
    fn start(
        &mut self,
        _buffer: &Arc<AudioBuffer>,
        offset_seconds: f64,
        rate: f64,
    ) -> Result<VoiceHandle, PlaybackError> {
        self.next_voice += 1;
        let voice = VoiceHandle(self.next_voice);
        self.live = Some(voice);
        self.commands.push(BackendCommand::Start {
            voice,
            offset: offset_seconds,
            rate,
        });
        Ok(voice)
    }

    fn set_rate(&mut self, voice: VoiceHandle, rate: f64) {
        self.commands.push(BackendCommand::SetRate { voice, rate });
    }

    fn stop(&mut self, voice: VoiceHandle) {
        if self.live == Some(voice) {
            self.live = None;
        }
        self.commands.push(BackendCommand::Stop { voice });
    }
}
