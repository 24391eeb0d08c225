use thiserror::Error;

/// Umbrella error for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum VocalMixError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Mix error: {0}")]
    Mix(#[from] MixError),
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0} track is not available")]
    TrackUnavailable(&'static str),
    #[error("nothing has been mixed yet")]
    NothingToExport,
}

/// The input blob could not be turned into an [`AudioBuffer`](crate::dsp::buffer::AudioBuffer).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("input is empty")]
    Empty,
    #[error("unsupported audio container")]
    UnsupportedFormat,
    #[error("malformed {format} data: {message}")]
    Malformed { format: &'static str, message: String },
    #[error("unsupported {format} layout: {message}")]
    UnsupportedLayout { format: &'static str, message: String },
}

/// A buffer handed to the mixer or encoder is structurally broken.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidBufferError {
    #[error("buffer has no channels")]
    NoChannels,
    #[error("buffer sample rate is zero")]
    ZeroSampleRate,
    #[error("channel {channel} has {len} frames, expected {expected}")]
    RaggedChannels {
        channel: usize,
        len: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MixError {
    #[error("invalid {role} buffer: {source}")]
    InvalidBuffer {
        role: &'static str,
        #[source]
        source: InvalidBufferError,
    },
    #[error("mix worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("cannot encode invalid buffer: {0}")]
    InvalidBuffer(#[from] InvalidBufferError),
    #[error("data chunk of {bytes} bytes does not fit a WAV header")]
    TooLarge { bytes: u64 },
}

/// Playback failures. The transport state is left untouched when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("audio backend refused to start playback: {0}")]
    Refused(String),
    #[error("playback rate must be finite and positive, got {0}")]
    InvalidRate(f64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umbrella_wraps_component_errors() {
        let err: VocalMixError = DecodeError::UnsupportedFormat.into();
        assert_eq!(err.to_string(), "Decode error: unsupported audio container");

        let err: VocalMixError = PlaybackError::InvalidRate(0.0).into();
        assert!(matches!(err, VocalMixError::Playback(_)));
    }

    #[test]
    fn mix_error_names_the_offending_track() {
        let err = MixError::InvalidBuffer {
            role: "vocal",
            source: InvalidBufferError::NoChannels,
        };
        assert_eq!(err.to_string(), "invalid vocal buffer: buffer has no channels");
    }
}
