//! Decoder — turns an opaque audio blob into an [`AudioBuffer`].
//!
//! Container detection and decoding both go through symphonia's default
//! registries, so callers never say which format they hold. WAV, MP3,
//! OGG/Vorbis, FLAC and the rest of symphonia's `all` set are accepted.

use std::io::{Cursor, ErrorKind};

use log::{info, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecType, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::AudioBuffer;
use crate::error::DecodeError;

/// Short codec name as registered with symphonia, e.g. `"vorbis"`.
pub fn codec_name(codec: CodecType) -> &'static str {
    symphonia::default::get_codecs()
        .get_codec(codec)
        .map(|descriptor| descriptor.short_name)
        .unwrap_or("audio")
}

/// Map a symphonia failure onto the decode taxonomy. `format` labels the
/// stream the failure came from.
fn decode_error(format: &'static str, e: SymphoniaError) -> DecodeError {
    match e {
        SymphoniaError::Unsupported(what) => DecodeError::UnsupportedLayout {
            format,
            message: what.to_string(),
        },
        other => DecodeError::Malformed {
            format,
            message: other.to_string(),
        },
    }
}

/// Decode a blob at its native sample rate.
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let source = MediaSourceStream::new(
        Box::new(Cursor::new(bytes.to_vec())),
        Default::default(),
    );
    // No container matched, or the blob ran out before one could be read.
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| match e {
            SymphoniaError::Unsupported(_) => DecodeError::UnsupportedFormat,
            SymphoniaError::IoError(ref io) if io.kind() == ErrorKind::UnexpectedEof => {
                DecodeError::UnsupportedFormat
            }
            other => decode_error("container", other),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Malformed {
            format: "container",
            message: "no audio track".to_string(),
        })?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let codec = codec_name(params.codec);

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| decode_error(codec, e))?;

    let mut layout = params.channels.map(|c| c.count()).zip(params.sample_rate);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                return Err(DecodeError::UnsupportedLayout {
                    format: codec,
                    message: "stream parameters change mid-stream".to_string(),
                });
            }
            Err(e) => return Err(decode_error(codec, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                warn!("skipping corrupt {codec} packet: {msg}");
                continue;
            }
            Err(e) => return Err(decode_error(codec, e)),
        };
        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }

        let spec = *decoded.spec();
        let packet_layout = (spec.channels.count(), spec.rate);
        match layout {
            Some(current) if current != packet_layout && !samples.is_empty() => {
                return Err(DecodeError::UnsupportedLayout {
                    format: codec,
                    message: format!(
                        "stream changes from {} ch @ {} Hz to {} ch @ {} Hz",
                        current.0, current.1, packet_layout.0, packet_layout.1
                    ),
                });
            }
            _ => layout = Some(packet_layout),
        }

        let mut block = SampleBuffer::<f32>::new(frames as u64, spec);
        block.copy_interleaved_ref(decoded);
        samples.extend_from_slice(block.samples());
    }

    let Some((channels, sample_rate)) = layout else {
        return Err(DecodeError::UnsupportedLayout {
            format: codec,
            message: "stream does not declare its channels and sample rate".to_string(),
        });
    };
    if channels == 0 || sample_rate == 0 {
        return Err(DecodeError::UnsupportedLayout {
            format: codec,
            message: format!("{channels} ch @ {sample_rate} Hz"),
        });
    }

    let buffer = AudioBuffer::from_interleaved(&samples, channels, sample_rate);
    info!(
        "decoded {codec}: {} frames, {} ch @ {} Hz",
        buffer.frame_count(),
        buffer.channel_count(),
        buffer.sample_rate
    );
    Ok(buffer)
}
