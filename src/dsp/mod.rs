//! DSP — pure Rust decode, mix, and encode.
//!
//! Everything here is a deterministic function of its inputs, so the same
//! code serves browser previews (via WASM) and native export.

pub mod buffer;
pub mod decoder;
pub mod encoder;
pub mod mixer;
