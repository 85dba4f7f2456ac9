//! Audio transcoding between the telephony leg and the AI voice leg.
//!
//! The carrier delivers 8 kHz μ-law; the AI session consumes 16 kHz
//! linear PCM and produces 24 kHz linear PCM. Everything in this crate
//! is a pure function over sample slices; no I/O, no allocation beyond
//! the output buffers.
//!
//! The companding and resampling here are bit-exact with the carrier
//! integration that preceded this service. Two deliberate fidelity
//! compromises are preserved rather than fixed, because changing them
//! changes audible behavior:
//!
//! - the μ-law decoder does not remove the 0x84 encoding bias
//!   (`decode(0xFF)` is 132, not 0), and
//! - 24→8 kHz downsampling is naive decimation with no anti-alias
//!   filter.
//!
//! Whether to upgrade either is a product decision, not a bug.

mod mulaw;
mod pcm;
mod resample;

pub use mulaw::{decode_ulaw, encode_ulaw, ulaw_to_linear, linear_to_ulaw};
pub use pcm::{bytes_to_samples, samples_to_bytes};
pub use resample::{downsample_24k_to_8k, upsample_8k_to_16k};

use thiserror::Error;

/// Errors raised while decoding audio payloads.
///
/// Malformed input fails loudly; frames are never silently truncated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A linear-PCM byte buffer had an odd length and cannot be split
    /// into 16-bit samples.
    #[error("PCM buffer length {0} is not a multiple of 2")]
    OddLengthBuffer(usize),
}

/// Full inbound pipeline: one μ-law 8 kHz telephony frame to the
/// 16 kHz little-endian linear PCM the AI session expects.
pub fn telephony_to_ai(ulaw: &[u8]) -> Vec<u8> {
    let pcm_8k = decode_ulaw(ulaw);
    let pcm_16k = upsample_8k_to_16k(&pcm_8k);
    samples_to_bytes(&pcm_16k)
}

/// Full outbound pipeline: one 24 kHz little-endian linear PCM frame
/// from the AI session to the μ-law 8 kHz payload the carrier expects.
///
/// Fails on odd-length input rather than dropping the trailing byte.
pub fn ai_to_telephony(pcm_24k: &[u8]) -> Result<Vec<u8>, CodecError> {
    let samples = bytes_to_samples(pcm_24k)?;
    let pcm_8k = downsample_24k_to_8k(&samples);
    Ok(encode_ulaw(&pcm_8k))
}
