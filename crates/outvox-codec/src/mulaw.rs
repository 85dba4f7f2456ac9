//! μ-law companding, bit-exact with the carrier's codec.
//!
//! Encoding is the conventional logarithmic law: sign bit, 3-bit
//! exponent, 4-bit mantissa, bias of 0x84 (132) added before the
//! exponent search, output inverted. The decoder intentionally keeps
//! the bias in the reconstructed sample (see crate docs); tests pin
//! exact byte values so a well-meaning "fix" fails loudly.

/// Samples above this magnitude clip before encoding.
const CLIP: i32 = 32_635;

/// Bias added to the magnitude before the exponent search.
const BIAS: i32 = 0x84;

/// Encodes one 16-bit linear sample as an 8-bit μ-law sample.
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let sign: u8 = if sample < 0 { 0x80 } else { 0 };
    // Widen before negating: -(-32768) overflows i16.
    let mut magnitude = if sample < 0 {
        -(sample as i32)
    } else {
        sample as i32
    };
    if magnitude > CLIP {
        magnitude = CLIP;
    }
    magnitude += BIAS;

    // Exponent = position of the highest set bit in bits 14..7.
    // The bias guarantees bit 7 is always reachable.
    let mut exponent: u8 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && magnitude & mask == 0 {
        mask >>= 1;
        exponent -= 1;
    }

    let mantissa = ((magnitude >> (exponent + 3)) & 0x0F) as u8;
    (sign | (exponent << 4) | mantissa) ^ 0xFF
}

/// Decodes one 8-bit μ-law sample to a 16-bit linear sample.
///
/// The 0x84 bias is not removed; the maximum reconstructed magnitude
/// is 32 256 and the minimum is 132, matching the carrier's decoder.
pub fn ulaw_to_linear(encoded: u8) -> i16 {
    let inverted = encoded ^ 0xFF;
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = (inverted & 0x0F) as i32;
    let magnitude = (0x21 | (mantissa << 1)) << (exponent + 2);
    if inverted & 0x80 != 0 {
        -(magnitude as i16)
    } else {
        magnitude as i16
    }
}

/// Encodes a slice of linear samples.
pub fn encode_ulaw(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|&s| linear_to_ulaw(s)).collect()
}

/// Decodes a slice of μ-law samples.
pub fn decode_ulaw(encoded: &[u8]) -> Vec<i16> {
    encoded.iter().map(|&b| ulaw_to_linear(b)).collect()
}
