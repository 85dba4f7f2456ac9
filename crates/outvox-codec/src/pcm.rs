//! Little-endian 16-bit PCM byte framing.

use crate::CodecError;

/// Splits a little-endian byte buffer into 16-bit samples.
///
/// Odd-length buffers are a decoding error, never truncated.
pub fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<i16>, CodecError> {
    if bytes.len() % 2 != 0 {
        return Err(CodecError::OddLengthBuffer(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Serializes 16-bit samples to little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_little_endian() {
        let samples = vec![0i16, 1, -1, 256, -256, i16::MAX, i16::MIN];
        let bytes = samples_to_bytes(&samples);
        assert_eq!(bytes_to_samples(&bytes).unwrap(), samples);
    }

    #[test]
    fn odd_length_is_an_error() {
        assert_eq!(
            bytes_to_samples(&[1, 2, 3]),
            Err(CodecError::OddLengthBuffer(3))
        );
    }

    #[test]
    fn empty_is_fine() {
        assert!(bytes_to_samples(&[]).unwrap().is_empty());
    }
}
