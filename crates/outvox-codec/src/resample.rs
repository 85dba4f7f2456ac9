//! Integer-ratio sample-rate conversion.
//!
//! Upsampling duplicates each sample (no interpolation); downsampling
//! keeps every third sample (no anti-alias filter). Both choices are
//! carrier-compatible shortcuts preserved deliberately — see crate docs.

/// 8 kHz → 16 kHz by duplicating every sample.
pub fn upsample_8k_to_16k(pcm_8k: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(pcm_8k.len() * 2);
    for &sample in pcm_8k {
        out.push(sample);
        out.push(sample);
    }
    out
}

/// 24 kHz → 8 kHz by keeping every third sample.
///
/// Trailing samples that do not fill a group of three are dropped.
pub fn downsample_24k_to_8k(pcm_24k: &[i16]) -> Vec<i16> {
    let out_len = pcm_24k.len() / 3;
    (0..out_len).map(|i| pcm_24k[i * 3]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsample_duplicates_in_order() {
        assert_eq!(upsample_8k_to_16k(&[1, -2, 3]), vec![1, 1, -2, -2, 3, 3]);
    }

    #[test]
    fn downsample_keeps_every_third() {
        assert_eq!(
            downsample_24k_to_8k(&[10, 11, 12, 20, 21, 22, 30, 31, 32]),
            vec![10, 20, 30]
        );
    }

    #[test]
    fn downsample_floors_partial_groups() {
        // 8 input samples -> floor(8 / 3) = 2 outputs, indices 0 and 3.
        assert_eq!(downsample_24k_to_8k(&[0, 1, 2, 3, 4, 5, 6, 7]), vec![0, 3]);
        assert!(downsample_24k_to_8k(&[]).is_empty());
    }

    #[test]
    fn empty_input_produces_empty_output() {
        assert!(upsample_8k_to_16k(&[]).is_empty());
    }
}
