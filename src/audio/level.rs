//! Scalar signal level of a PCM chunk.

/// Mean absolute amplitude of 16-bit samples, in raw `i16` units
/// (`0.0` – `32768.0`).  An empty chunk has level `0.0`.
///
/// ```
/// use talk_to_push::audio::mean_abs_level;
///
/// assert_eq!(mean_abs_level(&[100, -300, 0, 200]), 150.0);
/// ```
pub fn mean_abs_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples
        .iter()
        .map(|&s| u64::from((s as i32).unsigned_abs()))
        .sum();
    (sum as f64 / samples.len() as f64) as f32
}

/// Average interleaved frames down to one channel.
pub fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_zero() {
        assert_eq!(mean_abs_level(&[0; 2205]), 0.0);
        assert_eq!(mean_abs_level(&[]), 0.0);
    }

    #[test]
    fn sign_does_not_matter() {
        assert_eq!(mean_abs_level(&[-700; 10]), 700.0);
        assert_eq!(mean_abs_level(&[700, -700]), 700.0);
    }

    #[test]
    fn full_scale_negative_does_not_overflow() {
        assert_eq!(mean_abs_level(&[i16::MIN, i16::MIN]), 32768.0);
    }

    #[test]
    fn downmix_averages_frames() {
        assert_eq!(downmix_to_mono(&[100, 300, -200, 0], 2), vec![200, -100]);
        assert_eq!(downmix_to_mono(&[1, 2, 3], 1), vec![1, 2, 3]);
    }
}
