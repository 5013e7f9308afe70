//! Sample-format conversion helpers.
//!
//! Everything downstream of capture works on mono f32 samples in [-1, 1]
//! at the target rate; these helpers convert device-native buffers into
//! that shape and produce the 16-bit PCM the recognizer boundary expects.

/// Mix interleaved multi-channel audio to mono by averaging channels.
pub fn downmix_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampling between arbitrary rates.
///
/// Adequate for speech; anything fancier (windowed sinc) is wasted on a
/// 16kHz recognition target.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as f32
            }
        })
        .collect()
}

/// Peak-normalize a buffer in place to `target_peak`.
///
/// Buffers whose peak is at or below `silence_floor` are left untouched so
/// ambient noise is not boosted to full scale.
pub fn peak_normalize(samples: &mut [f32], target_peak: f32, silence_floor: f32) {
    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak <= silence_floor {
        return;
    }

    let gain = target_peak / peak;
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}

/// Root-mean-square level of a sample buffer, 0.0 for an empty one.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Convert normalized f32 samples to 16-bit PCM for the recognizer wire.
pub fn to_i16_pcm(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}
