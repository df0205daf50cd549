// Sample rate conversion using rubato
// One-shot whole-buffer resampling; decoded audio is short enough to
// convert in a single pass before playback.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AudioError;

/// Resample interleaved samples from one rate to another.
///
/// Returns the input untouched when the rates already match.
pub fn resample(
    samples: &[f32],
    channels: u16,
    from_rate: u32,
    to_rate: u32,
) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let channels = channels.max(1) as usize;
    let frames = samples.len() / channels;
    if frames == 0 {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, frames, channels)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    // Deinterleave into per-channel buffers
    let mut input: Vec<Vec<f32>> = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            input[ch].push(sample);
        }
    }

    let output = resampler
        .process(&input, None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let out_frames = output.first().map(|ch| ch.len()).unwrap_or(0);
    let mut interleaved = Vec::with_capacity(out_frames * channels);
    for frame in 0..out_frames {
        for ch in &output {
            interleaved.push(ch[frame]);
        }
    }

    Ok(interleaved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_passes_through() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        let out = resample(&samples, 2, 44100, 44100).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_empty_input() {
        let out = resample(&[], 2, 44100, 48000).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_downsample_halves_length() {
        let samples: Vec<f32> = (0..44100)
            .map(|i| (i as f32 * 0.01).sin() * 0.5)
            .collect();

        let out = resample(&samples, 1, 44100, 22050).unwrap();

        let expected = samples.len() as f64 * 0.5;
        let tolerance = expected * 0.05 + 64.0;
        assert!(
            (out.len() as f64 - expected).abs() < tolerance,
            "got {} frames, expected about {}",
            out.len(),
            expected
        );
    }

    #[test]
    fn test_upsample_keeps_channel_alignment() {
        let samples = vec![0.25f32; 2000];
        let out = resample(&samples, 2, 22050, 44100).unwrap();

        assert!(!out.is_empty());
        assert_eq!(out.len() % 2, 0);
    }
}
