// Backend abstraction over the audio engine
// The player only talks to these traits; the cpal implementation lives in output.rs

use std::sync::Arc;
use std::time::Duration;

use crate::error::AudioError;

/// Decoded audio ready for playback. Cloning is cheap; the sample data
/// is shared.
#[derive(Debug, Clone)]
pub struct AudioData {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    /// Interleaved f32 samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub(crate) fn samples_shared(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Execution state of a processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    /// Paused by the platform (power saving, playback policy)
    Suspended,
}

/// Entry point into an audio engine. Held by the player so contexts can be
/// created lazily and recreated after cleanup.
pub trait AudioBackend {
    fn create_context(&self) -> Result<Box<dyn PlaybackContext>, AudioError>;
}

/// An engine execution context that owns the output path.
///
/// Sources created by a context play through that context's gain stage,
/// which is permanently connected to the output.
pub trait PlaybackContext {
    /// Handle to the context's volume stage. The handle stays valid for the
    /// lifetime of the context.
    fn create_gain(&mut self) -> Result<Box<dyn GainControl>, AudioError>;

    /// Decode raw resource bytes into playable audio data.
    fn decode(&self, bytes: Vec<u8>) -> Result<AudioData, AudioError>;

    /// Create a one-shot source bound to the given audio data.
    fn new_source(
        &mut self,
        data: AudioData,
        looping: bool,
    ) -> Result<Box<dyn SourceNode>, AudioError>;

    fn state(&self) -> ContextState;

    /// Resume a suspended context. No-op when already running.
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Release engine resources. The context is unusable afterwards.
    fn close(&mut self);
}

/// Volume control in linear gain, 0.0 to 1.0.
pub trait GainControl {
    fn gain(&self) -> f32;
    fn set_gain(&mut self, gain: f32);
}

/// A single-use playable source.
///
/// A source is started at most once. After it is stopped or runs to
/// natural completion it is discarded, never restarted.
pub trait SourceNode {
    /// Start playback immediately. `on_ended` is invoked exactly once when
    /// a non-looping source runs to natural completion; it is not invoked
    /// on stop. Starting a second time returns an error.
    fn start(&mut self, on_ended: Box<dyn FnOnce() + Send>) -> Result<(), AudioError>;

    /// Stop playback and detach from the output. Idempotent.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_data_frames_and_duration() {
        let data = AudioData::new(vec![0.0; 88200], 44100, 2);
        assert_eq!(data.frames(), 44100);
        assert_eq!(data.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_audio_data_clone_shares_samples() {
        let data = AudioData::new(vec![0.5; 1024], 48000, 1);
        let clone = data.clone();
        assert!(std::ptr::eq(data.samples().as_ptr(), clone.samples().as_ptr()));
    }
}
