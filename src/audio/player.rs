// Single-sound player
// Owns one logical sound: lazy context and buffer acquisition, one-shot
// source per play, volume control and teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::backend::{
    AudioBackend, AudioData, ContextState, GainControl, PlaybackContext, SourceNode,
};
use crate::audio::output::CpalBackend;
use crate::error::AudioError;
use crate::fetch::{self, ByteFetcher};

/// How a `play` call ended.
///
/// `play` never returns an error; failures are logged and reported through
/// this outcome and through `is_playing` staying false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new source was created and started.
    Started,
    /// Playback was skipped; the cause has been logged.
    Skipped,
    /// The player was constructed with preloading enabled but nothing has
    /// been loaded yet. Call `load_audio` first.
    PreloadRequired,
}

/// Playback controller for a single sound.
///
/// The processing context and the decoded buffer are acquired lazily and
/// cached; every `play` creates a fresh one-shot source, superseding any
/// source that is still running. `cleanup` tears everything down and
/// returns the player to its freshly-constructed state.
pub struct SoundPlayer {
    locator: String,
    preload: bool,
    backend: Box<dyn AudioBackend>,
    fetcher: Box<dyn ByteFetcher>,
    context: Option<Box<dyn PlaybackContext>>,
    buffer: Option<AudioData>,
    source: Option<Box<dyn SourceNode>>,
    gain: Option<Box<dyn GainControl>>,
    playing: Arc<AtomicBool>,
}

impl SoundPlayer {
    /// Create a player for the given resource locator using the default
    /// cpal backend. HTTP(S) locators are fetched over the network,
    /// anything else is read as a local file.
    ///
    /// With `preload` set, `load_audio` must be called before the first
    /// `play`; otherwise `play` loads lazily on demand.
    pub fn new(locator: impl Into<String>, preload: bool) -> Self {
        let locator = locator.into();
        let fetcher = fetch::for_locator(&locator);
        Self::with_backend(locator, preload, Box::new(CpalBackend::new()), fetcher)
    }

    /// Create a player on top of a custom backend and fetcher.
    pub fn with_backend(
        locator: impl Into<String>,
        preload: bool,
        backend: Box<dyn AudioBackend>,
        fetcher: Box<dyn ByteFetcher>,
    ) -> Self {
        Self {
            locator: locator.into(),
            preload,
            backend,
            fetcher,
            context: None,
            buffer: None,
            source: None,
            gain: None,
            playing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Whether a source is currently playing. Looping sources stay playing
    /// until stopped; non-looping sources clear this on natural completion.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Create the processing context and its gain stage on first use.
    fn ensure_context(&mut self) -> Result<(), AudioError> {
        if self.context.is_some() {
            return Ok(());
        }

        let mut context = self.backend.create_context()?;
        match context.create_gain() {
            Ok(gain) => {
                self.context = Some(context);
                self.gain = Some(gain);
                Ok(())
            }
            Err(err) => {
                context.close();
                Err(err)
            }
        }
    }

    /// Fetch and decode the resource, caching the result.
    ///
    /// Returns the cached buffer immediately when one exists. On failure
    /// the error is logged and `None` is returned; there is no retry.
    pub async fn load_audio(&mut self) -> Option<AudioData> {
        match self.try_load().await {
            Ok(data) => Some(data),
            Err(err) => {
                tracing::error!("error loading '{}': {}", self.locator, err);
                None
            }
        }
    }

    async fn try_load(&mut self) -> Result<AudioData, AudioError> {
        self.ensure_context()?;

        if let Some(data) = &self.buffer {
            return Ok(data.clone());
        }

        let bytes = self
            .fetcher
            .fetch(&self.locator)
            .await
            .map_err(|source| AudioError::Fetch {
                locator: self.locator.clone(),
                source,
            })?;

        let Some(context) = self.context.as_ref() else {
            return Err(AudioError::Output("no processing context".to_string()));
        };

        let data = context.decode(bytes)?;
        self.buffer = Some(data.clone());
        Ok(data)
    }

    /// Start playback, superseding any source that is still running.
    ///
    /// Never panics and never returns an error; see `PlayOutcome`.
    pub async fn play(&mut self, looping: bool) -> PlayOutcome {
        match self.try_play(looping).await {
            Ok(true) => PlayOutcome::Started,
            Ok(false) => PlayOutcome::Skipped,
            Err(err @ AudioError::PreloadRequired) => {
                tracing::error!("error playing '{}': {}", self.locator, err);
                PlayOutcome::PreloadRequired
            }
            Err(err) => {
                tracing::error!("error playing '{}': {}", self.locator, err);
                PlayOutcome::Skipped
            }
        }
    }

    async fn try_play(&mut self, looping: bool) -> Result<bool, AudioError> {
        self.ensure_context()?;

        if self.preload && self.buffer.is_none() {
            return Err(AudioError::PreloadRequired);
        }

        let data = if self.preload {
            self.buffer.clone()
        } else {
            self.load_audio().await
        };

        // Load failure was already logged
        let Some(data) = data else {
            return Ok(false);
        };
        if self.gain.is_none() {
            return Ok(false);
        }

        if self.is_playing() {
            self.stop_sound();
        }

        let Some(context) = self.context.as_mut() else {
            return Ok(false);
        };

        let mut source = context.new_source(data, looping)?;

        let playing = Arc::clone(&self.playing);
        // Flag goes up before start so a source that completes faster than
        // this call returns cannot leave it stuck at true.
        self.playing.store(true, Ordering::SeqCst);
        let started = source.start(Box::new(move || {
            if !looping {
                playing.store(false, Ordering::SeqCst);
            }
        }));
        if let Err(err) = started {
            self.playing.store(false, Ordering::SeqCst);
            return Err(err);
        }

        self.source = Some(source);
        Ok(true)
    }

    /// Stop and discard the active source. No-op when nothing is playing.
    pub fn stop_sound(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            self.playing.store(false, Ordering::SeqCst);
        }
    }

    /// Current volume as a percentage in [0, 100].
    ///
    /// Reports full volume before the first context acquisition.
    pub fn get_volume(&self) -> f32 {
        match &self.gain {
            Some(gain) => gain.gain() * 100.0,
            None => 100.0,
        }
    }

    /// Set the volume as a percentage; out-of-range values are clamped to
    /// [0, 100]. No-op before the first context acquisition.
    pub fn set_volume(&mut self, volume: f32) {
        if let Some(gain) = self.gain.as_mut() {
            let clamped = volume.clamp(0.0, 100.0);
            gain.set_gain(clamped / 100.0);
        }
    }

    /// Resume the processing context if the platform suspended it.
    pub async fn resume_context(&mut self) {
        if let Some(context) = self.context.as_mut() {
            if context.state() == ContextState::Suspended {
                if let Err(err) = context.resume() {
                    tracing::warn!("failed to resume context: {}", err);
                }
            }
        }
    }

    /// Release every acquired resource and reset to the initial state.
    ///
    /// The next operation re-acquires the context and buffer from scratch.
    pub fn cleanup(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
        self.gain = None;
        if let Some(mut context) = self.context.take() {
            context.close();
        }
        self.buffer = None;
        self.playing.store(false, Ordering::SeqCst);
    }
}

impl Drop for SoundPlayer {
    fn drop(&mut self) {
        self.cleanup();
    }
}
