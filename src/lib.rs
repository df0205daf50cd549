// Soundcue - single-sound playback controller
// Module declarations
pub mod audio;
pub mod config;
pub mod error;
pub mod fetch;

pub use audio::backend::{
    AudioBackend, AudioData, ContextState, GainControl, PlaybackContext, SourceNode,
};
pub use audio::output::CpalBackend;
pub use audio::player::{PlayOutcome, SoundPlayer};
pub use config::OutputConfig;
pub use error::AudioError;
pub use fetch::{ByteFetcher, FileFetcher, HttpFetcher};
