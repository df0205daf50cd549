// Error types for the playback pipeline
use thiserror::Error;

/// Errors raised inside the playback pipeline.
///
/// These never escape the public `SoundPlayer` operations; they are logged
/// there and surface as a skipped outcome or an absent result.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("audio output failed: {0}")]
    Output(String),

    #[error("failed to fetch '{locator}': {source:#}")]
    Fetch {
        locator: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("failed to resample audio: {0}")]
    Resample(String),

    #[error("source node was already started")]
    SourceAlreadyStarted,

    #[error("audio not loaded; call load_audio before play when preloading is enabled")]
    PreloadRequired,
}
