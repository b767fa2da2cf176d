//! Error types

use thiserror::Error;

use crate::F;

/// Result type for localization operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while configuring or running the localizer
#[derive(Error, Debug)]
pub enum Error {
    /// Fewer than two microphones, nothing to correlate
    #[error("at least 2 microphones are required, got {0}")]
    TooFewMicrophones(usize),

    #[error("microphone {0} has a non finite position")]
    NonFiniteMicrophone(usize),

    /// Two microphones share a position, their baseline has no direction
    #[error("microphones {0} and {1} are at the same position")]
    CoincidentMicrophones(usize, usize),

    #[error("speed of sound must be positive, got {0}")]
    InvalidSpeedOfSound(F),

    #[error("invalid direction grid: {0}")]
    InvalidGrid(String),

    /// Any other configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("expected sample rate {expected}, got {actual}")]
    SampleRateMismatch { expected: F, actual: F },

    /// Block does not fill a single analysis window
    #[error("block of {samples} samples is shorter than the window of {window}")]
    BlockTooShort { samples: usize, window: usize },

    #[error("spectrum of shape {actual:?} does not match the {expected:?} grid")]
    SpectrumShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("FFT failed: {0}")]
    Fft(String),

    #[error("invalid PCM format: {0}")]
    PcmFormat(String),

    #[cfg(feature = "realtime")]
    #[error("capture failed: {0}")]
    Capture(#[from] alsa::Error),

    #[cfg(feature = "wav")]
    #[error("failed to read wav: {0}")]
    Wav(#[from] hound::Error),
}
