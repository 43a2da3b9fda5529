//! Error taxonomy.
//!
//! Only two classes exist: configuration problems between the host and the
//! engine (fatal to the call, fixed by preparing again) and unreadable saved
//! state (recovered by falling back to default parameters).

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigurationError {
    #[error("sample rate must be finite and positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("at least one channel is required")]
    NoChannels,

    #[error("maximum block size must be non-zero")]
    InvalidBlockSize,

    #[error("engine has not been prepared")]
    NotPrepared,

    #[error("prepared for {expected} channels, got {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    #[error("channel {channel} has {actual} samples, expected {expected}")]
    RaggedBuffer {
        channel: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("saved state is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("saved state is not a key/value object")]
    NotAnObject,
}
