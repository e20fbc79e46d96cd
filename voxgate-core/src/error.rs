use thiserror::Error;

/// All errors produced by voxgate-core.
///
/// Per-tick processing never fails; every variant here is raised while
/// building configuration, opening a source or changing engine state.
#[derive(Debug, Error)]
pub enum VoxgateError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("WAV decode error: {0}")]
    Wav(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VoxgateError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        VoxgateError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, VoxgateError>;
