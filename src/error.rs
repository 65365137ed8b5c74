//! Error types for the playback engine

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio subsystem errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No output device: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamOpen(String),

    #[error("Failed to start stream: {0}")]
    StreamStart(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Failed to allocate sample storage for {samples} samples")]
    Allocation { samples: usize },

    #[error("Ring buffer capacity must be at least 2, got {0}")]
    InvalidCapacity(usize),
}

/// Sample source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No samples received before end of stream")]
    Empty,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
