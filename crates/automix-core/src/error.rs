//! Engine error types

use thiserror::Error;

/// Errors surfaced by the engine's fallible entry points
#[derive(Error, Debug)]
pub enum EngineError {
    /// Null/empty inputs or out-of-range values
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Track id absent from the track source
    #[error("track not found: {0}")]
    TrackNotFound(i64),

    /// The external decoder failed to produce audio
    #[error("decode failed: {0}")]
    DecodeFailed(String),

    /// The external analyzer failed to produce features
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    /// Playback operation could not proceed
    #[error("playback error: {0}")]
    Playback(String),

    /// Engine used before initialization or after teardown
    #[error("engine not initialized: {0}")]
    NotInitialized(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
