use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionHandle;

/// Why a single render cycle produced no audio.
///
/// Returned by value from the realtime path, so it must stay `Copy` and never
/// carry heap data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RenderFailure {
    #[error("generator produced no block")]
    GeneratorUnavailable,
    #[error("generator block holds {actual} samples, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("session handle is stale")]
    StaleSession,
    #[error("destination buffers do not match the render quantum")]
    PreconditionViolation,
}

impl RenderFailure {
    /// Short stable tag, used when events are logged off the audio thread.
    pub fn kind(self) -> &'static str {
        match self {
            Self::GeneratorUnavailable => "generator-unavailable",
            Self::SizeMismatch { .. } => "size-mismatch",
            Self::StaleSession => "stale-session",
            Self::PreconditionViolation => "precondition-violation",
        }
    }
}

/// Outcome of one render cycle.
pub type RenderResult = Result<(), RenderFailure>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session registry is full ({capacity} slots)")]
    RegistryFull { capacity: usize },
    #[error("session {0} is not live")]
    Stale(SessionHandle),
}
