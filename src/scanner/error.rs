use thiserror::Error;

/// Reasons a scanning session cannot start or change track.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("the media source exposes no video tracks")]
    NoTracks,
    #[error("track {index} does not exist ({available} available)")]
    TrackOutOfRange { index: usize, available: usize },
    #[error("a scanning session is already active")]
    AlreadyActive,
    #[error("no scanning session is active")]
    NotActive,
}
