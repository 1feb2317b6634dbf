/// Why a race could not produce an [`Outcome`].
///
/// Source failures are never reported here: they are part of the
/// [`Outcome`]. A `RaceError` means the race was misconfigured or was torn
/// down from the outside.
///
/// [`Outcome`]: crate::outcome::Outcome
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RaceError {
    /// The race was started without any source.
    #[error("cannot race an empty set of sources")]
    NoSources,
    /// The race was started with a zero timeout.
    #[error("timeout must be greater than zero")]
    InvalidTimeout,
    /// The race was started outside of a tokio runtime.
    #[error("races must be started from within a tokio runtime")]
    NoRuntime,
    /// An enclosing scope was cancelled before the race resolved.
    #[error("race aborted")]
    Aborted,
}

impl RaceError {
    /// Returns `true` for errors caused by invalid input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, RaceError::NoSources | RaceError::InvalidTimeout)
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            RaceError::NoSources | RaceError::InvalidTimeout | RaceError::NoRuntime => 2,
            RaceError::Aborted => 130,
        }
    }
}
