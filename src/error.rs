//! Error types for the check-in engine.

/// Top-level error type for campaigns, storage, and scheduling.
#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    /// A private channel to a participant could not be opened.
    #[error("participant {participant} unreachable: {reason}")]
    Unreachable {
        /// Participant identifier.
        participant: String,
        /// Transport-supplied reason.
        reason: String,
    },

    /// No reply arrived within a prompt's window.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The whole run is meaningless (roster or report channel unusable).
    #[error("batch failure: {0}")]
    BatchFailure(String),

    /// The response store could not be read or written.
    #[error("response store unavailable: {0}")]
    StoreUnavailable(String),

    /// The response store exists but its contents are malformed.
    #[error("response store corrupt: {0}")]
    CorruptStore(String),

    /// A participant or answer index does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A calendar rule can never fire.
    #[error("invalid schedule rule: {0}")]
    InvalidRule(String),

    /// Configuration rejected at startup.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Messaging transport error that is not participant-specific.
    #[error("messaging error: {0}")]
    Messaging(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckinError {
    /// Returns `true` for failures the batch retry controller should retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BatchFailure(_) | Self::Messaging(_))
    }

    /// Returns `true` when the response store itself is broken. Such
    /// failures end the whole run, not just one participant.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::CorruptStore(_) | Self::Io(_))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CheckinError>;
