//! # Run Error Types
//!
//! All errors that can abort a coordinated run.

use thiserror::Error;

use crate::participant::Role;

/// Errors that can occur while configuring or executing a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// A participant count was zero or negative.
    ///
    /// This is a configuration error carrying the offending role and value;
    /// it renders with the same `invalid configuration:` prefix as
    /// [`RunError::InvalidConfiguration`]. Match both, or use
    /// [`RunError::is_configuration`], to catch every rejected setting.
    #[error("invalid configuration: {role} count must be a positive integer, got {value}")]
    InvalidParticipantCount {
        /// Which role the count belongs to.
        role: Role,
        /// The rejected value.
        value: i64,
    },

    /// Any other rejected setting (duration range, time unit, unknown policy).
    /// Participant counts use [`RunError::InvalidParticipantCount`].
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A synchronization primitive or participant thread could not be created.
    #[error("resource initialization failed: {what}: {reason}")]
    ResourceInitialization {
        /// The resource that failed.
        what: String,
        /// Underlying cause.
        reason: String,
    },

    /// A participant thread panicked. Its access was released on unwind.
    #[error("{role} {id} panicked during the run")]
    ParticipantPanicked {
        /// Role of the failed participant.
        role: Role,
        /// Id of the failed participant within its role.
        id: usize,
    },

    /// The recorded timeline shows a writer overlapping another participant.
    #[error("mutual exclusion violated: {0}")]
    ExclusionViolated(String),

    /// Settings file could not be read or parsed.
    #[error("settings error: {0}")]
    Settings(String),

    /// Summary report could not be written.
    #[error("report error: {0}")]
    Report(String),
}

impl RunError {
    /// Returns true for every configuration error, including rejected
    /// participant counts. These are raised before any participant exists.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidParticipantCount { .. } | Self::InvalidConfiguration(_)
        )
    }
}

/// Result type for run operations.
pub type RunResult<T> = Result<T, RunError>;
