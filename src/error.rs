// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for lattice setup, worker communication and checkpoints.
//!
//! Only structural failures are errors. Numeric trouble inside a trajectory
//! (action overflow, manifold drift) is absorbed where it happens and shows
//! up in the trajectory report and the log instead.

use thiserror::Error;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum BqmError {
    /// Run parameters rejected before any worker starts.
    #[error("invalid run parameter `{field}`: {reason}")]
    InputValidation {
        /// Parameter name as it appears in the run configuration.
        field: &'static str,
        /// Human-readable rejection reason.
        reason: String,
    },

    /// A halo exchange or collective could not complete.
    ///
    /// The distributed lattice is inconsistent after this; callers must abort.
    #[error("communication failure on worker {rank} (peer {peer}): {detail}")]
    CommunicationFailure {
        /// Worker that observed the failure.
        rank: usize,
        /// Worker it was talking to.
        peer: usize,
        /// What went wrong.
        detail: String,
    },

    /// Checked compression of a dense matrix that is not anti-Hermitian.
    #[error("matrix is not anti-Hermitian (deviation {deviation:.3e})")]
    NotAntiHermitian {
        /// Largest element of `M + M†`.
        deviation: f64,
    },

    /// Checkpoint contents do not match the run (dimensions, checksum).
    #[error("checkpoint rejected: {0}")]
    Checkpoint(String),

    /// Filesystem error reading configuration or checkpoints.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a configuration or checkpoint file.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BqmError {
    /// Shorthand for an [`BqmError::InputValidation`] error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InputValidation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether this failure came from the worker mesh.
    #[must_use]
    pub const fn is_communication(&self) -> bool {
        matches!(self, Self::CommunicationFailure { .. })
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BqmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_input_validation() {
        let err = BqmError::invalid("nt", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid run parameter `nt`: must be at least 1"
        );
    }

    #[test]
    fn display_communication_failure() {
        let err = BqmError::CommunicationFailure {
            rank: 2,
            peer: 3,
            detail: "channel disconnected".into(),
        };
        assert!(err.to_string().contains("worker 2"));
        assert!(err.to_string().contains("peer 3"));
        assert!(err.is_communication());
    }

    #[test]
    fn display_not_anti_hermitian() {
        let err = BqmError::NotAntiHermitian { deviation: 0.5 };
        assert!(err.to_string().contains("5.000e-1"));
        assert!(!err.is_communication());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: BqmError = io.into();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn error_trait_works() {
        let err = BqmError::Checkpoint("bad checksum".into());
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "checkpoint rejected: bad checksum");
    }
}
