//! Error types for ReelPay payout operations

use crate::types::{EditorId, ProjectId};
use thiserror::Error;

/// Result type alias for payout operations
pub type Result<T> = std::result::Result<T, PayoutError>;

/// Errors that can occur while computing or settling payouts.
///
/// Missing configuration is not an error: calculators fall back to
/// documented defaults instead. Lifecycle outcomes (project not completed,
/// already unlocked) are typed results of the orchestrator, not errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayoutError {
    // === Input validation ===
    /// Structurally invalid numeric input rejected at the calculator boundary
    #[error("Invalid input: {field} = {value}")]
    InvalidInput { field: &'static str, value: f64 },

    // === Configuration ===
    /// Rate card or band table that cannot be built
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Lookups ===
    /// Project not found in the store
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// Payout record expected but absent
    #[error("Payout record not found for project {project} editor {editor}")]
    RecordNotFound { project: ProjectId, editor: EditorId },

    // === Collaborators ===
    /// Store read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Notification dispatch failure (never fails a settlement)
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PayoutError {
    /// Get the error code for API responses
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidInput { .. } => 2001,
            Self::InvalidConfig(_) => 2002,
            Self::ProjectNotFound(_) => 2101,
            Self::RecordNotFound { .. } => 2102,
            Self::Storage(_) => 2201,
            Self::Notification(_) => 2202,
            Self::Serialization(_) => 2203,
        }
    }

    /// Check if retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Notification(_))
    }

    /// Reject negative or non-finite values for a named input
    pub fn check_non_negative(field: &'static str, value: f64) -> Result<f64> {
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(Self::InvalidInput { field, value })
        }
    }
}
