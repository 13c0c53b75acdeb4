//! Error types for the terrain triangulator.

use std::fmt;

/// Main error type for triangulator operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TerraError {
    /// The input contains fewer than three non-collinear points.
    AllPointsAligned,
    /// A point to insert already exists at the same xy position.
    DuplicatePoint {
        /// x coordinate of the rejected point.
        x: f64,
        /// y coordinate of the rejected point.
        y: f64,
    },
    /// A constraint segment was rejected.
    ConstraintRejected {
        /// Human-readable reason (crosses another constraint, contains a
        /// vertex, references a nonexistent vertex, zero-area).
        reason: String,
    },
    /// A mesh-store or traversal invariant was violated.
    InvariantViolation(String),
    /// The point locator could not terminate.
    LocateDidNotTerminate,
    /// A construction option was out of range or mutually inconsistent.
    InvalidParameters(String),
    /// Failure to read or write a triangulation file.
    Io(String),
}

impl fmt::Display for TerraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllPointsAligned => write!(f, "all points are aligned"),
            Self::DuplicatePoint { x, y } => {
                write!(f, "duplicate point at ({x}, {y}), skipping")
            }
            Self::ConstraintRejected { reason } => write!(f, "constraint rejected: {reason}"),
            Self::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
            Self::LocateDidNotTerminate => {
                write!(f, "point location did not terminate within nTrg steps")
            }
            Self::InvalidParameters(msg) => write!(f, "invalid parameters: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for TerraError {}

impl From<crate::index::dlist::DListError> for TerraError {
    fn from(e: crate::index::dlist::DListError) -> Self {
        Self::InvariantViolation(e.to_string())
    }
}

impl From<std::io::Error> for TerraError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type for triangulator operations.
pub type TerraResult<T> = Result<T, TerraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(TerraError::AllPointsAligned.to_string(), "all points are aligned");
        assert_eq!(
            TerraError::DuplicatePoint { x: 1.0, y: 2.0 }.to_string(),
            "duplicate point at (1, 2), skipping"
        );
    }
}
