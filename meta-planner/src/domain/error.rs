//! Domain error types.
//!
//! These errors represent validation failures in the domain layer.
//! They are distinct from backend and I/O errors.

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Stop code failed validation
    #[error("invalid stop code: {0}")]
    InvalidStopCode(&'static str),

    /// Coordinate outside WGS84 bounds
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(&'static str),

    /// Composed trip has no partial trips
    #[error("composed trip must have at least one partial trip")]
    EmptyTrip,
}
