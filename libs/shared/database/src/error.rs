use thiserror::Error;

/// Structural storage failures. Constraint hits are reported by constraint
/// name, never by backend-specific message text, so callers can match on
/// them regardless of the engine behind the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: &'static str },
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}
