//! Error-related types.

use thiserror::Error;

/// A validation error.
///
/// Returned when a value fails construction, e.g., a header name with a byte
/// outside the atom set, or a mutation of a read-only header set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{kind}")]
pub struct ValidationError {
    kind: ValidationErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ValidationErrorKind {
    #[error("value is empty")]
    Empty,
    #[error("value is not well formed")]
    Invalid,
    #[error("byte 0x{byte:02x} not allowed at offset {at}")]
    InvalidByteAt { byte: u8, at: usize },
    #[error("value is read-only")]
    ReadOnly,
}

impl ValidationError {
    pub(crate) fn new(kind: ValidationErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &ValidationErrorKind {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let error = ValidationError::new(ValidationErrorKind::InvalidByteAt { byte: 0x3a, at: 4 });
        assert_eq!("byte 0x3a not allowed at offset 4", error.to_string());

        let error = ValidationError::new(ValidationErrorKind::ReadOnly);
        assert_eq!("value is read-only", error.to_string());
        assert_eq!(&ValidationErrorKind::ReadOnly, error.kind());
    }
}
