use crate::types::ValidationType;
use thiserror::Error;

/// Errors related to signature envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The envelope is shorter than its 21-byte header.
    #[error("malformed envelope: expected at least 21 bytes, got {len}")]
    Malformed {
        /// Length of the rejected input.
        len: usize,
    },
    /// The envelope carries a validation type the caller cannot handle.
    #[error("unsupported validation type {0}")]
    UnsupportedType(ValidationType),
}
