use super::{EnvelopeError, ReadError};
use thiserror::Error;

/// Errors verifying a signature against an account.
///
/// Validation failures are not errors, they are reported as a
/// [`ValidationOutcome`](crate::verify::ValidationOutcome).
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    /// The signature could not be decoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The RPC request failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// The ECDSA signer could not be recovered from the payload.
    #[error("could not recover signer: {0}")]
    Recovery(String),
}

impl From<ReadError> for VerifyError {
    fn from(err: ReadError) -> Self {
        Self::Transport(err.to_string())
    }
}
