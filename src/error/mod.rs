//! Kernel kit error types.
use thiserror::Error;

mod context;
pub use context::ContextError;

mod envelope;
pub use envelope::EnvelopeError;

mod install;
pub use install::InstallError;

mod read;
pub use read::ReadError;

mod submit;
pub use submit::{SubmitError, SubmitErrorKind};

mod swap;
pub use swap::SwapError;

mod verify;
pub use verify::VerifyError;

/// The overarching error type.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Errors related to signature envelopes.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// Errors reading account state.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// Errors verifying signatures.
    #[error(transparent)]
    Verify(#[from] VerifyError),
    /// Errors submitting user operations.
    #[error(transparent)]
    Submit(#[from] SubmitError),
    /// Errors installing validators.
    #[error(transparent)]
    Install(#[from] InstallError),
    /// Errors related to swaps.
    #[error(transparent)]
    Swap(#[from] SwapError),
    /// Errors related to the operation context.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// An error occurred while signing.
    #[error(transparent)]
    Signer(#[from] alloy::signers::Error),
    /// Typed data could not be hashed.
    #[error(transparent)]
    Eip712(#[from] alloy::dyn_abi::Error),
}
