use super::{ReadError, SubmitError};
use thiserror::Error;

/// Errors installing a validator or repairing the root validator.
#[derive(Debug, Clone, Error)]
pub enum InstallError {
    /// Reading the account state failed before anything was submitted.
    #[error("could not read validator state: {0}")]
    Read(#[from] ReadError),
    /// The install user operation failed.
    #[error("install failed: {0}")]
    Failed(#[from] SubmitError),
    /// The account is not delegated and cannot be repaired by this tool.
    #[error("account {0} has unexpected non-delegation code")]
    NotKernelAccount(alloy::primitives::Address),
}
