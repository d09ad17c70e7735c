use crate::context::OperationFamily;
use thiserror::Error;

/// Errors related to the operation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// An operation of the same family is already in flight.
    #[error("a {0} operation is already in progress")]
    Busy(OperationFamily),
}
