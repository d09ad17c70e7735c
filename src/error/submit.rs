use super::ReadError;
use alloy::primitives::{Bytes, hex};
use thiserror::Error;

/// Errors submitting a user operation or waiting for its confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The paymaster refused to sponsor the operation, or its validation failed.
    #[error("paymaster rejected the user operation: {0}")]
    PaymasterRejected(String),
    /// The operation reverted during simulation or execution.
    #[error("user operation reverted{}: {message}", revert_suffix(.code))]
    RevertedOnChain {
        /// The revert data, when the message carried it.
        code: Option<Bytes>,
        /// The error message.
        message: String,
    },
    /// The bundler or paymaster could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
    /// The receipt did not show up within the polling budget.
    #[error("timed out waiting for user operation {0}")]
    ReceiptTimeout(String),
    /// An error message none of the known patterns matched.
    #[error("{0}")]
    Unknown(String),
}

/// Taxonomy member an error message maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitErrorKind {
    /// See [`SubmitError::PaymasterRejected`].
    PaymasterRejected,
    /// See [`SubmitError::RevertedOnChain`].
    RevertedOnChain,
    /// See [`SubmitError::Transport`].
    Transport,
}

/// Known error-message fragments, checked in order.
///
/// The bundler and paymaster only report free-form messages, so this is a best-effort heuristic.
/// It is not exhaustive; anything unmatched becomes [`SubmitError::Unknown`].
pub const SUBMIT_ERROR_PATTERNS: &[(&str, SubmitErrorKind)] = &[
    ("paymaster", SubmitErrorKind::PaymasterRejected),
    ("sponsor", SubmitErrorKind::PaymasterRejected),
    ("AA3", SubmitErrorKind::PaymasterRejected),
    ("InvalidValidator", SubmitErrorKind::RevertedOnChain),
    ("revert", SubmitErrorKind::RevertedOnChain),
    ("error sending request", SubmitErrorKind::Transport),
    ("connection", SubmitErrorKind::Transport),
    ("timed out", SubmitErrorKind::Transport),
    ("timeout", SubmitErrorKind::Transport),
];

impl SubmitError {
    /// Classifies a free-form error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowercase = message.to_lowercase();

        let kind = SUBMIT_ERROR_PATTERNS.iter().find_map(|(pattern, kind)| {
            // `AA3x` codes are case sensitive, everything else is matched loosely
            let hit = if pattern.starts_with("AA") {
                message.contains(pattern)
            } else {
                lowercase.contains(&pattern.to_lowercase())
            };
            hit.then_some(*kind)
        });

        match kind {
            Some(SubmitErrorKind::PaymasterRejected) => Self::PaymasterRejected(message),
            Some(SubmitErrorKind::RevertedOnChain) => {
                Self::RevertedOnChain { code: revert_code(&message), message }
            }
            Some(SubmitErrorKind::Transport) => Self::Transport(message),
            None => Self::Unknown(message),
        }
    }

    /// Returns the taxonomy member, or `None` for [`SubmitError::Unknown`].
    pub const fn kind(&self) -> Option<SubmitErrorKind> {
        match self {
            Self::PaymasterRejected(_) => Some(SubmitErrorKind::PaymasterRejected),
            Self::RevertedOnChain { .. } => Some(SubmitErrorKind::RevertedOnChain),
            Self::Transport(_) | Self::ReceiptTimeout(_) => Some(SubmitErrorKind::Transport),
            Self::Unknown(_) => None,
        }
    }
}

impl From<alloy::transports::RpcError<alloy::transports::TransportErrorKind>> for SubmitError {
    fn from(err: alloy::transports::RpcError<alloy::transports::TransportErrorKind>) -> Self {
        if err.is_transport_error() {
            return Self::Transport(err.to_string());
        }
        Self::classify(err.to_string())
    }
}

impl From<ReadError> for SubmitError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Reverted { data, message } => Self::RevertedOnChain { code: data, message },
            ReadError::Transport(message) => Self::Transport(message),
        }
    }
}

fn revert_suffix(code: &Option<Bytes>) -> String {
    code.as_ref().map(|code| format!(" with {code}")).unwrap_or_default()
}

/// Extracts `0x…` revert data following `revert: ` in an error message.
fn revert_code(message: &str) -> Option<Bytes> {
    let (_, rest) = message.split_once("revert: 0x")?;
    let digits: String = rest.chars().take_while(char::is_ascii_hexdigit).collect();
    if digits.is_empty() {
        return None;
    }
    hex::decode(&digits).ok().map(Into::into)
}
