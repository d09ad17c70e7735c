use alloy::{
    primitives::{Bytes, FixedBytes},
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

/// Errors reading on-chain account state.
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    /// The call reverted.
    #[error("call reverted: {message}")]
    Reverted {
        /// Revert data, if the node returned any.
        data: Option<Bytes>,
        /// The error message reported by the node.
        message: String,
    },
    /// The RPC request failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ReadError {
    /// Creates a revert error without revert data.
    pub fn reverted(message: impl Into<String>) -> Self {
        Self::Reverted { data: None, message: message.into() }
    }

    /// Returns the 4-byte error selector of the revert data, if any.
    pub fn revert_selector(&self) -> Option<FixedBytes<4>> {
        match self {
            Self::Reverted { data: Some(data), .. } if data.len() >= 4 => {
                Some(FixedBytes::from_slice(&data[..4]))
            }
            _ => None,
        }
    }

    /// Whether this error is a revert.
    pub const fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }
}

impl From<alloy::contract::Error> for ReadError {
    fn from(err: alloy::contract::Error) -> Self {
        if let Some(data) = err.as_revert_data() {
            return Self::Reverted { data: Some(data), message: err.to_string() };
        }

        match err {
            alloy::contract::Error::TransportError(err) => err.into(),
            // empty return data from a view call
            err @ alloy::contract::Error::ZeroData(..) => Self::reverted(err.to_string()),
            err => Self::Transport(err.to_string()),
        }
    }
}

impl From<RpcError<TransportErrorKind>> for ReadError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err.as_error_resp() {
            Some(payload) => {
                let message = payload.message.to_string();
                match payload.as_revert_data() {
                    Some(data) => Self::Reverted { data: Some(data), message },
                    None if message.contains("revert") => Self::reverted(message),
                    None => Self::Transport(err.to_string()),
                }
            }
            None => Self::Transport(err.to_string()),
        }
    }
}
