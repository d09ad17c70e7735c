//! Calls executed by a Kernel account.

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A single call executed by the account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// The call target.
    pub to: Address,
    /// Amount of native value to send to the target.
    #[serde(default)]
    pub value: U256,
    /// The calldata bytes.
    #[serde(default)]
    pub data: Bytes,
}

impl Call {
    /// Creates a call without value.
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self { to, value: U256::ZERO, data: data.into() }
    }

    /// Sets the value.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}
