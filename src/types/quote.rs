//! Swap aggregator quote types.

use super::Call;
use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, Bytes, U256},
};
use serde::{Deserialize, Serialize};

/// A Permit2 swap quote.
///
/// Only the fields needed to sign and execute the swap are modelled, everything else the
/// aggregator returns is kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    /// Whether the aggregator found a route.
    #[serde(default = "default_true")]
    pub liquidity_available: bool,
    /// Permit2 data the taker signs, absent when the allowance flow is not needed.
    #[serde(default)]
    pub permit2: Option<Permit2Data>,
    /// The settlement transaction.
    #[serde(default)]
    pub transaction: Option<QuoteTransaction>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

const fn default_true() -> bool {
    true
}

/// Permit2 signing payload of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit2Data {
    /// The typed data to sign.
    pub eip712: TypedData,
}

/// The settlement transaction of a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTransaction {
    /// Settler contract.
    pub to: Address,
    /// Settlement calldata, without the Permit2 signature.
    pub data: Bytes,
    /// Gas estimate.
    #[serde(default, with = "crate::serde::string_or_number")]
    pub gas: Option<U256>,
    /// Native value to send.
    #[serde(default, with = "crate::serde::string_or_number")]
    pub value: Option<U256>,
}

impl QuoteTransaction {
    /// Appends the Permit2 signature the way the settler expects it:
    /// `data || uint256(len(signature)) || signature`.
    pub fn calldata_with_signature(&self, signature: &[u8]) -> Bytes {
        let mut data = Vec::with_capacity(self.data.len() + 32 + signature.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&U256::from(signature.len()).to_be_bytes::<32>());
        data.extend_from_slice(signature);
        data.into()
    }

    /// The call executing the swap with the given Permit2 signature.
    pub fn into_call(&self, signature: &[u8]) -> Call {
        Call::new(self.to, self.calldata_with_signature(signature))
            .with_value(self.value.unwrap_or_default())
    }
}
