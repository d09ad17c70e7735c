//! ERC-4337 v0.7 user operations, in the JSON shape bundlers and paymasters speak.

use alloy::{
    eips::eip7702::SignedAuthorization,
    primitives::{Address, B256, Bytes, U256, keccak256},
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};

/// An unpacked v0.7 user operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The account.
    pub sender: Address,
    /// The EntryPoint nonce, key in the upper 192 bits.
    pub nonce: U256,
    /// Account factory, unused for EIP-7702 accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// Account factory calldata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    /// The call the EntryPoint makes on the account.
    pub call_data: Bytes,
    /// Gas for the execution phase.
    #[serde(with = "alloy::serde::quantity")]
    pub call_gas_limit: u64,
    /// Gas for the validation phase.
    #[serde(with = "alloy::serde::quantity")]
    pub verification_gas_limit: u64,
    /// Gas paid to the bundler on top of execution.
    #[serde(with = "alloy::serde::quantity")]
    pub pre_verification_gas: u64,
    /// Max fee per gas.
    #[serde(with = "alloy::serde::quantity")]
    pub max_fee_per_gas: u128,
    /// Max priority fee per gas.
    #[serde(with = "alloy::serde::quantity")]
    pub max_priority_fee_per_gas: u128,
    /// The sponsoring paymaster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Gas for the paymaster validation.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy::serde::quantity::opt")]
    pub paymaster_verification_gas_limit: Option<u64>,
    /// Gas for the paymaster post-op.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy::serde::quantity::opt")]
    pub paymaster_post_op_gas_limit: Option<u64>,
    /// Opaque paymaster data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    /// Kernel signature envelope, or the raw ECDSA signature for the root validator.
    pub signature: Bytes,
    /// EIP-7702 authorization the bundler includes when the sender is not delegated yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eip7702_auth: Option<SignedAuthorization>,
}

impl UserOperation {
    /// Creates an operation with zeroed gas fields.
    pub fn new(sender: Address, nonce: U256, call_data: Bytes) -> Self {
        Self { sender, nonce, call_data, ..Default::default() }
    }

    /// `factory || factoryData`, empty without a factory.
    pub fn init_code(&self) -> Bytes {
        match self.factory {
            Some(factory) => [
                factory.as_slice(),
                self.factory_data.as_ref().map_or(&[][..], |data| &data[..]),
            ]
            .concat()
            .into(),
            None => Bytes::new(),
        }
    }

    /// `verificationGasLimit || callGasLimit` as two packed uint128.
    pub fn account_gas_limits(&self) -> B256 {
        pack_u128(self.verification_gas_limit as u128, self.call_gas_limit as u128)
    }

    /// `maxPriorityFeePerGas || maxFeePerGas` as two packed uint128.
    pub fn gas_fees(&self) -> B256 {
        pack_u128(self.max_priority_fee_per_gas, self.max_fee_per_gas)
    }

    /// `paymaster || verificationGasLimit (16) || postOpGasLimit (16) || paymasterData`, empty
    /// without a paymaster.
    pub fn paymaster_and_data(&self) -> Bytes {
        let Some(paymaster) = self.paymaster else { return Bytes::new() };

        let mut buf = Vec::with_capacity(52 + self.paymaster_data.as_ref().map_or(0, |d| d.len()));
        buf.extend_from_slice(paymaster.as_slice());
        buf.extend_from_slice(
            &(self.paymaster_verification_gas_limit.unwrap_or_default() as u128).to_be_bytes(),
        );
        buf.extend_from_slice(
            &(self.paymaster_post_op_gas_limit.unwrap_or_default() as u128).to_be_bytes(),
        );
        buf.extend_from_slice(self.paymaster_data.as_ref().map_or(&[][..], |data| &data[..]));
        buf.into()
    }

    /// The hash the EntryPoint passes to the account for validation.
    pub fn hash(&self, entrypoint: Address, chain_id: u64) -> B256 {
        let packed = (
            self.sender,
            self.nonce,
            keccak256(self.init_code()),
            keccak256(&self.call_data),
            self.account_gas_limits(),
            U256::from(self.pre_verification_gas),
            self.gas_fees(),
            keccak256(self.paymaster_and_data()),
        )
            .abi_encode();

        keccak256((keccak256(packed), entrypoint, U256::from(chain_id)).abi_encode())
    }

    /// Applies a bundler gas estimate.
    pub fn apply_gas_estimate(&mut self, estimate: &GasEstimate) {
        self.call_gas_limit = estimate.call_gas_limit;
        self.verification_gas_limit = estimate.verification_gas_limit;
        self.pre_verification_gas = estimate.pre_verification_gas;
        if estimate.paymaster_verification_gas_limit.is_some() {
            self.paymaster_verification_gas_limit = estimate.paymaster_verification_gas_limit;
        }
        if estimate.paymaster_post_op_gas_limit.is_some() {
            self.paymaster_post_op_gas_limit = estimate.paymaster_post_op_gas_limit;
        }
    }

    /// Applies paymaster fields returned by `pm_getPaymasterStubData` or `pm_getPaymasterData`.
    pub fn apply_paymaster(&mut self, data: &PaymasterData) {
        self.paymaster = Some(data.paymaster);
        self.paymaster_data = Some(data.paymaster_data.clone());
        if data.paymaster_verification_gas_limit.is_some() {
            self.paymaster_verification_gas_limit = data.paymaster_verification_gas_limit;
        }
        if data.paymaster_post_op_gas_limit.is_some() {
            self.paymaster_post_op_gas_limit = data.paymaster_post_op_gas_limit;
        }
    }
}

fn pack_u128(high: u128, low: u128) -> B256 {
    let mut buf = [0u8; 32];
    buf[..16].copy_from_slice(&high.to_be_bytes());
    buf[16..].copy_from_slice(&low.to_be_bytes());
    B256::new(buf)
}

/// Response of `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Gas paid to the bundler on top of execution.
    #[serde(with = "alloy::serde::quantity")]
    pub pre_verification_gas: u64,
    /// Gas for the validation phase.
    #[serde(with = "alloy::serde::quantity")]
    pub verification_gas_limit: u64,
    /// Gas for the execution phase.
    #[serde(with = "alloy::serde::quantity")]
    pub call_gas_limit: u64,
    /// Gas for the paymaster validation.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy::serde::quantity::opt")]
    pub paymaster_verification_gas_limit: Option<u64>,
    /// Gas for the paymaster post-op.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy::serde::quantity::opt")]
    pub paymaster_post_op_gas_limit: Option<u64>,
}

/// ERC-7677 paymaster response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterData {
    /// The paymaster.
    pub paymaster: Address,
    /// Opaque paymaster data.
    pub paymaster_data: Bytes,
    /// Gas for the paymaster validation.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy::serde::quantity::opt")]
    pub paymaster_verification_gas_limit: Option<u64>,
    /// Gas for the paymaster post-op.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy::serde::quantity::opt")]
    pub paymaster_post_op_gas_limit: Option<u64>,
    /// Whether the stub data is already final and `pm_getPaymasterData` can be skipped.
    #[serde(default)]
    pub is_final: bool,
}

/// Response of `eth_getUserOperationReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    /// The user operation hash.
    pub user_op_hash: B256,
    /// The account.
    pub sender: Address,
    /// Whether the execution succeeded.
    pub success: bool,
    /// Revert reason of a failed execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The bundle transaction.
    pub receipt: BundleReceipt,
}

/// The part of the bundle transaction receipt we care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReceipt {
    /// Hash of the bundle transaction.
    pub transaction_hash: B256,
}
