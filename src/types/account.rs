use super::{IEntryPoint, IKernel, ValidationId, ValidatorConfig};
use crate::error::ReadError;
use alloy::{
    eips::eip7702::constants::{EIP7702_CLEARED_DELEGATION, EIP7702_DELEGATION_DESIGNATOR},
    primitives::{Address, B256, Bytes, FixedBytes, U256, aliases::U192},
    providers::Provider,
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

/// What the code at an address says about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "implementation", rename_all = "camelCase")]
pub enum DelegationStatus {
    /// No code, a plain EOA.
    Eoa,
    /// An EIP-7702 delegated EOA pointing at the given implementation.
    Delegated(Address),
    /// A regular contract.
    Contract,
}

impl DelegationStatus {
    /// Classifies the code of an address.
    pub fn from_code(code: &[u8]) -> Self {
        if code.is_empty() || code == EIP7702_CLEARED_DELEGATION {
            return Self::Eoa;
        }
        match code.strip_prefix(&EIP7702_DELEGATION_DESIGNATOR[..]) {
            Some(implementation) if implementation.len() == 20 => {
                Self::Delegated(Address::from_slice(implementation))
            }
            _ => Self::Contract,
        }
    }

    /// Returns the delegation target, if delegated.
    pub const fn implementation(&self) -> Option<Address> {
        match self {
            Self::Delegated(implementation) => Some(*implementation),
            _ => None,
        }
    }
}

/// Read access to Kernel account state.
#[async_trait::async_trait]
pub trait AccountReader: Debug + Send + Sync {
    /// Returns the code at `account`.
    async fn code(&self, account: Address) -> Result<Bytes, ReadError>;

    /// Calls `isValidSignature(hash, signature)` on the account.
    async fn is_valid_signature(
        &self,
        account: Address,
        hash: B256,
        signature: Bytes,
    ) -> Result<FixedBytes<4>, ReadError>;

    /// Reads the configuration of a validation id.
    async fn validation_config(
        &self,
        account: Address,
        id: ValidationId,
    ) -> Result<ValidatorConfig, ReadError>;

    /// Reads the root validation id.
    async fn root_validator(&self, account: Address) -> Result<ValidationId, ReadError>;

    /// Reads the nonce the next installed validation gets.
    async fn current_nonce(&self, account: Address) -> Result<u32, ReadError>;

    /// Reads the lowest validation nonce still accepted.
    async fn valid_nonce_from(&self, account: Address) -> Result<u32, ReadError>;

    /// Reads the delegation status of `account`.
    async fn delegation_status(&self, account: Address) -> Result<DelegationStatus, ReadError> {
        Ok(DelegationStatus::from_code(&self.code(account).await?))
    }
}

/// [`AccountReader`] backed by an RPC provider.
#[derive(Debug, Clone)]
pub struct KernelReader<P> {
    provider: P,
}

impl<P: Provider> KernelReader<P> {
    /// Create a new instance of [`KernelReader`].
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns the underlying provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the next ERC-4337 nonce of the account for key `0`.
    pub async fn entrypoint_nonce(
        &self,
        entrypoint: Address,
        account: Address,
    ) -> Result<U256, ReadError> {
        Ok(IEntryPoint::new(entrypoint, &self.provider)
            .getNonce(account, U192::ZERO)
            .call()
            .await?)
    }
}

#[async_trait::async_trait]
impl<P: Provider + Debug> AccountReader for KernelReader<P> {
    async fn code(&self, account: Address) -> Result<Bytes, ReadError> {
        Ok(self.provider.get_code_at(account).await?)
    }

    async fn is_valid_signature(
        &self,
        account: Address,
        hash: B256,
        signature: Bytes,
    ) -> Result<FixedBytes<4>, ReadError> {
        debug!(%account, %hash, signature_len = signature.len(), "Calling isValidSignature");
        Ok(IKernel::new(account, &self.provider).isValidSignature(hash, signature).call().await?)
    }

    async fn validation_config(
        &self,
        account: Address,
        id: ValidationId,
    ) -> Result<ValidatorConfig, ReadError> {
        let config =
            IKernel::new(account, &self.provider).validationConfig(id.0).call().await?;
        debug!(
            %account,
            %id,
            nonce = config.nonce,
            hook = %config.hook,
            "Fetched validation config"
        );
        Ok(config)
    }

    async fn root_validator(&self, account: Address) -> Result<ValidationId, ReadError> {
        Ok(IKernel::new(account, &self.provider).rootValidator().call().await?.into())
    }

    async fn current_nonce(&self, account: Address) -> Result<u32, ReadError> {
        Ok(IKernel::new(account, &self.provider).currentNonce().call().await?)
    }

    async fn valid_nonce_from(&self, account: Address) -> Result<u32, ReadError> {
        Ok(IKernel::new(account, &self.provider).validNonceFrom().call().await?)
    }
}
