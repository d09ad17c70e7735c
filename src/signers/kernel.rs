//! Signing on behalf of a Kernel account.

use super::DynSigner;
use crate::{
    eip712::{AccountDomain, typed_data_digest, wrap_digest},
    types::{SignatureEnvelope, ValidationId},
};
use alloy::{
    dyn_abi::TypedData,
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, B256, Bytes, U256},
};
use tracing::debug;

/// Owner key of a Kernel account, producing the signatures the account and its validators accept.
#[derive(Debug, Clone)]
pub struct KernelSigner {
    owner: DynSigner,
    domain: AccountDomain,
    validation_id: ValidationId,
}

impl KernelSigner {
    /// Create a new instance of [`KernelSigner`].
    ///
    /// Envelopes produced by this signer are routed to `validation_id`.
    pub const fn new(owner: DynSigner, domain: AccountDomain, validation_id: ValidationId) -> Self {
        Self { owner, domain, validation_id }
    }

    /// Returns the owner address.
    pub fn owner(&self) -> Address {
        self.owner.address()
    }

    /// Returns the account address.
    pub const fn account(&self) -> Address {
        self.domain.verifying_contract
    }

    /// Returns the account domain.
    pub const fn domain(&self) -> &AccountDomain {
        &self.domain
    }

    /// Returns the validation id envelopes are routed to.
    pub const fn validation_id(&self) -> ValidationId {
        self.validation_id
    }

    /// Signs a user operation hash for the root validator.
    ///
    /// The ECDSA validator accepts the EIP-191 personal-sign form of the hash.
    pub async fn sign_user_op_hash(&self, hash: B256) -> alloy::signers::Result<Bytes> {
        let signature = self.owner.sign_message(hash.as_slice()).await?;
        Ok(signature.as_bytes().into())
    }

    /// Signs an EIP-7702 authorization delegating the owner EOA to `implementation`.
    pub async fn sign_authorization(
        &self,
        chain_id: u64,
        implementation: Address,
        nonce: u64,
    ) -> alloy::signers::Result<SignedAuthorization> {
        let authorization =
            Authorization { chain_id: U256::from(chain_id), address: implementation, nonce };
        let signature = self.owner.sign_hash(&authorization.signature_hash()).await?;
        debug!(owner = %self.owner(), %implementation, nonce, "Signed authorization");
        Ok(authorization.into_signed(signature))
    }

    /// Signs `digest` the way the account validates it in `isValidSignature`.
    pub async fn sign_digest(&self, digest: B256) -> alloy::signers::Result<SignatureEnvelope> {
        let wrapped = wrap_digest(digest, &self.domain);
        let signature = self.owner.sign_hash(&wrapped).await?;
        debug!(%digest, %wrapped, validation_id = %self.validation_id, "Signed digest");
        Ok(SignatureEnvelope::for_validation(self.validation_id, signature.as_bytes()))
    }

    /// Signs a personal message.
    pub async fn sign_message(&self, message: &[u8]) -> alloy::signers::Result<SignatureEnvelope> {
        self.sign_digest(alloy::primitives::eip191_hash_message(message)).await
    }

    /// Signs typed data.
    pub async fn sign_typed_data(
        &self,
        typed_data: &TypedData,
    ) -> Result<SignatureEnvelope, crate::error::KernelError> {
        let digest = typed_data_digest(typed_data)?;
        Ok(self.sign_digest(digest).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::ECDSA_VALIDATOR, eip712::recover_signer};
    use alloy::primitives::Signature;

    fn signer() -> KernelSigner {
        let owner = DynSigner::random();
        let domain = AccountDomain::kernel(8453, owner.address());
        KernelSigner::new(owner, domain, ValidationId::validator(ECDSA_VALIDATOR))
    }

    #[tokio::test]
    async fn digest_signature_recovers_owner() {
        let signer = signer();
        let digest = B256::repeat_byte(7);
        let envelope = signer.sign_digest(digest).await.unwrap();

        assert_eq!(envelope.validation_id(), ValidationId::validator(ECDSA_VALIDATOR));
        assert_eq!(envelope.payload.len(), 65);
        assert_eq!(recover_signer(digest, signer.domain(), &envelope).unwrap(), signer.owner());
    }

    #[tokio::test]
    async fn authorization_recovers_owner() {
        let signer = signer();
        let authorization =
            signer.sign_authorization(8453, Address::repeat_byte(9), 4).await.unwrap();
        assert_eq!(authorization.recover_authority().unwrap(), signer.owner());
        assert_eq!(authorization.inner().nonce, 4);
    }

    #[tokio::test]
    async fn user_op_signature_is_personal_sign() {
        let signer = signer();
        let hash = B256::repeat_byte(3);
        let raw = signer.sign_user_op_hash(hash).await.unwrap();
        let signature = Signature::from_raw(&raw).unwrap();
        assert_eq!(
            signature.recover_address_from_msg(hash.as_slice()).unwrap(),
            signer.owner()
        );
    }
}
