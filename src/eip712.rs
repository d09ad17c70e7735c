//! EIP-712 related helpers.
//!
//! Kernel does not validate signatures over the digest a caller asks about. It wraps the digest
//! in its own typed struct first, so that a signature for one account can't be replayed on
//! another account owned by the same key:
//!
//! ```text
//! keccak256(0x1901 || domainSeparator(account) || keccak256(keccak256("Kernel(bytes32 hash)") || digest))
//! ```

use crate::{
    constants::{DEFAULT_KERNEL_NAME, DEFAULT_KERNEL_VERSION, KERNEL_WRAPPER_TYPE},
    error::VerifyError,
    types::SignatureEnvelope,
};
use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, B256, Signature, U256, keccak256},
    sol_types::Eip712Domain,
};
use serde::{Deserialize, Serialize};

/// The EIP-712 domain of a Kernel account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDomain {
    /// Domain name, `Kernel` for all known deployments.
    pub name: String,
    /// Domain version, the Kernel release the account delegates to.
    pub version: String,
    /// Chain id.
    pub chain_id: u64,
    /// The account itself.
    pub verifying_contract: Address,
}

impl AccountDomain {
    /// Creates a new domain.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Self {
        Self { name: name.into(), version: version.into(), chain_id, verifying_contract }
    }

    /// Domain of a Kernel v3.3 account.
    pub fn kernel(chain_id: u64, account: Address) -> Self {
        Self::new(DEFAULT_KERNEL_NAME, DEFAULT_KERNEL_VERSION, chain_id, account)
    }

    /// Returns the alloy representation of this domain.
    pub fn as_eip712_domain(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(self.name.clone().into()),
            Some(self.version.clone().into()),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }

    /// Returns the domain separator.
    pub fn separator(&self) -> B256 {
        self.as_eip712_domain().separator()
    }
}

/// Wraps `digest` the way the account does before handing it to a validator.
///
/// This is the hash an owner key has to sign for `isValidSignature(digest, ..)` to succeed.
pub fn wrap_digest(digest: B256, domain: &AccountDomain) -> B256 {
    let type_hash = keccak256(KERNEL_WRAPPER_TYPE);

    let mut inner = [0u8; 64];
    inner[..32].copy_from_slice(type_hash.as_slice());
    inner[32..].copy_from_slice(digest.as_slice());
    let struct_hash = keccak256(inner);

    let mut buf = [0u8; 66];
    buf[..2].copy_from_slice(&[0x19, 0x01]);
    buf[2..34].copy_from_slice(domain.separator().as_slice());
    buf[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

/// Hashes caller supplied typed data, under the domain it carries.
pub fn typed_data_digest(typed_data: &TypedData) -> Result<B256, alloy::dyn_abi::Error> {
    typed_data.eip712_signing_hash()
}

/// Recovers the ECDSA signer of an envelope's payload against the wrapped `digest`.
///
/// Useful for checking a signature locally before asking the chain, and for accounts without
/// code where `isValidSignature` cannot be called.
pub fn recover_signer(
    digest: B256,
    domain: &AccountDomain,
    envelope: &SignatureEnvelope,
) -> Result<Address, VerifyError> {
    let signature = Signature::from_raw(&envelope.payload)
        .map_err(|err| VerifyError::Recovery(err.to_string()))?;
    signature
        .recover_address_from_prehash(&wrap_digest(digest, domain))
        .map_err(|err| VerifyError::Recovery(err.to_string()))
}
