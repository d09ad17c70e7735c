//! On-chain signature validation.
//!
//! Asks the account itself, through ERC-1271 `isValidSignature`, whether an envelope is valid for
//! a digest. The account wraps the digest (see [`crate::eip712::wrap_digest`]) and routes the
//! payload to the validator named in the envelope header.

use crate::{
    constants::EIP1271_MAGIC_VALUE,
    eip712::{AccountDomain, recover_signer},
    error::{EnvelopeError, ReadError, VerifyError},
    types::{AccountReader, INVALID_VALIDATOR_SELECTOR, SignatureEnvelope},
};
use alloy::primitives::{Address, B256, FixedBytes};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};

/// Result of asking an account about a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "camelCase")]
pub enum ValidationOutcome {
    /// The account returned the ERC-1271 magic value.
    Valid,
    /// The account returned something else.
    Invalid(FixedBytes<4>),
    /// The account could not answer.
    Unverifiable(UnverifiableReason),
}

impl ValidationOutcome {
    /// Whether the signature is valid.
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("valid"),
            Self::Invalid(code) => write!(f, "invalid (returned {code})"),
            Self::Unverifiable(reason) => write!(f, "unverifiable: {reason}"),
        }
    }
}

/// Why an account could not validate a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnverifiableReason {
    /// The address has no code, it is not delegated yet.
    AccountHasNoCode,
    /// The envelope names a validator that is not installed.
    UnknownValidator,
    /// The call reverted for another reason.
    Reverted(String),
}

impl fmt::Display for UnverifiableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccountHasNoCode => f.write_str("account has no code"),
            Self::UnknownValidator => f.write_str("validator is not installed"),
            Self::Reverted(reason) => write!(f, "reverted: {reason}"),
        }
    }
}

/// Result of [`SignatureVerifier::verify_or_recover`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "camelCase")]
pub enum VerificationReport {
    /// The account answered.
    OnChain {
        /// The account's answer.
        outcome: ValidationOutcome,
    },
    /// The account has no code, the payload was checked by local ECDSA recovery instead.
    Recovered {
        /// The recovered signer.
        signer: Address,
        /// Whether the signer is the expected owner.
        matches_owner: bool,
    },
}

/// Validates envelopes against accounts.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    reader: Arc<dyn AccountReader>,
}

impl SignatureVerifier {
    /// Create a new instance of [`SignatureVerifier`].
    pub fn new(reader: Arc<dyn AccountReader>) -> Self {
        Self { reader }
    }

    /// Asks `account` whether `envelope` is a valid signature over `digest`.
    ///
    /// `digest` is passed unwrapped, the account wraps it itself. Accounts without code are
    /// reported as [`UnverifiableReason::AccountHasNoCode`] without calling them. Envelopes with a
    /// validation type Kernel does not define are rejected before anything is sent.
    #[instrument(skip_all, fields(%account, %digest))]
    pub async fn verify(
        &self,
        account: Address,
        digest: B256,
        envelope: &SignatureEnvelope,
    ) -> Result<ValidationOutcome, VerifyError> {
        if !envelope.validation_type.is_known() {
            return Err(EnvelopeError::UnsupportedType(envelope.validation_type).into());
        }

        let code = self.reader.code(account).await?;
        if code.is_empty() {
            debug!("Account has no code");
            return Ok(ValidationOutcome::Unverifiable(UnverifiableReason::AccountHasNoCode));
        }

        let outcome =
            match self.reader.is_valid_signature(account, digest, envelope.encode()).await {
                Ok(code) if code == EIP1271_MAGIC_VALUE => ValidationOutcome::Valid,
                Ok(code) => ValidationOutcome::Invalid(code),
                Err(err) if err.is_revert() => {
                    ValidationOutcome::Unverifiable(classify_revert(&err))
                }
                Err(err) => return Err(err.into()),
            };

        debug!(
            validation_type = %envelope.validation_type,
            validator = %envelope.validator_address(),
            %outcome,
            "Verified signature"
        );

        Ok(outcome)
    }

    /// Like [`Self::verify`], but falls back to recovering the ECDSA signer of the payload against
    /// the wrapped digest when the account has no code.
    pub async fn verify_or_recover(
        &self,
        domain: &AccountDomain,
        digest: B256,
        envelope: &SignatureEnvelope,
        owner: Address,
    ) -> Result<VerificationReport, VerifyError> {
        match self.verify(domain.verifying_contract, digest, envelope).await? {
            ValidationOutcome::Unverifiable(UnverifiableReason::AccountHasNoCode) => {
                let signer = recover_signer(digest, domain, envelope)?;
                debug!(%signer, %owner, "Recovered signer locally");
                Ok(VerificationReport::Recovered { signer, matches_owner: signer == owner })
            }
            outcome => Ok(VerificationReport::OnChain { outcome }),
        }
    }
}

fn classify_revert(err: &ReadError) -> UnverifiableReason {
    let ReadError::Reverted { message, .. } = err else {
        return UnverifiableReason::Reverted(err.to_string());
    };

    if err.revert_selector() == Some(INVALID_VALIDATOR_SELECTOR)
        || message.contains("InvalidValidator")
    {
        UnverifiableReason::UnknownValidator
    } else {
        UnverifiableReason::Reverted(message.clone())
    }
}
