//! Swap calls.

use crate::{
    constants::PERMIT2,
    eip712::typed_data_digest,
    error::SwapError,
    signers::KernelSigner,
    types::{Call, IERC20, SwapQuote},
};
use alloy::{
    primitives::{Address, U256},
    sol_types::SolCall,
};
use tracing::debug;

/// The call approving Permit2 to spend `token` without limit.
pub fn approve_permit2_call(token: Address) -> Call {
    Call::new(token, IERC20::approveCall { spender: PERMIT2, amount: U256::MAX }.abi_encode())
}

/// Signs the quote's Permit2 data as the account and returns the settlement call.
///
/// Permit2 checks the signature through the account's `isValidSignature`, so the signature is a
/// full envelope over the Kernel-wrapped digest.
pub async fn swap_call(quote: &SwapQuote, signer: &KernelSigner) -> Result<Call, SwapError> {
    let permit2 = quote.permit2.as_ref().ok_or(SwapError::IncompleteQuote("permit2"))?;
    let transaction = quote.transaction.as_ref().ok_or(SwapError::IncompleteQuote("transaction"))?;

    let digest = typed_data_digest(&permit2.eip712)?;
    let signature = signer.sign_digest(digest).await?.encode();
    debug!(%digest, settler = %transaction.to, len = signature.len(), "Signed Permit2 data");

    Ok(transaction.into_call(&signature))
}
