use super::SubmitError;
use thiserror::Error;

/// Errors related to swap quotes and swap execution.
#[derive(Debug, Error)]
pub enum SwapError {
    /// No aggregator API key was configured.
    #[error("Missing API key")]
    MissingApiKey,
    /// The aggregator request failed.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The aggregator answered with a non-success status.
    #[error("quote request failed with status {status}: {body}")]
    Upstream {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        body: String,
    },
    /// The aggregator URL could not be built.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// The aggregator response is not a quote.
    #[error("invalid quote: {0}")]
    Decode(#[from] serde_json::Error),
    /// The aggregator did not find a route.
    #[error("no liquidity available for this swap")]
    NoLiquidity,
    /// The quote's Permit2 typed data could not be hashed.
    #[error("invalid permit2 typed data: {0}")]
    Eip712(#[from] alloy::dyn_abi::Error),
    /// The quote is missing a required field.
    #[error("quote is missing {0}")]
    IncompleteQuote(&'static str),
    /// Signing the Permit2 data failed.
    #[error(transparent)]
    Signer(#[from] alloy::signers::Error),
    /// The swap user operation failed.
    #[error(transparent)]
    Submit(#[from] SubmitError),
}
