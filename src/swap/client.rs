//! 0x swap API client.

use super::execute::{approve_permit2_call, swap_call};
use crate::{
    bundler::UserOpSender,
    config::SwapConfig,
    error::SwapError,
    signers::KernelSigner,
    types::{SwapQuote, UserOperationReceipt},
    version::USER_AGENT,
};
use alloy::primitives::Address;
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

/// Quote endpoint, relative to the API base URL.
const PERMIT2_QUOTE_PATH: &str = "swap/permit2/quote";

/// Client for Permit2 quotes of the configured token pair.
#[derive(Debug, Clone)]
pub struct SwapClient {
    client: Client,
    config: SwapConfig,
    api_key: Option<String>,
}

impl SwapClient {
    /// Create a new instance of [`SwapClient`].
    pub fn new(config: SwapConfig, api_key: Option<String>) -> Self {
        let client = Client::builder().user_agent(USER_AGENT).build().unwrap_or_default();
        Self { client, config, api_key: api_key.filter(|key| !key.is_empty()) }
    }

    /// Returns the swap configuration.
    pub const fn config(&self) -> &SwapConfig {
        &self.config
    }

    /// Whether an API key is configured.
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The quote URL for `taker`.
    pub fn quote_url(&self, taker: Address) -> Result<Url, SwapError> {
        let mut url = self.config.api_url.join(PERMIT2_QUOTE_PATH)?;
        url.query_pairs_mut()
            .append_pair("chainId", &self.config.chain_id.to_string())
            .append_pair("sellToken", &self.config.sell_token.to_string())
            .append_pair("buyToken", &self.config.buy_token.to_string())
            .append_pair("sellAmount", &self.config.sell_amount.to_string())
            .append_pair("taker", &taker.to_string());
        Ok(url)
    }

    /// Fetches the quote for `taker` as returned by the aggregator.
    pub async fn quote_raw(&self, taker: Address) -> Result<serde_json::Value, SwapError> {
        let api_key = self.api_key.as_deref().ok_or(SwapError::MissingApiKey)?;
        let url = self.quote_url(taker)?;

        let response = self
            .client
            .get(url)
            .header("0x-api-key", api_key)
            .header("0x-version", "v2")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SwapError::Upstream { status: status.as_u16(), body });
        }

        let quote: serde_json::Value = response.json().await?;
        debug!(%taker, %quote, "Fetched swap quote");
        Ok(quote)
    }

    /// Fetches and decodes the quote for `taker`.
    pub async fn quote(&self, taker: Address) -> Result<SwapQuote, SwapError> {
        let quote: SwapQuote = serde_json::from_value(self.quote_raw(taker).await?)?;
        if !quote.liquidity_available {
            return Err(SwapError::NoLiquidity);
        }
        Ok(quote)
    }

    /// Approves Permit2 to spend the sell token of `sender`'s account without limit.
    #[instrument(skip_all, fields(token = %self.config.sell_token))]
    pub async fn approve_permit2(
        &self,
        sender: &dyn UserOpSender,
    ) -> Result<UserOperationReceipt, SwapError> {
        let call = approve_permit2_call(self.config.sell_token);
        let receipt = sender.send_and_wait(vec![call]).await?;
        info!(tx_hash = %receipt.receipt.transaction_hash, "Approved Permit2");
        Ok(receipt)
    }

    /// Quotes, signs and executes a swap from the signer's account.
    #[instrument(skip_all, fields(account = %signer.account()))]
    pub async fn swap(
        &self,
        signer: &KernelSigner,
        sender: &dyn UserOpSender,
    ) -> Result<UserOperationReceipt, SwapError> {
        let quote = self.quote(signer.account()).await?;
        let call = swap_call(&quote, signer).await?;
        let receipt = sender.send_and_wait(vec![call]).await?;
        info!(tx_hash = %receipt.receipt.transaction_hash, "Swap executed");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BASE_USDC, NATIVE_TOKEN_PLACEHOLDER};

    #[test]
    fn quote_url_has_pair_and_taker() {
        let client = SwapClient::new(SwapConfig::default(), None);
        let taker = Address::repeat_byte(0x11);
        let url = client.quote_url(taker).unwrap();

        assert_eq!(url.path(), "/swap/permit2/quote");
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("chainId".to_string(), "8453".to_string()),
                ("sellToken".to_string(), BASE_USDC.to_string()),
                ("buyToken".to_string(), NATIVE_TOKEN_PLACEHOLDER.to_string()),
                ("sellAmount".to_string(), "1000000".to_string()),
                ("taker".to_string(), taker.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_api_key() {
        let client = SwapClient::new(SwapConfig::default(), Some(String::new()));
        assert!(!client.has_api_key());
        assert!(matches!(
            client.quote_raw(Address::ZERO).await.unwrap_err(),
            SwapError::MissingApiKey
        ));
    }
}
