//! Gas-sponsored user operation submission.
//!
//! Calls are wrapped in the account's `execute`, sponsored through an ERC-7677 paymaster and
//! submitted to an ERC-4337 v0.7 bundler. An EIP-7702 authorization is attached while the owner
//! EOA is not yet delegated to the Kernel implementation.

use crate::{
    constants::{DUMMY_ECDSA_SIGNATURE, ENTRYPOINT_V07, KERNEL_V3_3_IMPLEMENTATION},
    error::SubmitError,
    poll::{PollConfig, poll},
    signers::KernelSigner,
    types::{
        AccountReader, Call, DelegationStatus, GasEstimate, KernelReader, PaymasterData,
        UserOperation, UserOperationReceipt, encode_execute,
    },
};
use alloy::{
    primitives::{Address, B256, Bytes, U64},
    providers::{DynProvider, Provider},
    rpc::client::{ClientBuilder, RpcClient},
    transports::layers::RetryBackoffLayer,
};
use std::fmt::Debug;
use tracing::{debug, info, instrument};
use url::Url;

/// [`RetryBackoffLayer`] used for bundler and paymaster clients.
///
/// Only rate limits are retried, a rejected user operation is reported to the caller.
const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(3, 500, u64::MAX);

/// Submits calls as user operations.
#[async_trait::async_trait]
pub trait UserOpSender: Debug + Send + Sync {
    /// Submits `calls` as a single user operation, returning its hash.
    async fn send_calls(&self, calls: Vec<Call>) -> Result<B256, SubmitError>;

    /// Waits until the user operation is included.
    ///
    /// A receipt for a failed execution is returned as [`SubmitError::RevertedOnChain`].
    async fn wait_for_receipt(&self, hash: B256) -> Result<UserOperationReceipt, SubmitError>;

    /// Submits `calls` and waits for the receipt.
    async fn send_and_wait(&self, calls: Vec<Call>) -> Result<UserOperationReceipt, SubmitError> {
        let hash = self.send_calls(calls).await?;
        self.wait_for_receipt(hash).await
    }
}

/// [`UserOpSender`] talking to a bundler and an optional paymaster over JSON-RPC.
#[derive(Debug, Clone)]
pub struct BundlerClient {
    reader: KernelReader<DynProvider>,
    signer: KernelSigner,
    bundler: RpcClient,
    paymaster: Option<RpcClient>,
    entrypoint: Address,
    implementation: Address,
    poll: PollConfig,
}

impl BundlerClient {
    /// Create a new instance of [`BundlerClient`].
    pub fn new(
        provider: DynProvider,
        signer: KernelSigner,
        bundler_url: Url,
        paymaster_url: Option<Url>,
    ) -> Self {
        Self {
            reader: KernelReader::new(provider),
            signer,
            bundler: ClientBuilder::default().layer(RETRY_LAYER).http(bundler_url),
            paymaster: paymaster_url
                .map(|url| ClientBuilder::default().layer(RETRY_LAYER).http(url)),
            entrypoint: ENTRYPOINT_V07,
            implementation: KERNEL_V3_3_IMPLEMENTATION,
            poll: PollConfig::default(),
        }
    }

    /// Sets the EntryPoint address.
    pub fn with_entrypoint(mut self, entrypoint: Address) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    /// Sets the implementation the owner EOA gets delegated to.
    pub fn with_implementation(mut self, implementation: Address) -> Self {
        self.implementation = implementation;
        self
    }

    /// Sets the receipt polling configuration.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Returns the account address.
    pub const fn account(&self) -> Address {
        self.signer.account()
    }

    fn chain_id(&self) -> u64 {
        self.signer.domain().chain_id
    }

    /// Calls an ERC-7677 paymaster method with an empty sponsorship context.
    async fn paymaster_data(
        &self,
        paymaster: &RpcClient,
        method: &'static str,
        op: &UserOperation,
    ) -> Result<PaymasterData, SubmitError> {
        let params =
            (op.clone(), self.entrypoint, U64::from(self.chain_id()), serde_json::json!({}));
        let data: PaymasterData = paymaster.request(method, params).await?;
        debug!(
            method,
            paymaster = %data.paymaster,
            is_final = data.is_final,
            "Fetched paymaster data"
        );
        Ok(data)
    }

    /// Builds an unsigned, sponsored and gas-estimated user operation for `calls`.
    pub async fn prepare(&self, calls: &[Call]) -> Result<UserOperation, SubmitError> {
        let account = self.account();
        let provider = self.reader.provider();

        let nonce = self.reader.entrypoint_nonce(self.entrypoint, account).await?;
        let fees = provider.estimate_eip1559_fees().await?;

        let mut op = UserOperation {
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            signature: Bytes::copy_from_slice(DUMMY_ECDSA_SIGNATURE.as_slice()),
            ..UserOperation::new(account, nonce, encode_execute(calls))
        };

        let status = self.reader.delegation_status(account).await?;
        if status != DelegationStatus::Delegated(self.implementation) {
            let auth_nonce = provider.get_transaction_count(self.signer.owner()).await?;
            debug!(%account, ?status, auth_nonce, "Attaching EIP-7702 authorization");
            op.eip7702_auth = Some(
                self.signer
                    .sign_authorization(self.chain_id(), self.implementation, auth_nonce)
                    .await
                    .map_err(|err| SubmitError::Unknown(err.to_string()))?,
            );
        }

        let stub = match &self.paymaster {
            Some(paymaster) => {
                let stub = self.paymaster_data(paymaster, "pm_getPaymasterStubData", &op).await?;
                op.apply_paymaster(&stub);
                Some(stub)
            }
            None => None,
        };

        let estimate: GasEstimate = self
            .bundler
            .request("eth_estimateUserOperationGas", (op.clone(), self.entrypoint))
            .await?;
        debug!(?estimate, "Estimated user operation gas");
        op.apply_gas_estimate(&estimate);

        if let (Some(paymaster), Some(stub)) = (&self.paymaster, stub)
            && !stub.is_final
        {
            let data = self.paymaster_data(paymaster, "pm_getPaymasterData", &op).await?;
            op.apply_paymaster(&data);
        }

        Ok(op)
    }
}

#[async_trait::async_trait]
impl UserOpSender for BundlerClient {
    #[instrument(skip_all, fields(account = %self.account(), calls = calls.len()))]
    async fn send_calls(&self, calls: Vec<Call>) -> Result<B256, SubmitError> {
        let mut op = self.prepare(&calls).await?;

        let hash = op.hash(self.entrypoint, self.chain_id());
        op.signature = self
            .signer
            .sign_user_op_hash(hash)
            .await
            .map_err(|err| SubmitError::Unknown(err.to_string()))?;

        let submitted: B256 =
            self.bundler.request("eth_sendUserOperation", (op, self.entrypoint)).await?;
        info!(user_op_hash = %submitted, "Submitted user operation");

        Ok(submitted)
    }

    #[instrument(skip(self))]
    async fn wait_for_receipt(&self, hash: B256) -> Result<UserOperationReceipt, SubmitError> {
        let receipt = poll(&self.poll, || async {
            self.bundler
                .request::<_, Option<UserOperationReceipt>>("eth_getUserOperationReceipt", (hash,))
                .await
                .map_err(SubmitError::from)
        })
        .await?
        .ok_or_else(|| SubmitError::ReceiptTimeout(hash.to_string()))?;

        if !receipt.success {
            return Err(SubmitError::RevertedOnChain {
                code: None,
                message: receipt
                    .reason
                    .unwrap_or_else(|| "user operation execution reverted".to_string()),
            });
        }

        info!(tx_hash = %receipt.receipt.transaction_hash, "User operation included");
        Ok(receipt)
    }
}
