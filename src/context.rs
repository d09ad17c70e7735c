//! Operation context.
//!
//! [`KernelContext`] owns everything an operation needs: the chain provider, the account reader,
//! the user operation sender and the owner signer. It also enforces at most one in-flight
//! operation per [`OperationFamily`].

use crate::{
    bundler::{BundlerClient, UserOpSender},
    config::KernelConfig,
    eip712::AccountDomain,
    error::ContextError,
    install::ValidatorInstaller,
    signers::{DynSigner, KernelSigner},
    swap::SwapClient,
    types::{AccountReader, KernelReader, ValidationId},
    verify::SignatureVerifier,
};
use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::ClientBuilder,
    transports::layers::RetryBackoffLayer,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::debug;

/// [`RetryBackoffLayer`] used for the chain provider.
///
/// We are allowing max 10 retries with a backoff of 800ms. The CU/s is set to max value to avoid
/// any throttling.
const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 800, u64::MAX);

/// Families of operations that must not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationFamily {
    /// Plain user operations.
    Send,
    /// Validator installation and root validator repair.
    Install,
    /// Permit2 approval and swaps.
    Swap,
}

impl OperationFamily {
    const fn index(self) -> usize {
        match self {
            Self::Send => 0,
            Self::Install => 1,
            Self::Swap => 2,
        }
    }
}

impl fmt::Display for OperationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Install => f.write_str("install"),
            Self::Swap => f.write_str("swap"),
        }
    }
}

/// One busy flag per [`OperationFamily`].
#[derive(Debug, Default)]
pub struct BusyGuards {
    flags: [AtomicBool; 3],
}

impl BusyGuards {
    /// Marks `family` busy until the returned guard is dropped.
    pub fn acquire(&self, family: OperationFamily) -> Result<BusyGuard<'_>, ContextError> {
        let flag = &self.flags[family.index()];
        if flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(ContextError::Busy(family));
        }
        debug!(%family, "Acquired busy guard");
        Ok(BusyGuard { flag, family })
    }

    /// Whether an operation of `family` is in flight.
    pub fn is_busy(&self, family: OperationFamily) -> bool {
        self.flags[family.index()].load(Ordering::Acquire)
    }
}

/// Clears its family's busy flag on drop.
#[derive(Debug)]
#[must_use = "the operation family is released when the guard is dropped"]
pub struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    family: OperationFamily,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        debug!(family = %self.family, "Released busy guard");
    }
}

/// Everything needed to operate one Kernel account.
#[derive(Debug, Clone)]
pub struct KernelContext {
    config: KernelConfig,
    provider: DynProvider,
    reader: Arc<dyn AccountReader>,
    sender: Option<Arc<dyn UserOpSender>>,
    signer: Option<KernelSigner>,
    busy: Arc<BusyGuards>,
}

impl KernelContext {
    /// Connects to the configured chain.
    ///
    /// Without an owner key the context is read-only, without a bundler endpoint nothing can be
    /// submitted.
    pub fn connect(config: KernelConfig, owner: Option<DynSigner>) -> eyre::Result<Self> {
        let client =
            ClientBuilder::default().layer(RETRY_LAYER).http(config.chain.endpoint.clone());
        let provider = ProviderBuilder::new().connect_client(client).erased();
        Self::with_provider(config, provider, owner)
    }

    /// Creates a context on top of an existing provider.
    pub fn with_provider(
        config: KernelConfig,
        provider: DynProvider,
        owner: Option<DynSigner>,
    ) -> eyre::Result<Self> {
        let reader: Arc<dyn AccountReader> = Arc::new(KernelReader::new(provider.clone()));

        let account = match (config.account.address, &owner) {
            (Some(address), _) => Some(address),
            // an EIP-7702 account lives at the owner's address
            (None, Some(owner)) => Some(owner.address()),
            (None, None) => None,
        };

        let signer = match (owner, account) {
            (Some(owner), Some(account)) => Some(KernelSigner::new(
                owner,
                config.domain(account),
                config.validator.validation_id(),
            )),
            _ => None,
        };

        let sender = match (&signer, &config.secrets.bundler_rpc) {
            (Some(signer), Some(bundler)) => {
                let client = BundlerClient::new(
                    provider.clone(),
                    signer.clone(),
                    bundler.clone(),
                    config.secrets.paymaster_rpc.clone(),
                )
                .with_entrypoint(config.entrypoint)
                .with_implementation(config.account.implementation)
                .with_poll(config.poll);
                Some(Arc::new(client) as Arc<dyn UserOpSender>)
            }
            _ => None,
        };

        Ok(Self::from_parts(config, provider, reader, sender, signer))
    }

    /// Assembles a context from its parts.
    pub fn from_parts(
        config: KernelConfig,
        provider: DynProvider,
        reader: Arc<dyn AccountReader>,
        sender: Option<Arc<dyn UserOpSender>>,
        signer: Option<KernelSigner>,
    ) -> Self {
        Self { config, provider, reader, sender, signer, busy: Arc::default() }
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Returns the chain provider.
    pub const fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Returns the account reader.
    pub fn reader(&self) -> Arc<dyn AccountReader> {
        self.reader.clone()
    }

    /// Returns the user operation sender.
    pub fn sender(&self) -> eyre::Result<Arc<dyn UserOpSender>> {
        self.sender.clone().ok_or_else(|| {
            eyre::eyre!("submitting requires an owner key and a bundler endpoint (BUNDLER_RPC)")
        })
    }

    /// Returns the owner signer.
    pub fn signer(&self) -> eyre::Result<&KernelSigner> {
        self.signer.as_ref().ok_or_else(|| eyre::eyre!("this operation requires an owner key"))
    }

    /// Returns the account address.
    pub fn account(&self) -> eyre::Result<alloy::primitives::Address> {
        self.config
            .account
            .address
            .or_else(|| self.signer.as_ref().map(KernelSigner::account))
            .ok_or_else(|| eyre::eyre!("no account address configured"))
    }

    /// Returns the EIP-712 domain of the account.
    pub fn domain(&self) -> eyre::Result<AccountDomain> {
        Ok(self.config.domain(self.account()?))
    }

    /// Returns the configured validation id.
    pub fn validation_id(&self) -> ValidationId {
        self.config.validator.validation_id()
    }

    /// Returns a signature verifier.
    pub fn verifier(&self) -> SignatureVerifier {
        SignatureVerifier::new(self.reader())
    }

    /// Returns a validator installer.
    pub fn installer(&self) -> eyre::Result<ValidatorInstaller> {
        Ok(ValidatorInstaller::new(self.reader(), self.sender()?).with_poll(self.config.poll))
    }

    /// Returns a swap client.
    pub fn swap_client(&self) -> SwapClient {
        SwapClient::new(self.config.swap.clone(), self.config.secrets.api_key_0x.clone())
    }

    /// Marks `family` busy for the lifetime of the returned guard.
    pub fn begin(&self, family: OperationFamily) -> Result<BusyGuard<'_>, ContextError> {
        self.busy.acquire(family)
    }

    /// Returns the chain id the provider is connected to.
    pub async fn chain_id(&self) -> eyre::Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }
}
