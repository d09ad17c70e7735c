//! Kernel kit configuration.
use crate::{
    constants::{
        BASE_CHAIN_ID, BASE_MAINNET_PUBLIC_RPC_URL, BASE_USDC, DEFAULT_KERNEL_NAME,
        DEFAULT_KERNEL_VERSION, ECDSA_VALIDATOR, ENTRYPOINT_V07, KERNEL_V3_3_IMPLEMENTATION,
        NATIVE_TOKEN_PLACEHOLDER, ZEROX_API_URL,
    },
    eip712::AccountDomain,
    poll::PollConfig,
    types::{ValidationId, ValidationType},
};
use alloy::primitives::{Address, U256};
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
};
use url::Url;

/// Kernel kit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Chain configuration.
    #[serde(default)]
    pub chain: ChainConfig,
    /// Account configuration.
    #[serde(default)]
    pub account: AccountConfig,
    /// ERC-4337 EntryPoint.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: Address,
    /// The validator envelopes are routed to and installs target.
    #[serde(default)]
    pub validator: ValidatorSettings,
    /// Polling of receipts and post-install state.
    #[serde(default)]
    pub poll: PollConfig,
    /// Swap configuration.
    #[serde(default)]
    pub swap: SwapConfig,
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Secrets.
    #[serde(skip_serializing, default)]
    pub secrets: SecretsConfig,
}

const fn default_entrypoint() -> Address {
    ENTRYPOINT_V07
}

impl KernelConfig {
    /// Sets the chain id.
    pub fn with_chain_id(mut self, chain_id: Option<u64>) -> Self {
        if let Some(chain_id) = chain_id {
            self.chain.id = chain_id;
            self.swap.chain_id = chain_id;
        }
        self
    }

    /// Sets the chain RPC endpoint.
    pub fn with_endpoint(mut self, endpoint: Option<Url>) -> Self {
        if let Some(endpoint) = endpoint {
            self.chain.endpoint = endpoint;
        }
        self
    }

    /// Sets the account address.
    pub fn with_account(mut self, account: Option<Address>) -> Self {
        self.account.address = account.or(self.account.address);
        self
    }

    /// Sets the EIP-712 domain name and version of the account.
    pub fn with_domain(mut self, name: Option<String>, version: Option<String>) -> Self {
        if let Some(name) = name {
            self.account.name = name;
        }
        if let Some(version) = version {
            self.account.version = version;
        }
        self
    }

    /// Sets the validator address.
    pub fn with_validator(mut self, validator: Option<Address>) -> Self {
        if let Some(validator) = validator {
            self.validator.address = validator;
        }
        self
    }

    /// Sets the IP address to serve on.
    pub fn with_address(mut self, address: Option<IpAddr>) -> Self {
        if let Some(address) = address {
            self.server.address = address;
        }
        self
    }

    /// Sets the port to serve on.
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    /// Sets the 0x API key.
    pub fn with_api_key_0x(mut self, api_key: Option<String>) -> Self {
        self.secrets.api_key_0x = api_key.or(self.secrets.api_key_0x);
        self
    }

    /// Sets the wallet provider app id.
    pub fn with_privy_app_id(mut self, app_id: Option<String>) -> Self {
        self.secrets.privy_app_id = app_id.or(self.secrets.privy_app_id);
        self
    }

    /// Sets the bundler endpoint.
    pub fn with_bundler_rpc(mut self, url: Option<Url>) -> Self {
        self.secrets.bundler_rpc = url.or(self.secrets.bundler_rpc);
        self
    }

    /// Sets the paymaster endpoint.
    pub fn with_paymaster_rpc(mut self, url: Option<Url>) -> Self {
        self.secrets.paymaster_rpc = url.or(self.secrets.paymaster_rpc);
        self
    }

    /// Returns the EIP-712 domain of `account`.
    pub fn domain(&self, account: Address) -> AccountDomain {
        AccountDomain::new(&self.account.name, &self.account.version, self.chain.id, account)
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Chain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The chain id.
    pub id: u64,
    /// The RPC endpoint.
    pub endpoint: Url,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            id: BASE_CHAIN_ID,
            // the constant is a valid URL
            endpoint: Url::parse(BASE_MAINNET_PUBLIC_RPC_URL).unwrap_or_else(|_| unreachable!()),
        }
    }
}

/// Account configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// The account, defaults to the owner address for EIP-7702 accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// EIP-712 domain name.
    pub name: String,
    /// EIP-712 domain version.
    pub version: String,
    /// The Kernel implementation the account delegates to.
    pub implementation: Address,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            address: None,
            name: DEFAULT_KERNEL_NAME.to_string(),
            version: DEFAULT_KERNEL_VERSION.to_string(),
            implementation: KERNEL_V3_3_IMPLEMENTATION,
        }
    }
}

/// Validator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorSettings {
    /// The validator module, or permission id.
    pub address: Address,
    /// How the account routes to it.
    #[serde(rename = "type")]
    pub validation_type: ValidationType,
}

impl ValidatorSettings {
    /// Returns the validation id.
    pub fn validation_id(&self) -> ValidationId {
        ValidationId::new(self.validation_type, self.address.0)
    }
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self { address: ECDSA_VALIDATOR, validation_type: ValidationType::Validator }
    }
}

/// Swap configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapConfig {
    /// Aggregator API base URL.
    pub api_url: Url,
    /// Chain the swap happens on.
    pub chain_id: u64,
    /// Token sold.
    pub sell_token: Address,
    /// Token bought.
    pub buy_token: Address,
    /// Amount sold, in base units.
    pub sell_amount: U256,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            // the constant is a valid URL
            api_url: Url::parse(ZEROX_API_URL).unwrap_or_else(|_| unreachable!()),
            chain_id: BASE_CHAIN_ID,
            sell_token: BASE_USDC,
            buy_token: NATIVE_TOKEN_PLACEHOLDER,
            // 1 USDC
            sell_amount: U256::from(1_000_000u64),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve on.
    pub address: IpAddr,
    /// The port to serve on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 3000 }
    }
}

/// Secrets, only ever read from the environment or the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// 0x API key.
    pub api_key_0x: Option<String>,
    /// Wallet provider app id, carried for the embedded wallet login.
    pub privy_app_id: Option<String>,
    /// Bundler endpoint. Provider URLs usually embed an API key.
    pub bundler_rpc: Option<Url>,
    /// Paymaster endpoint.
    pub paymaster_rpc: Option<Url>,
}
