//! # Kernel kit CLI
use crate::{
    config::KernelConfig,
    constants::PERMIT2,
    context::{KernelContext, OperationFamily},
    eip712::wrap_digest,
    install::{InstallRequest, SignatureProbe},
    signers::DynSigner,
    swap,
    types::{Call, IERC20, SignatureEnvelope},
};
use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, B256, Bytes, U256, keccak256},
};
use clap::{Parser, Subcommand};
use futures_util::try_join;
use serde::Serialize;
use std::{net::IpAddr, path::PathBuf};
use tokio::net::TcpListener;
use tracing::info;
use url::Url;

/// Signature envelopes, validator installation and sponsored user operations for EIP-7702 Kernel
/// accounts.
#[derive(Debug, Parser)]
#[command(author, version = crate::version::SHORT_VERSION, about = "Kernel kit", long_about = None)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one will be used and stored under the given path.
    #[arg(long, value_name = "CONFIG", default_value = "kernel.yaml")]
    pub config: PathBuf,
    /// The RPC endpoint of the chain the account lives on.
    #[arg(long, value_name = "RPC_ENDPOINT")]
    pub endpoint: Option<Url>,
    /// The chain id.
    #[arg(long, value_name = "CHAIN_ID")]
    pub chain_id: Option<u64>,
    /// The account address.
    ///
    /// Defaults to the owner address, which is where an EIP-7702 account lives.
    #[arg(long, value_name = "ADDRESS")]
    pub account: Option<Address>,
    /// The EIP-712 domain name of the account.
    #[arg(long, value_name = "NAME")]
    pub domain_name: Option<String>,
    /// The EIP-712 domain version of the account.
    #[arg(long, value_name = "VERSION")]
    pub domain_version: Option<String>,
    /// The validator module envelopes are routed to.
    #[arg(long, value_name = "ADDRESS")]
    pub validator: Option<Address>,
    /// The owner's secret key.
    #[arg(long, value_name = "SECRET_KEY")]
    pub owner_key: Option<String>,
    /// The 0x API key.
    #[arg(long, value_name = "KEY", env = "API_KEY_0X", hide_env_values = true)]
    pub api_key_0x: Option<String>,
    /// The embedded wallet provider app id.
    #[arg(long, value_name = "APP_ID", env = "PRIVY_APP_ID")]
    pub privy_app_id: Option<String>,
    /// The ERC-4337 bundler endpoint.
    #[arg(long, value_name = "URL", env = "BUNDLER_RPC", hide_env_values = true)]
    pub bundler_rpc: Option<Url>,
    /// The ERC-7677 paymaster endpoint.
    #[arg(long, value_name = "URL", env = "PAYMASTER_RPC", hide_env_values = true)]
    pub paymaster_rpc: Option<Url>,
    /// The command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decode a signature envelope.
    Decode {
        /// The envelope bytes.
        signature: Bytes,
    },
    /// Print the digest the account validates for a given digest.
    Wrap {
        /// The unwrapped digest.
        digest: B256,
    },
    /// Sign a digest, a message or typed data as the account.
    Sign {
        /// The unwrapped digest.
        #[arg(required_unless_present_any(["message", "typed_data"]))]
        digest: Option<B256>,
        /// A personal message to sign instead of a digest.
        #[arg(long, conflicts_with_all(["digest", "typed_data"]))]
        message: Option<String>,
        /// A JSON file with EIP-712 typed data to sign instead of a digest.
        #[arg(long, value_name = "FILE", conflicts_with = "digest")]
        typed_data: Option<PathBuf>,
    },
    /// Check a signature envelope against the account.
    Verify {
        /// The unwrapped digest.
        digest: B256,
        /// The envelope bytes.
        signature: Bytes,
        /// Recover the signer locally when the account has no code and compare it to this owner.
        #[arg(long, value_name = "ADDRESS")]
        owner: Option<Address>,
    },
    /// Show delegation and validator state of the account.
    Status,
    /// Install the configured validator.
    Install {
        /// Data passed to the validator on install, defaults to the owner address.
        #[arg(long)]
        data: Option<Bytes>,
        /// Skip the post-install signature check.
        #[arg(long)]
        no_probe: bool,
    },
    /// Set the root validator if it is unset or a placeholder.
    Root {
        /// Data passed to the validator on install, defaults to the owner address.
        #[arg(long)]
        data: Option<Bytes>,
    },
    /// Send a sponsored call from the account.
    Send {
        /// The call target.
        to: Address,
        /// The calldata.
        #[arg(default_value = "0x")]
        data: Bytes,
        /// Native value to send.
        #[arg(long, default_value = "0")]
        value: U256,
    },
    /// Approve Permit2 for the sell token.
    Approve,
    /// Fetch a swap quote.
    Quote {
        /// The taker, defaults to the account.
        #[arg(long, value_name = "ADDRESS")]
        taker: Option<Address>,
    },
    /// Swap the configured amount of the sell token.
    Swap,
    /// Serve the swap quote endpoint.
    Serve {
        /// The address to serve on.
        #[arg(long = "http.addr", value_name = "ADDR")]
        address: Option<IpAddr>,
        /// The port to serve on.
        #[arg(long = "http.port", value_name = "PORT")]
        port: Option<u16>,
    },
}

impl Args {
    /// Runs the command.
    pub async fn run(self) -> eyre::Result<()> {
        let config = if !self.config.exists() {
            let config = self.merge_config(KernelConfig::default());
            config.save_to_file(&self.config)?;
            config
        } else {
            // File exists: load and override with CLI values.
            self.merge_config(KernelConfig::load_from_file(&self.config)?)
        };

        let owner = self.owner_key.as_deref().map(DynSigner::from_signing_key).transpose()?;
        if let Some(owner) = &owner {
            info!(owner = %owner.address(), "Loaded owner key");
        }

        run_command(self.command, config, owner).await
    }

    /// Merges [`Args`] values into an existing [`KernelConfig`] instance.
    pub fn merge_config(&self, config: KernelConfig) -> KernelConfig {
        let (address, port) = match &self.command {
            Command::Serve { address, port } => (*address, *port),
            _ => (None, None),
        };

        config
            .with_endpoint(self.endpoint.clone())
            .with_chain_id(self.chain_id)
            .with_account(self.account)
            .with_domain(self.domain_name.clone(), self.domain_version.clone())
            .with_validator(self.validator)
            .with_address(address)
            .with_port(port)
            .with_api_key_0x(self.api_key_0x.clone())
            .with_privy_app_id(self.privy_app_id.clone())
            .with_bundler_rpc(self.bundler_rpc.clone())
            .with_paymaster_rpc(self.paymaster_rpc.clone())
    }
}

async fn run_command(
    command: Command,
    config: KernelConfig,
    owner: Option<DynSigner>,
) -> eyre::Result<()> {
    // decoding needs no chain access
    if let Command::Decode { signature } = &command {
        let envelope = SignatureEnvelope::decode(signature)?;
        println!("validation id: {}", envelope.validation_id());
        return print_json(&envelope);
    }

    let ctx = KernelContext::connect(config, owner)?;

    match command {
        Command::Decode { .. } => Ok(()),
        Command::Wrap { digest } => {
            let domain = ctx.domain()?;
            println!("domain separator: {}", domain.separator());
            println!("wrapped digest: {}", wrap_digest(digest, &domain));
            Ok(())
        }
        Command::Sign { digest, message, typed_data } => {
            let signer = ctx.signer()?;
            let envelope = match (digest, message, typed_data) {
                (_, Some(message), _) => signer.sign_message(message.as_bytes()).await?,
                (_, _, Some(path)) => {
                    let typed_data: TypedData =
                        serde_json::from_reader(std::fs::File::open(&path)?)?;
                    signer.sign_typed_data(&typed_data).await?
                }
                (Some(digest), None, None) => signer.sign_digest(digest).await?,
                (None, None, None) => eyre::bail!("nothing to sign"),
            };
            println!("{}", envelope.encode());
            Ok(())
        }
        Command::Verify { digest, signature, owner } => {
            let envelope = SignatureEnvelope::decode(&signature)?;
            let verifier = ctx.verifier();
            match owner {
                Some(owner) => {
                    let domain = ctx.domain()?;
                    let report =
                        verifier.verify_or_recover(&domain, digest, &envelope, owner).await?;
                    print_json(&report)
                }
                None => {
                    let outcome = verifier.verify(ctx.account()?, digest, &envelope).await?;
                    println!("{outcome}");
                    Ok(())
                }
            }
        }
        Command::Status => status(&ctx).await,
        Command::Install { data, no_probe } => {
            let _guard = ctx.begin(OperationFamily::Install)?;
            let signer = ctx.signer()?;
            let probe = if no_probe {
                None
            } else {
                let digest = keccak256("kernel-kit validator probe");
                Some(SignatureProbe { digest, envelope: signer.sign_digest(digest).await? })
            };
            let request = InstallRequest {
                account: ctx.account()?,
                validation_id: ctx.validation_id(),
                validator_data: data.unwrap_or_else(|| owner_data(&ctx)),
                probe,
            };
            print_json(&ctx.installer()?.install(request).await?)
        }
        Command::Root { data } => {
            let _guard = ctx.begin(OperationFamily::Install)?;
            let data = data.unwrap_or_else(|| owner_data(&ctx));
            let outcome = ctx
                .installer()?
                .ensure_root_validator(ctx.account()?, ctx.validation_id(), data)
                .await?;
            print_json(&outcome)
        }
        Command::Send { to, data, value } => {
            let _guard = ctx.begin(OperationFamily::Send)?;
            let receipt =
                ctx.sender()?.send_and_wait(vec![Call::new(to, data).with_value(value)]).await?;
            print_json(&receipt)
        }
        Command::Approve => {
            let _guard = ctx.begin(OperationFamily::Swap)?;
            let token = ctx.config().swap.sell_token;
            let allowance = IERC20::new(token, ctx.provider().clone())
                .allowance(ctx.account()?, PERMIT2)
                .call()
                .await?;
            if allowance >= ctx.config().swap.sell_amount {
                println!("Permit2 allowance already set: {allowance}");
                return Ok(());
            }
            let receipt = ctx.swap_client().approve_permit2(ctx.sender()?.as_ref()).await?;
            print_json(&receipt)
        }
        Command::Quote { taker } => {
            let taker = match taker {
                Some(taker) => taker,
                None => ctx.account()?,
            };
            print_json(&ctx.swap_client().quote_raw(taker).await?)
        }
        Command::Swap => {
            let _guard = ctx.begin(OperationFamily::Swap)?;
            let receipt = ctx.swap_client().swap(ctx.signer()?, ctx.sender()?.as_ref()).await?;
            print_json(&receipt)
        }
        Command::Serve { .. } => {
            let server = &ctx.config().server;
            let listener = TcpListener::bind((server.address, server.port)).await?;
            swap::serve(listener, ctx.swap_client()).await
        }
    }
}

/// Validator data installing the ECDSA validator for the owner.
fn owner_data(ctx: &KernelContext) -> Bytes {
    ctx.signer().map(|signer| signer.owner().to_vec().into()).unwrap_or_default()
}

async fn status(ctx: &KernelContext) -> eyre::Result<()> {
    let account = ctx.account()?;
    let reader = ctx.reader();

    let status = reader.delegation_status(account).await?;
    println!("account: {account}");
    println!("chain id: {}", ctx.chain_id().await?);
    print_json(&status)?;

    if let Some(implementation) = status.implementation() {
        let expected = ctx.config().account.implementation;
        if implementation != expected {
            println!("delegated to {implementation}, configured implementation is {expected}");
        }

        let validation_id = ctx.validation_id();
        let (config, root, nonce, valid_from) = try_join!(
            reader.validation_config(account, validation_id),
            reader.root_validator(account),
            reader.current_nonce(account),
            reader.valid_nonce_from(account),
        )?;
        println!("root validator: {root}");
        println!("current nonce: {nonce}");
        println!("valid nonce from: {valid_from}");
        println!(
            "validator {validation_id}: {} (nonce {}, hook {})",
            if config.is_installed() { "installed" } else { "not installed" },
            config.nonce,
            config.hook
        );
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
