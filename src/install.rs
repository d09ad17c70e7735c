//! Validator installation.
//!
//! Installation is check-before-write: the account's `validationConfig` is read first and nothing
//! is submitted when the validator is already installed, so invoking the installer repeatedly is
//! safe. After a confirmed install the account is polled until the config shows up and the
//! caller's probe signature is verified against it.

use crate::{
    bundler::UserOpSender,
    error::{InstallError, SubmitError, VerifyError},
    poll::{PollConfig, poll},
    types::{
        AccountReader, Call, DelegationStatus, SignatureEnvelope, ValidationId,
        encode_change_root_validator, encode_initialize, encode_install_validation,
        is_placeholder_root, self_call,
    },
    verify::{SignatureVerifier, ValidationOutcome},
};
use alloy::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Installer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallState {
    /// Nothing happened yet.
    NotChecked,
    /// Reading the validator config.
    Checking,
    /// The validator is installed, nothing to do.
    AlreadyInstalled,
    /// The validator is not installed.
    NotInstalled,
    /// The install user operation is in flight.
    Installing,
    /// The install was confirmed.
    Installed,
    /// The install was confirmed, but the account does not validate as expected.
    Unverified,
    /// The install failed.
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotChecked => "not checked",
            Self::Checking => "checking",
            Self::AlreadyInstalled => "already installed",
            Self::NotInstalled => "not installed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Unverified => "installed but unverified",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A state transition, reported to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallProgress {
    /// The state entered.
    pub state: InstallState,
    /// Human readable detail.
    pub detail: String,
}

/// A signature used to check that an installed validator actually works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureProbe {
    /// The digest, unwrapped.
    pub digest: B256,
    /// An envelope over `digest` routed to the validator being installed.
    pub envelope: SignatureEnvelope,
}

/// What to install.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// The account.
    pub account: Address,
    /// The validation id to install.
    pub validation_id: ValidationId,
    /// Data passed to the validator's `onInstall`, the owner address for the ECDSA validator.
    pub validator_data: Bytes,
    /// Optional post-install check.
    pub probe: Option<SignatureProbe>,
}

/// Successful installer outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum InstallOutcome {
    /// The validator was installed before, nothing was submitted.
    #[serde(rename_all = "camelCase")]
    AlreadyInstalled {
        /// The probe result, if a probe was given and could be run.
        probe: Option<ValidationOutcome>,
        /// Why the probe could not be run.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        probe_error: Option<String>,
    },
    /// The validator was installed and verified.
    #[serde(rename_all = "camelCase")]
    Installed {
        /// The install user operation.
        user_op_hash: B256,
        /// The bundle transaction.
        transaction_hash: B256,
        /// The probe result, if a probe was given.
        probe: Option<ValidationOutcome>,
    },
    /// The install was confirmed, but the account does not validate as expected.
    #[serde(rename_all = "camelCase")]
    InstalledButUnverified {
        /// The install user operation.
        user_op_hash: B256,
        /// The bundle transaction.
        transaction_hash: B256,
        /// What did not check out.
        reason: String,
    },
}

/// Result of [`ValidatorInstaller::ensure_root_validator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RootValidatorOutcome {
    /// A root validator was already set.
    Unchanged {
        /// The root validator.
        root: ValidationId,
    },
    /// The root validator was set.
    #[serde(rename_all = "camelCase")]
    Repaired {
        /// The root validator before, zero or the placeholder.
        previous: ValidationId,
        /// The bundle transaction.
        transaction_hash: B256,
    },
}

/// Installs validators on Kernel accounts.
#[derive(Debug, Clone)]
pub struct ValidatorInstaller {
    reader: Arc<dyn AccountReader>,
    sender: Arc<dyn UserOpSender>,
    verifier: SignatureVerifier,
    poll: PollConfig,
    progress: Option<UnboundedSender<InstallProgress>>,
}

impl ValidatorInstaller {
    /// Create a new instance of [`ValidatorInstaller`].
    pub fn new(reader: Arc<dyn AccountReader>, sender: Arc<dyn UserOpSender>) -> Self {
        Self {
            verifier: SignatureVerifier::new(reader.clone()),
            reader,
            sender,
            poll: PollConfig::default(),
            progress: None,
        }
    }

    /// Sets the post-install polling configuration.
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Reports every state transition on `progress`.
    pub fn with_progress(mut self, progress: UnboundedSender<InstallProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, state: InstallState, detail: impl Into<String>) {
        let detail = detail.into();
        info!(%state, %detail, "Validator install");
        if let Some(progress) = &self.progress {
            // a dropped receiver only means nobody is watching
            let _ = progress.send(InstallProgress { state, detail });
        }
    }

    /// Installs `request.validation_id` unless it is installed already.
    ///
    /// Submission failures are returned as [`InstallError::Failed`] and are not retried.
    pub async fn install(&self, request: InstallRequest) -> Result<InstallOutcome, InstallError> {
        let InstallRequest { account, validation_id, validator_data, probe } = request;

        self.report(InstallState::Checking, format!("reading config of {validation_id}"));
        let config = match self.reader.validation_config(account, validation_id).await {
            Ok(config) => config,
            Err(err) => {
                self.report(InstallState::Failed, err.to_string());
                return Err(err.into());
            }
        };

        if config.is_installed() {
            self.report(
                InstallState::AlreadyInstalled,
                format!("installed at nonce {}", config.nonce),
            );
            let (probe, probe_error) = match &probe {
                Some(probe) => match self.run_probe(account, probe).await {
                    Ok(outcome) => (Some(outcome), None),
                    Err(err) => {
                        warn!(%account, %err, "Failed to check probe signature");
                        (None, Some(err.to_string()))
                    }
                },
                None => (None, None),
            };
            return Ok(InstallOutcome::AlreadyInstalled { probe, probe_error });
        }
        self.report(InstallState::NotInstalled, format!("hook is {}", config.hook));

        let nonce = match self.reader.current_nonce(account).await {
            Ok(nonce) => nonce,
            Err(err) => {
                self.report(InstallState::Failed, err.to_string());
                return Err(err.into());
            }
        };

        self.report(InstallState::Installing, format!("installing at nonce {nonce}"));
        let call =
            self_call(account, encode_install_validation(validation_id, nonce, validator_data));
        let (user_op_hash, transaction_hash) = match self.submit(call).await {
            Ok(submitted) => submitted,
            Err(err) => {
                self.report(InstallState::Failed, err.to_string());
                return Err(InstallError::Failed(err));
            }
        };
        self.report(InstallState::Installed, format!("included in {transaction_hash}"));

        // read errors here are treated as "not visible yet"
        let observed = poll(&self.poll, || async {
            match self.reader.validation_config(account, validation_id).await {
                Ok(config) => Ok::<_, SubmitError>(config.is_installed().then_some(())),
                Err(err) => {
                    warn!(%err, "Failed to read validation config");
                    Ok(None)
                }
            }
        })
        .await;

        if !matches!(observed, Ok(Some(()))) {
            return Ok(self.unverified(
                user_op_hash,
                transaction_hash,
                "validation config not observed after install".to_string(),
            ));
        }

        let Some(probe) = probe else {
            return Ok(InstallOutcome::Installed { user_op_hash, transaction_hash, probe: None });
        };

        match self.run_probe(account, &probe).await {
            Ok(ValidationOutcome::Valid) => Ok(InstallOutcome::Installed {
                user_op_hash,
                transaction_hash,
                probe: Some(ValidationOutcome::Valid),
            }),
            Ok(outcome) => Ok(self.unverified(
                user_op_hash,
                transaction_hash,
                format!("probe signature is {outcome}"),
            )),
            Err(err) => Ok(self.unverified(
                user_op_hash,
                transaction_hash,
                format!("probe signature could not be verified: {err}"),
            )),
        }
    }

    fn unverified(
        &self,
        user_op_hash: B256,
        transaction_hash: B256,
        reason: String,
    ) -> InstallOutcome {
        self.report(InstallState::Unverified, reason.clone());
        InstallOutcome::InstalledButUnverified { user_op_hash, transaction_hash, reason }
    }

    /// Sets the root validator if it is unset or still the constructor placeholder.
    ///
    /// Delegated accounts are repaired through `changeRootValidator`, accounts without code get
    /// `initialize` (the EIP-7702 authorization travels with the user operation).
    pub async fn ensure_root_validator(
        &self,
        account: Address,
        validation_id: ValidationId,
        validator_data: Bytes,
    ) -> Result<RootValidatorOutcome, InstallError> {
        let (previous, data) = match self.reader.delegation_status(account).await? {
            DelegationStatus::Eoa => {
                (ValidationId::ZERO, encode_initialize(validation_id, validator_data))
            }
            DelegationStatus::Delegated(_) => {
                let root = self.reader.root_validator(account).await?;
                if !is_placeholder_root(&root) {
                    info!(%account, %root, "Root validator already set");
                    return Ok(RootValidatorOutcome::Unchanged { root });
                }
                (root, encode_change_root_validator(validation_id, validator_data))
            }
            DelegationStatus::Contract => return Err(InstallError::NotKernelAccount(account)),
        };

        info!(%account, %previous, root = %validation_id, "Setting root validator");
        let (_, transaction_hash) = self.submit(self_call(account, data)).await?;
        Ok(RootValidatorOutcome::Repaired { previous, transaction_hash })
    }

    /// Submits `call` and returns the user operation and bundle transaction hashes.
    async fn submit(&self, call: Call) -> Result<(B256, B256), SubmitError> {
        let user_op_hash = self.sender.send_calls(vec![call]).await?;
        let receipt = self.sender.wait_for_receipt(user_op_hash).await?;
        Ok((user_op_hash, receipt.receipt.transaction_hash))
    }

    async fn run_probe(
        &self,
        account: Address,
        probe: &SignatureProbe,
    ) -> Result<ValidationOutcome, VerifyError> {
        let outcome = self.verifier.verify(account, probe.digest, &probe.envelope).await?;
        info!(%account, %outcome, "Probe signature checked");
        Ok(outcome)
    }
}
