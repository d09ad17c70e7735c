//! Kernel v3 account bindings.

use super::{Call, ValidationId};
use crate::constants::HOOK_MODULE_INSTALLED;
use alloy::{
    primitives::{Address, B256, Bytes, FixedBytes, U256},
    sol,
    sol_types::{SolCall, SolValue},
};

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IKernel {
        /// Per-validation configuration stored by the account.
        #[derive(Default, PartialEq, Eq)]
        struct ValidatorConfig {
            /// The nonce the validation was installed at.
            uint32 nonce;
            /// The hook, `address(1)` for the pass-through hook and zero when not installed.
            address hook;
        }

        /// A single execution in a batch.
        struct Execution {
            address target;
            uint256 value;
            bytes callData;
        }

        /// The validation id is not installed on the account.
        error InvalidValidator();

        /// ERC-1271 signature validation.
        ///
        /// `hash` is the caller's digest, the account wraps it before handing it to the validator
        /// selected by the first 21 bytes of `signature`.
        function isValidSignature(bytes32 hash, bytes calldata signature)
            external
            view
            returns (bytes4);

        /// Returns the configuration of a validation id.
        function validationConfig(bytes21 vId) external view returns (ValidatorConfig memory);

        /// Returns the root validation id.
        function rootValidator() external view returns (bytes21);

        /// Returns the nonce the next installed validation gets.
        function currentNonce() external view returns (uint32);

        /// Returns the lowest validation nonce that is still valid.
        function validNonceFrom() external view returns (uint32);

        /// Installs validations, callable by the account itself.
        function installValidations(
            bytes21[] calldata vIds,
            ValidatorConfig[] memory configs,
            bytes[] calldata validationData,
            bytes[] calldata hookData
        ) external payable;

        /// Replaces the root validator, callable by the account itself.
        function changeRootValidator(
            bytes21 _rootValidator,
            address hook,
            bytes calldata validatorData,
            bytes calldata hookData
        ) external payable;

        /// Initializes an account whose root validator was never set.
        function initialize(
            bytes21 _rootValidator,
            address hook,
            bytes calldata validatorData,
            bytes calldata hookData,
            bytes[] calldata initConfig
        ) external;

        /// ERC-7579 execution.
        function execute(bytes32 execMode, bytes calldata executionCalldata) external payable;
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IEntryPoint {
        /// Returns the next nonce of `sender` for the given key.
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }
}

pub use IKernel::ValidatorConfig;

/// ERC-7579 execution mode for a single call.
pub const EXEC_MODE_SINGLE: B256 = B256::ZERO;

/// ERC-7579 execution mode for a batch of calls.
pub const EXEC_MODE_BATCH: B256 = {
    let mut mode = [0u8; 32];
    mode[0] = 0x01;
    B256::new(mode)
};

impl ValidatorConfig {
    /// Config of a validation installed with the pass-through hook at `nonce`.
    pub const fn installed(nonce: u32) -> Self {
        Self { nonce, hook: HOOK_MODULE_INSTALLED }
    }

    /// Whether the validation is installed with the pass-through hook.
    pub fn is_installed(&self) -> bool {
        self.hook == HOOK_MODULE_INSTALLED
    }

    /// Whether nothing is installed for the validation id.
    pub fn is_empty(&self) -> bool {
        self.hook.is_zero()
    }
}

/// Encodes `installValidations` for a single validation id with no hook data.
pub fn encode_install_validation(id: ValidationId, nonce: u32, validator_data: Bytes) -> Bytes {
    IKernel::installValidationsCall {
        vIds: vec![id.0],
        configs: vec![ValidatorConfig::installed(nonce)],
        validationData: vec![validator_data],
        hookData: vec![Bytes::new()],
    }
    .abi_encode()
    .into()
}

/// Encodes `changeRootValidator` with the pass-through hook.
pub fn encode_change_root_validator(id: ValidationId, validator_data: Bytes) -> Bytes {
    IKernel::changeRootValidatorCall {
        _rootValidator: id.0,
        hook: HOOK_MODULE_INSTALLED,
        validatorData: validator_data,
        hookData: Bytes::new(),
    }
    .abi_encode()
    .into()
}

/// Encodes `initialize` with the pass-through hook and no init config.
pub fn encode_initialize(id: ValidationId, validator_data: Bytes) -> Bytes {
    IKernel::initializeCall {
        _rootValidator: id.0,
        hook: HOOK_MODULE_INSTALLED,
        validatorData: validator_data,
        hookData: Bytes::new(),
        initConfig: vec![],
    }
    .abi_encode()
    .into()
}

/// Encodes the account's `execute` call for the given calls.
///
/// A single call uses the packed single-call mode, anything else the batch mode.
pub fn encode_execute(calls: &[Call]) -> Bytes {
    let (mode, execution_calldata) = match calls {
        [call] => {
            let packed = (call.to, call.value, call.data.clone()).abi_encode_packed();
            (EXEC_MODE_SINGLE, Bytes::from(packed))
        }
        calls => {
            let executions = calls
                .iter()
                .map(|call| IKernel::Execution {
                    target: call.to,
                    value: call.value,
                    callData: call.data.clone(),
                })
                .collect::<Vec<_>>();
            (EXEC_MODE_BATCH, Bytes::from(executions.abi_encode()))
        }
    };

    IKernel::executeCall { execMode: mode, executionCalldata: execution_calldata }
        .abi_encode()
        .into()
}

/// Whether `id` is the placeholder the Kernel constructor writes as root validator, or unset.
pub fn is_placeholder_root(id: &ValidationId) -> bool {
    id.is_zero() || id.0.starts_with(&crate::constants::ROOT_VALIDATOR_PLACEHOLDER_PREFIX)
}

/// The `InvalidValidator()` error selector.
pub const INVALID_VALIDATOR_SELECTOR: FixedBytes<4> =
    FixedBytes(<IKernel::InvalidValidator as alloy::sol_types::SolError>::SELECTOR);

/// A call from the account to itself, the only caller Kernel accepts for admin functions.
pub fn self_call(account: Address, data: Bytes) -> Call {
    Call { to: account, value: U256::ZERO, data }
}
