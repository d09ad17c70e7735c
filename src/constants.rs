//! Kernel and network constants.

use alloy::primitives::{Address, FixedBytes, address, fixed_bytes};

/// The 4-byte value returned by `isValidSignature` when a signature is valid.
///
/// See <https://eips.ethereum.org/EIPS/eip-1271>.
pub const EIP1271_MAGIC_VALUE: FixedBytes<4> = fixed_bytes!("1626ba7e");

/// Hook value marking a validator as installed with the pass-through hook.
///
/// Kernel calls this `HOOK_MODULE_INSTALLED`.
pub const HOOK_MODULE_INSTALLED: Address = address!("0x0000000000000000000000000000000000000001");

/// Struct declaration hashed into the Kernel message wrapper.
pub const KERNEL_WRAPPER_TYPE: &str = "Kernel(bytes32 hash)";

/// Default EIP-712 domain name of Kernel accounts.
pub const DEFAULT_KERNEL_NAME: &str = "Kernel";

/// Default EIP-712 domain version of Kernel accounts.
pub const DEFAULT_KERNEL_VERSION: &str = "0.3.3";

/// Kernel v3.3 account implementation, the EIP-7702 delegation target.
pub const KERNEL_V3_3_IMPLEMENTATION: Address =
    address!("0xd6CEDDe84be40893d153Be9d467CD6aD37875b28");

/// ZeroDev ECDSA validator.
pub const ECDSA_VALIDATOR: Address = address!("0x845ADb2C711129d4f3966735eD98a9F09fC4cE57");

/// ERC-4337 EntryPoint v0.7.
pub const ENTRYPOINT_V07: Address = address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");

/// Uniswap Permit2.
pub const PERMIT2: Address = address!("0x000000000022D473030F116dDEE9F6B43aC78BA3");

/// USDC on Base.
pub const BASE_USDC: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// Placeholder the 0x API uses for the native asset.
pub const NATIVE_TOKEN_PLACEHOLDER: Address =
    address!("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Base mainnet chain id.
pub const BASE_CHAIN_ID: u64 = 8453;

/// The public Base Mainnet RPC URL.
///
/// This endpoint is rate-limited.
/// See also <https://docs.base.org/chain/network-information>
pub const BASE_MAINNET_PUBLIC_RPC_URL: &str = "https://mainnet.base.org";

/// The 0x API base URL.
pub const ZEROX_API_URL: &str = "https://api.0x.org";

/// Signature placeholder used while estimating user operation gas.
///
/// Recovers to an address for ECDSA validators without being a valid owner signature.
pub const DUMMY_ECDSA_SIGNATURE: FixedBytes<65> = fixed_bytes!(
    "fffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c"
);

/// Prefix of the placeholder root validator id written by the Kernel constructor.
pub const ROOT_VALIDATOR_PLACEHOLDER_PREFIX: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];
