//! # Kernel kit
//!
//! Library for operating EIP-7702 Kernel smart accounts: signature envelopes, EIP-1271
//! verification, validator installation and gas-sponsored user operations.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod constants;
pub mod context;
pub mod eip712;
pub mod error;
pub mod install;
pub mod poll;
pub mod serde;
pub mod signers;
pub mod swap;
pub mod types;
pub mod verify;
pub mod version;
