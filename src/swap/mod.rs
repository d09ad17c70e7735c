//! Token swaps through the 0x aggregator.
//!
//! Quotes use the Permit2 flow: the account approves Permit2 once, then every swap carries a
//! Permit2 signature appended to the settlement calldata.

mod client;
mod execute;
mod server;

pub use client::SwapClient;
pub use execute::{approve_permit2_call, swap_call};
pub use server::{SWAP_ROUTE, handle, serve};
