//! Shared primitive types.
mod account;
pub use account::*;

mod call;
pub use call::*;

mod envelope;
pub use envelope::*;

mod erc20;
pub use erc20::*;

mod kernel;
pub use kernel::*;

mod quote;
pub use quote::*;

mod user_op;
pub use user_op::*;
