//! Owner signers.

mod r#dyn;
pub use r#dyn::DynSigner;

mod kernel;
pub use kernel::KernelSigner;
