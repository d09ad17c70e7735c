//! Kernel kit version.

/// The short version information for kernel kit.
pub const SHORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name and version sent to remote services.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
