//! CLI command implementations.

pub mod filter;
pub mod init;
pub mod sync;
