//! CLI command implementations.

pub mod init;
pub mod show_config;
pub mod sync;
