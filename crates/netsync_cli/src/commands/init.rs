//! Init command implementation.

use crate::config_file::FileConfig;
use std::path::Path;

/// Writes a template configuration file.
pub fn run(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    FileConfig::template().write(path, force)?;
    println!("Wrote template configuration to {}", path.display());
    println!("Fill in the hosts, credentials, network id and NQE query ids before running sync.");
    Ok(())
}
