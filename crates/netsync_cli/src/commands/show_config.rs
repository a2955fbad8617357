//! Show-config command implementation.

use crate::config_file::FileConfig;
use std::path::Path;

/// Prints the effective configuration with credentials redacted.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = FileConfig::load(path)?;
    print!("{}", config.redacted().to_yaml()?);
    println!();
    println!("Enabled kinds:");
    let kinds = config.enabled_kinds();
    if kinds.is_empty() {
        println!("  (none)");
    }
    for kind in kinds {
        println!("  {}", kind);
    }
    Ok(())
}
