//! `preflight init`: write a starter configuration file.

use std::path::Path;

use anyhow::{Context, Result};

use preflight_core::config::SyncConfig;

use crate::style;

pub fn run(output: &str) -> Result<()> {
    let resolved = super::expand_tilde(output);
    let path = Path::new(&resolved);

    if path.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, SyncConfig::default_template())
        .context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", path.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Set [machine] id to a stable name for this workstation");
    println!("  2. Point [remote] at the branch your machines push the lockfile to");
    println!("  3. Check with: preflight --config {} status", path.display());
    Ok(())
}
