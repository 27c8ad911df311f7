//! `preflight resolve`: close open conflicts with a strategy.

use anyhow::{Context, Result};

use preflight_core::errors::ConflictError;
use preflight_core::pending;
use preflight_core::sync_engine::apply_strategy;
use preflight_core::{LockConflict, PackageKey, ResolutionStrategy};

use super::conflicts::conflict_table;
use super::{Comparison, Options};
use crate::style;

/// Strategy flags as given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyFlags {
    pub local: bool,
    pub remote: bool,
    pub newest: bool,
    pub skip: bool,
}

pub fn run(opts: &Options, package_key: Option<&str>, flags: StrategyFlags) -> Result<()> {
    // Checked before any I/O so a bad invocation never touches the lockfile.
    let strategy =
        ResolutionStrategy::from_flags(flags.local, flags.remote, flags.newest, flags.skip)?;

    let result = match super::detect(opts)? {
        Comparison::Ready(result) => result,
        Comparison::Missing(reason) => {
            super::print_missing(&reason);
            return Ok(());
        }
    };

    let key = package_key.map(PackageKey::from);
    if let Some(key) = &key {
        if result.conflict(key).is_none() {
            return Err(ConflictError::NotPending(key.to_string()).into());
        }
    } else if result.open_conflicts.is_empty() {
        println!("{}", style::success("No conflicts to resolve"));
        return Ok(());
    }

    let Some(strategy) = strategy else {
        let shown: Vec<LockConflict> = match &key {
            Some(key) => result.conflict(key).cloned().into_iter().collect(),
            None => result.open_conflicts.clone(),
        };
        println!();
        println!(
            "{}",
            style::header(&format!("Pending Conflicts ({})", result.open_conflicts.len()))
        );
        println!();
        println!("{}", conflict_table(&shown));
        println!();
        println!("Choose how to resolve, for all conflicts or a single package:");
        println!("  preflight resolve [PACKAGE] --local    keep this machine's version");
        println!("  preflight resolve [PACKAGE] --remote   take the other machine's version");
        println!("  preflight resolve [PACKAGE] --newest   take the most recently changed side");
        println!("  preflight resolve [PACKAGE] --skip     keep local and ignore this remote change");
        return Ok(());
    };

    let resolved = apply_strategy(&result, strategy, key.as_ref())?;

    println!();
    for r in resolved.resolutions.iter().skip(result.resolutions.len()) {
        println!(
            "{}",
            style::success(&format!(
                "{}: {} -> {} (chose {})",
                r.package_key,
                style::version(r.local_version.as_deref()),
                style::version(r.remote_version.as_deref()),
                r.chosen_version.as_deref().unwrap_or("removal")
            ))
        );
    }

    if !resolved.is_resolved() {
        super::save_pending(opts, &resolved)?;
        println!();
        println!(
            "{}",
            style::warn(&format!(
                "{} conflict(s) still open; choices so far are kept in {}.",
                resolved.open_conflicts.len(),
                pending::pending_path(&opts.lockfile).display()
            ))
        );
        println!();
        return Ok(());
    }

    if !super::write_merged(opts, &resolved).context("failed to finish merge")? {
        println!();
        return Ok(());
    }
    println!();
    println!(
        "{}",
        style::success(&format!("Merged lockfile written to {}", opts.lockfile.display()))
    );

    let changes = resolved.changes();
    if !changes.is_empty() {
        println!();
        println!("{}", style::header("Apply locally"));
        for change in &changes {
            let action = if change.is_install() {
                "install"
            } else if change.is_removal() {
                "remove"
            } else {
                "update"
            };
            println!(
                "  {:<8} {} {} -> {}",
                action,
                change.package_key,
                style::version(change.before.as_deref()),
                style::version(change.after.as_deref())
            );
        }
    }
    super::print_commit_hint(&opts.lockfile);
    Ok(())
}
