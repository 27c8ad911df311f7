//! `preflight status`: how the local lockfile relates to the remote one.

use anyhow::Result;

use preflight_core::lockfile::describe_relation;

use super::{Comparison, Options};
use crate::style;

pub fn run(opts: &Options) -> Result<()> {
    let comparison = super::detect(opts)?;

    println!();
    println!("{}", style::header("Lockfile Sync Status"));
    println!("{}", "═".repeat(20));
    println!();
    println!("  Machine     {}", opts.machine_id);
    println!("  Lockfile    {}", opts.lockfile.display());

    let result = match comparison {
        Comparison::Ready(result) => result,
        Comparison::Missing(reason) => {
            println!("  Relation    {}", style::dim(describe_relation(None)));
            println!("  needs merge: no");
            println!();
            super::print_missing(&reason);
            return Ok(());
        }
    };

    let machines: Vec<&str> = result.local.clock().machines().collect();
    if !machines.is_empty() {
        println!("  Writers     {}", machines.join(", "));
    }
    println!("  Relation    {}", style::relation(result.relation));
    println!(
        "  needs merge: {}",
        if result.needs_merge() { "yes" } else { "no" }
    );

    if result.needs_merge() {
        println!(
            "  Conflicts   {} open, {} auto-resolvable",
            result.open_conflicts.len(),
            result.auto_resolvable_count()
        );
        println!(
            "  Settled     {} package(s) merged without input",
            result.stats.auto_resolved_count
        );
        if !result.resolutions.is_empty() {
            println!(
                "  Resolved    {} package(s) chosen, waiting for the rest",
                result.resolutions.len()
            );
        }
    }
    if result.stats.changed_count > 0 {
        println!("  Changes     {} package(s) differ after sync", result.stats.changed_count);
    }
    println!();

    if !result.open_conflicts.is_empty() {
        println!(
            "{}",
            style::warn("Run `preflight conflicts` to review, then `preflight resolve`.")
        );
        println!();
    }
    Ok(())
}
