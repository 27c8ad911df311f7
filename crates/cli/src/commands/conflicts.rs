//! `preflight conflicts`: list open lockfile conflicts.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;

use preflight_core::sync_engine::auto_resolve;
use preflight_core::{ConflictReport, LockConflict};

use super::{Comparison, Options};
use crate::style;

pub fn run(opts: &Options, json: bool, auto: bool) -> Result<()> {
    let mut result = match super::detect(opts)? {
        Comparison::Ready(result) => result,
        Comparison::Missing(reason) if json => {
            debug!(%reason, "nothing to compare");
            return print_report(&ConflictReport::unknown());
        }
        Comparison::Missing(reason) => {
            super::print_missing(&reason);
            return Ok(());
        }
    };

    let mut wrote = false;
    if auto {
        result = auto_resolve(&result).context("auto-resolution failed")?;
        if result.is_resolved() {
            wrote = super::write_merged(opts, &result)?;
        } else if !result.resolutions.is_empty() {
            super::save_pending(opts, &result)?;
        }
    }

    if json {
        return print_report(&ConflictReport::from_result(&result));
    }

    println!();
    println!("Relation: {}", style::relation(result.relation));
    println!(
        "{} conflict(s), {} auto-resolvable",
        result.open_conflicts.len(),
        result.auto_resolvable_count()
    );
    println!();

    if auto {
        for r in &result.resolutions {
            println!(
                "{}",
                style::success(&format!(
                    "{}: auto-resolved to {}",
                    r.package_key,
                    style::version(r.chosen_version.as_deref())
                ))
            );
        }
    }

    if result.open_conflicts.is_empty() {
        println!("{}", style::success("No open conflicts"));
        if wrote {
            super::print_commit_hint(&opts.lockfile);
        }
        println!();
        return Ok(());
    }

    println!("{}", conflict_table(&result.open_conflicts));
    println!();
    Ok(())
}

fn print_report(report: &ConflictReport) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(report).context("failed to serialize report")?
    );
    Ok(())
}

/// Table of open conflicts, shared with `resolve`.
pub fn conflict_table(conflicts: &[LockConflict]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["PACKAGE", "TYPE", "LOCAL", "REMOTE", "RESOLVABLE"]);

    for c in conflicts {
        table.add_row(vec![
            Cell::new(c.package_key.as_str()),
            Cell::new(c.conflict_type.to_string()),
            Cell::new(style::version(c.local_version())),
            Cell::new(style::version(c.remote_version())),
            Cell::new(if c.auto_resolvable { "yes" } else { "no" }),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;
    use chrono::Utc;
    use preflight_core::pending;
    use preflight_core::{ConflictType, PackageKey, PackageLockEntry, Provenance};

    #[test]
    fn test_conflict_table_renders_removed_side() {
        let conflict = LockConflict {
            package_key: PackageKey::from("brew:jq"),
            conflict_type: ConflictType::VersionMismatch,
            local: None,
            remote: Some(PackageLockEntry::new(
                "1.7",
                Provenance::new("B", "desk", Utc::now()),
            )),
            base: Some("1.6".into()),
            auto_resolvable: false,
        };
        let rendered = conflict_table(&[conflict]).to_string();
        assert!(rendered.contains("PACKAGE"));
        assert!(rendered.contains("brew:jq"));
        assert!(rendered.contains("VersionMismatch"));
        assert!(rendered.contains("—"));
    }

    #[test]
    fn test_auto_resolve_writes_merged_lockfile() {
        let (_dir, opts) = fixtures::diverged();
        run(&opts, false, true).unwrap();

        assert_eq!(fixtures::version_of(&opts, "brew:go").as_deref(), Some("1.22"));
        assert_eq!(fixtures::version_of(&opts, "brew:jq").as_deref(), Some("1.8"));
        assert!(!pending::pending_path(&opts.lockfile).exists());
    }

    #[test]
    fn test_listing_does_not_touch_lockfile() {
        let (_dir, opts) = fixtures::diverged();
        let before = std::fs::read(&opts.lockfile).unwrap();
        run(&opts, true, false).unwrap();
        run(&opts, false, false).unwrap();
        assert_eq!(std::fs::read(&opts.lockfile).unwrap(), before);
    }

    #[test]
    fn test_missing_remote_is_not_an_error() {
        let (dir, opts) = fixtures::in_sync();
        std::fs::remove_file(dir.path().join("remote.lock")).unwrap();
        run(&opts, true, false).unwrap();
        run(&opts, false, true).unwrap();
    }
}
