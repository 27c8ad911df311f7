//! preflight lockfile sync command-line tool.
//!
//! Compares this machine's lockfile with the copy on the remote-tracking
//! branch (or an explicit file), lists conflicts, and resolves them into a
//! merged lockfile ready to commit.

mod commands;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use preflight_core::errors::ConflictError;

use commands::resolve::StrategyFlags;
use commands::Options;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// preflight lockfile sync tool.
#[derive(Parser, Debug)]
#[command(
    name = "preflight",
    version,
    about = "Synchronize the preflight lockfile between workstations"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "~/.config/preflight/sync.toml"
    )]
    config: String,

    /// Local lockfile (default from config, else `preflight.lock`).
    #[arg(short, long, global = true)]
    lockfile: Option<PathBuf>,

    /// Read the remote snapshot from this file instead of git.
    #[arg(long, global = true)]
    remote_lockfile: Option<PathBuf>,

    /// Show debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show how the local lockfile relates to the remote one.
    Status,

    /// List open lockfile conflicts.
    Conflicts {
        /// Emit a machine-readable report.
        #[arg(long)]
        json: bool,

        /// Close conflicts that have a clear upgrade winner first.
        #[arg(long)]
        auto_resolve: bool,
    },

    /// Resolve open conflicts and write the merged lockfile.
    Resolve {
        /// Resolve only this package (e.g. `brew:go`).
        package_key: Option<String>,

        /// Keep this machine's version.
        #[arg(long)]
        local: bool,

        /// Take the remote version.
        #[arg(long)]
        remote: bool,

        /// Take whichever side changed most recently.
        #[arg(long)]
        newest: bool,

        /// Keep local and mark the remote change as seen.
        #[arg(long)]
        skip: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "~/.config/preflight/sync.toml")]
        output: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if is_usage_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Errors caused by how the tool was invoked; these exit with status 2.
fn is_usage_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<ConflictError>()
        .is_some_and(ConflictError::is_usage)
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Init { output } = &cli.command {
        return commands::init::run(output);
    }

    let opts = Options::resolve(&cli.config, cli.lockfile, cli.remote_lockfile)?;

    match cli.command {
        Commands::Status => commands::status::run(&opts),
        Commands::Conflicts { json, auto_resolve } => {
            commands::conflicts::run(&opts, json, auto_resolve)
        }
        Commands::Resolve {
            package_key,
            local,
            remote,
            newest,
            skip,
        } => commands::resolve::run(
            &opts,
            package_key.as_deref(),
            StrategyFlags {
                local,
                remote,
                newest,
                skip,
            },
        ),
        Commands::Init { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_flags() {
        let cli = Cli::parse_from(["preflight", "resolve", "brew:go", "--remote"]);
        match cli.command {
            Commands::Resolve {
                package_key,
                remote,
                local,
                ..
            } => {
                assert_eq!(package_key.as_deref(), Some("brew:go"));
                assert!(remote);
                assert!(!local);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_usage_errors_are_recognised_through_context() {
        use anyhow::Context;

        let not_pending: Result<()> =
            Err(ConflictError::NotPending("brew:go".into())).context("resolve failed");
        assert!(is_usage_error(&not_pending.unwrap_err()));

        let unresolved = anyhow::Error::from(ConflictError::Unresolved(1));
        assert!(!is_usage_error(&unresolved));
        assert!(!is_usage_error(&anyhow::anyhow!("disk full")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "preflight",
            "conflicts",
            "--json",
            "--remote-lockfile",
            "peer.lock",
            "-v",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.remote_lockfile, Some(PathBuf::from("peer.lock")));
        assert!(matches!(cli.command, Commands::Conflicts { json: true, .. }));
    }
}
