//! schemadiff CLI
//!
//! Generates MySQL migrations by diffing schema snapshots.

mod config;
mod prompt;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use schemadiff_core::{
    ddl_diff, Catalog, DiffOptions, InterimSchema, MappedResolver, Mode, RenameResolver,
    Snapshot, StatementKind,
};

use crate::config::Config;
use crate::prompt::PromptResolver;

/// Generate MySQL migrations by diffing schema snapshots.
#[derive(Parser)]
#[command(name = "schemadiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project config file.
    #[arg(short, long, default_value = "schemadiff.json")]
    config: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the migration between two snapshots.
    Diff {
        /// Previous snapshot, or `-` for an empty schema.
        #[arg(long)]
        from: String,

        /// Current snapshot.
        #[arg(long)]
        to: PathBuf,

        /// `default` or `push`.
        #[arg(long, env = "SCHEMADIFF_MODE")]
        mode: Option<Mode>,

        /// Known rename, `old->new` or `table.old->table.new`. Repeatable.
        #[arg(long = "rename")]
        renames: Vec<String>,

        /// Ask about unresolved renames on stdin.
        #[arg(short, long)]
        interactive: bool,

        /// Separate statements with `--> statement-breakpoint`.
        #[arg(long, env = "SCHEMADIFF_BREAKPOINTS")]
        breakpoints: bool,

        /// Print the statement log as JSON instead of SQL.
        #[arg(long)]
        json: bool,
    },

    /// Validate a snapshot file.
    Check {
        snapshot: PathBuf,
    },

    /// Build a snapshot from an interim schema.
    Snapshot {
        /// Interim schema JSON.
        #[arg(long)]
        interim: PathBuf,

        /// Snapshot this one follows.
        #[arg(long)]
        prev: Option<PathBuf>,

        /// Where to write the new snapshot.
        #[arg(long)]
        out: PathBuf,

        /// Renames to record in the snapshot. Repeatable.
        #[arg(long = "rename")]
        renames: Vec<String>,
    },
}

fn load_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    Snapshot::load(path).with_context(|| format!("loading snapshot {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Diff {
            from,
            to,
            mode,
            renames,
            interactive,
            breakpoints,
            json,
        } => {
            let from = if from == "-" {
                Snapshot::empty()
            } else {
                load_snapshot(Path::new(&from))?
            };
            let to = load_snapshot(&to)?;

            let options = DiffOptions::new(mode.or(config.mode).unwrap_or_default())
                .with_breakpoints(breakpoints || config.breakpoints);
            let known = MappedResolver::new(
                config
                    .renames
                    .iter()
                    .chain(&to.renames)
                    .chain(&renames),
            )?;

            let prompt;
            let resolver: &dyn RenameResolver = if interactive {
                prompt = PromptResolver::stdin(known);
                &prompt
            } else {
                &known
            };
            let out = ddl_diff(
                from.into_catalog()?,
                to.into_catalog()?,
                resolver,
                &options,
            )
            .await?;

            if !out.unhandled.is_empty() {
                let kinds: Vec<&str> = out.unhandled.iter().map(StatementKind::as_str).collect();
                bail!(
                    "refusing to print a partial migration; no MySQL rendering for: {}",
                    kinds.join(", ")
                );
            }
            if out.is_empty() {
                info!("No schema changes.");
                return Ok(());
            }
            if !out.renames.is_empty() {
                info!(renames = ?out.renames, "Renames applied");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&out.statements)?);
            } else {
                println!("{}", out.migration);
            }
        }

        Commands::Check { snapshot } => {
            let loaded = load_snapshot(&snapshot)?;
            let id = loaded.id.clone();
            let catalog = loaded.into_catalog()?;
            info!(
                "{} is valid: {} entities, id {}",
                snapshot.display(),
                catalog.len(),
                id
            );
        }

        Commands::Snapshot {
            interim,
            prev,
            out,
            renames,
        } => {
            let raw = fs::read_to_string(&interim)
                .with_context(|| format!("reading interim schema {}", interim.display()))?;
            let catalog = Catalog::from_interim(InterimSchema::from_json(&raw)?)?;
            let prev = if let Some(path) = prev {
                load_snapshot(&path)?
            } else {
                warn!("No --prev given; chaining to the origin snapshot.");
                Snapshot::empty()
            };
            let snapshot = Snapshot::from_catalog(&catalog, &prev).with_renames(renames);
            snapshot.save(&out)?;
            info!("Wrote snapshot {} ({})", out.display(), snapshot.id);
        }
    }

    Ok(())
}
