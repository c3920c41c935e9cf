use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use modpatch::patch_format::PatchDefinition;
use modpatch::{apply, catalog, plan, status, util, Direction, PatchStatus};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "modpatch", about = "Masked byte-pattern patcher for game executables")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Session {
    /// Path to the binary being patched
    #[arg(long)]
    target: PathBuf,
    /// Directory holding patch definition files
    #[arg(long, default_value = "patches")]
    patches: PathBuf,
}

#[derive(Args)]
struct Selection {
    /// Patch id to select (repeatable)
    #[arg(long = "id")]
    ids: Vec<String>,
    /// Select every patch that is eligible in this direction
    #[arg(long, conflicts_with = "ids")]
    all: bool,
    /// Do not create a backup before writing
    #[arg(long)]
    no_backup: bool,
    /// Plan and apply to an in-memory copy only
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the status of every patch in the catalog
    List {
        #[command(flatten)]
        session: Session,
    },
    /// Apply patches (find -> replace)
    Apply {
        #[command(flatten)]
        session: Session,
        #[command(flatten)]
        selection: Selection,
    },
    /// Revert patches (replace -> find)
    Revert {
        #[command(flatten)]
        session: Session,
        #[command(flatten)]
        selection: Selection,
    },
    /// Restore the target from its backup
    Restore {
        /// Path to the binary to restore
        #[arg(long)]
        target: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::List { session } => list(&session, cli.verbose > 0).await,
        Commands::Apply { session, selection } => {
            run(&session, &selection, Direction::Forward).await
        }
        Commands::Revert { session, selection } => {
            run(&session, &selection, Direction::Reverse).await
        }
        Commands::Restore { target } => {
            let start = Instant::now();
            let restored = apply::restore_from_backup(&target)?;
            println!("Restored {} from backup", target.display());
            println!("  Bytes restored: {}", restored);
            println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
            Ok(())
        }
    }
}

/// Load the catalog and map the target concurrently.
async fn load(session: &Session) -> Result<(Vec<PatchDefinition>, memmap2::Mmap)> {
    let patches_dir = session.patches.clone();
    let target = session.target.clone();

    let (catalog, snapshot) = tokio::try_join!(
        tokio::task::spawn_blocking(move || catalog::load_all(&patches_dir)),
        tokio::task::spawn_blocking(move || util::mmap_file(&target)),
    )?;

    let catalog = catalog.with_context(|| {
        format!("Failed to load patches from {}", session.patches.display())
    })?;
    Ok((catalog, snapshot?))
}

async fn list(session: &Session, verbose: bool) -> Result<()> {
    let (catalog, snapshot) = load(session).await?;
    let reports = status::analyze_all(&catalog, &snapshot);

    if catalog.is_empty() {
        println!("No patches found in {}", session.patches.display());
        return Ok(());
    }

    println!("Target: {}", session.target.display());
    println!("  Hash: {}", util::short_hex(&util::hash_bytes(&snapshot)));
    println!();

    for (def, report) in catalog.iter().zip(&reports) {
        println!("  [{:<9}] {:<24} {}", report.status, def.id, def.name);
        if !def.valid || (verbose && !def.description.is_empty()) {
            println!("               {}", def.description);
        }
        if verbose {
            for (i, block) in report.blocks.iter().enumerate() {
                println!(
                    "               block {}: find {}, replace {}",
                    i,
                    describe_offset(block.find_offset),
                    describe_offset(block.replace_offset)
                );
            }
        }
    }

    Ok(())
}

fn describe_offset(offset: Option<usize>) -> String {
    offset.map_or_else(|| "absent".to_string(), |o| format!("at {:#x}", o))
}

async fn run(session: &Session, selection: &Selection, direction: Direction) -> Result<()> {
    let (catalog, snapshot) = load(session).await?;
    let eligible = match direction {
        Direction::Forward => PatchStatus::Found,
        Direction::Reverse => PatchStatus::Applied,
    };

    let selected = select(&catalog, &snapshot, selection, eligible)?;
    if selected.is_empty() {
        println!("Nothing to do: no selected patch is '{}'", eligible);
        return Ok(());
    }

    let operations = plan::plan_batch(selected.iter().copied(), &snapshot, direction)?;

    let verb = match direction {
        Direction::Forward => "Applying",
        Direction::Reverse => "Reverting",
    };
    println!("{} {} patch(es)...", verb, selected.len());
    println!("  Target: {}", session.target.display());
    for def in &selected {
        println!("  - {} ({})", def.id, def.name);
    }

    let start = Instant::now();

    let result = if selection.dry_run {
        let mut buffer = snapshot.to_vec();
        drop(snapshot);
        let written = apply::apply_to_buffer(&mut buffer, &operations)?;
        println!("\nDry run: {} bytes would be written", written);
        buffer
    } else {
        // The mapping must be gone before we write back to the same file.
        drop(snapshot);
        let summary = apply::apply_to_file(&session.target, &operations, !selection.no_backup)?;
        println!("\nDone!");
        println!("  Operations: {}", summary.operations);
        println!("  Bytes written: {}", summary.bytes_written);
        if summary.backup_created {
            println!(
                "  Backup created: {}",
                apply::backup_path(&session.target).display()
            );
        }
        println!("  Hash: {}", util::short_hex(&summary.result_hash));
        util::mmap_file(&session.target)?.to_vec()
    };

    for def in &selected {
        println!("  {}: {}", def.id, status::analyze(def, &result));
    }
    println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());

    Ok(())
}

fn select<'a>(
    catalog: &'a [PatchDefinition],
    snapshot: &[u8],
    selection: &Selection,
    eligible: PatchStatus,
) -> Result<Vec<&'a PatchDefinition>> {
    if selection.all {
        return Ok(catalog
            .iter()
            .zip(status::analyze_all(catalog, snapshot))
            .filter(|(_, report)| report.status == eligible)
            .map(|(def, _)| def)
            .collect());
    }

    if selection.ids.is_empty() {
        bail!("Select patches with --id <ID> or --all");
    }

    selection
        .ids
        .iter()
        .map(|id| {
            catalog
                .iter()
                .find(|def| def.id == *id)
                .with_context(|| format!("Unknown patch id: {}", id))
        })
        .collect()
}
