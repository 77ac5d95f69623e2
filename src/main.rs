//! foldertree — folder sizes, filename search and expand-all over a lazily
//! loaded directory tree.
//!
//! Thin binary entry point. All logic lives in the `foldertree-core` crate;
//! this front-end owns the tree model and pumps the coordinator the way an
//! interactive view would.

use anyhow::Context;
use clap::Parser;
use foldertree_core::config::ScanSettings;
use foldertree_core::coordinator::{Activity, ScanCoordinator};
use foldertree_core::expand::TICK_INTERVAL;
use foldertree_core::export::export_to_file;
use foldertree_core::model::size::{format_count, format_size};
use foldertree_core::model::LazyFsModel;
use foldertree_core::scanner::progress::SizePhase;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// How often a progress line is logged while waiting.
const STATUS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "foldertree")]
#[command(about = "Background folder sizes, filename search and expand-all for a directory tree")]
#[command(version)]
struct Args {
    /// Root directory of the tree
    root: PathBuf,

    /// Compute cumulative folder sizes
    #[arg(short, long)]
    sizes: bool,

    /// Count directories first so size progress has a total
    #[arg(long)]
    precount: bool,

    /// Find files and folders whose name contains NEEDLE (case-insensitive)
    #[arg(long, value_name = "NEEDLE")]
    search: Option<String>,

    /// Expand every directory in the tree
    #[arg(short, long)]
    expand_all: bool,

    /// Write folder sizes to FILE (.json for JSON, otherwise CSV)
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Number of largest folders to print
    #[arg(long, value_name = "N", default_value = "10")]
    top: usize,

    /// Settings file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialise structured logging. Results go to stdout, logs to stderr.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("foldertree starting");

    let mut settings = match &args.config {
        Some(path) => ScanSettings::load_or_default(path),
        None => ScanSettings::default(),
    };
    if args.sizes || args.export.is_some() {
        settings.compute_folder_sizes = true;
    }
    if args.precount {
        settings.precount_for_progress = true;
    }

    let root = args
        .root
        .canonicalize()
        .with_context(|| format!("cannot open {}", args.root.display()))?;

    let mut model = LazyFsModel::new(root.clone());
    let mut coord = ScanCoordinator::new(settings);
    coord.set_root(root.clone())?;

    if let Some(needle) = &args.search {
        coord.search(needle)?;
    }
    if args.expand_all {
        coord.expand_all()?;
    }

    let started = Instant::now();
    let mut last_status = Instant::now();
    while coord.is_busy() {
        coord.pump(&mut model);
        if last_status.elapsed() >= STATUS_INTERVAL {
            log_status(&coord);
            last_status = Instant::now();
        }
        std::thread::sleep(TICK_INTERVAL);
    }
    // Pick up anything sent between the last pump and the producers exiting.
    coord.pump(&mut model);
    coord.shutdown();
    tracing::info!("All work finished in {:.1?}", started.elapsed());

    print_results(&args, &coord, &model);

    if let Some(dest) = &args.export {
        export_to_file(coord.sizes(), coord.root(), dest)
            .with_context(|| format!("exporting to {}", dest.display()))?;
        println!("Exported {} folders to {}", coord.sizes().len(), dest.display());
    }

    Ok(())
}

fn log_status(coord: &ScanCoordinator) {
    let sizes = coord.size_status();
    if sizes.activity == Activity::Running {
        let phase = match sizes.phase {
            Some(SizePhase::RollingUp) => "rolling up",
            _ => "walking",
        };
        match sizes.percent() {
            Some(pct) => tracing::info!(
                "Sizes {phase}: {pct}% ({})",
                sizes.current_path.display()
            ),
            None => tracing::info!(
                "Sizes {phase}: {} folders ({})",
                format_count(sizes.current as u64),
                sizes.current_path.display()
            ),
        }
    }
    let search = coord.search_status();
    if search.activity == Activity::Running {
        tracing::info!(
            "Search: {} entries visited, {} matches",
            format_count(search.visited),
            coord.matches().map_or(0, |m| m.len())
        );
    }
    if let Some(stats) = coord.expand_stats().filter(|_| coord.is_expanding()) {
        tracing::info!(
            "Expand: {} expanded, {} queued",
            stats.expanded,
            stats.queued
        );
    }
}

fn print_results(args: &Args, coord: &ScanCoordinator, model: &LazyFsModel) {
    if coord.settings().compute_folder_sizes {
        let status = coord.size_status();
        println!(
            "Folder sizes ({:?}, {} folders):",
            status.activity,
            format_count(coord.sizes().len() as u64)
        );
        for (path, size) in coord.sizes().largest(args.top) {
            println!("  {:>10}  {}", format_size(size), path.display());
        }
        if !coord.errors().is_empty() {
            println!("  {} entries could not be read", coord.errors().len());
        }
    }

    if let Some(matches) = coord.matches() {
        println!(
            "Matches for {:?} ({}):",
            matches.needle(),
            format_count(matches.len() as u64)
        );
        for path in matches.iter() {
            println!("  {}", path.display());
        }
    }

    if let Some(stats) = coord.expand_stats() {
        println!(
            "Expanded {} directories ({} skipped, {} nodes loaded)",
            format_count(stats.expanded),
            stats.skipped,
            format_count(model.len() as u64)
        );
    }
}
