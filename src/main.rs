use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use rootfs_differ::{
    AcquiredTarget, CompareOptions, Comparison, DirectoryProvider, Error, RenderOptions,
    RpmDatabase, write_json, write_text,
};

/// Conventional exit status for a SIGINT-terminated process.
const INTERRUPTED: u8 = 130;

/// Show the differences between two container root filesystems.
#[derive(Parser, Debug)]
#[command(name = "rootfs-differ", version)]
struct Cli {
    /// First root filesystem (an already mounted directory).
    first: String,

    /// Second root filesystem (an already mounted directory).
    second: String,

    /// Do not compare files.
    #[arg(short = 'n', long)]
    no_files: bool,

    /// Compare the installed RPMs.
    #[arg(short, long)]
    rpms: bool,

    /// Compare RPM names only, ignoring epoch, version and release.
    #[arg(long, requires = "rpms")]
    names_only: bool,

    /// Also show RPMs common to both targets.
    #[arg(short, long)]
    verbose: bool,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Trust equal size and modification time instead of reading file contents.
    #[arg(long)]
    shallow: bool,

    /// rpm binary used to query the package databases.
    #[arg(long, default_value = "rpm")]
    rpm_bin: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    // Targets are released by their guards as `run` unwinds, so the handler only flags.
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("Quitting...");
        flag.store(true, Ordering::SeqCst);
    }) {
        log::warn!("unable to install interrupt handler: {}", e);
    }

    match run(&cli, &stop) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::Interrupted)) => {
            ExitCode::from(INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when a requested comparison could not be completed.
fn run(cli: &Cli, stop: &AtomicBool) -> anyhow::Result<bool> {
    let total_start = Instant::now();
    let provider = DirectoryProvider;
    let (first, second) = AcquiredTarget::acquire_pair(&provider, &cli.first, &cli.second)
        .context("failed to acquire comparison targets")?;

    let options = CompareOptions {
        files: !cli.no_files,
        packages: cli.rpms,
        names_only: cli.names_only,
        shallow: cli.shallow,
    };
    log::info!(
        "comparing {} and {} ({:?})",
        first.root().display(),
        second.root().display(),
        options
    );
    let rpm = RpmDatabase::new(&cli.rpm_bin);
    let result = Comparison::new(options)
        .with_source(&rpm)
        .with_interrupt(stop)
        .run(&first.target(), &second.target())
        .with_context(|| format!("failed to compare {} and {}", first.id(), second.id()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if cli.json {
        write_json(&result, &mut out)?;
    } else {
        let render = RenderOptions {
            verbose: cli.verbose,
        };
        write_text(&result, &render, &mut out)?;
    }
    out.flush()?;
    log::info!("total duration: {:.2?}", total_start.elapsed());
    Ok(!result.has_failures())
}
