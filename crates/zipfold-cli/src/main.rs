#![deny(unsafe_code)]

// Use mimalloc for reduced allocation latency (enabled by default).
// Disable with `--no-default-features` if debugging allocator issues.
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zipfold_core::{ArchiveFs, CacheError, ConfigError, FsConfig, VfsError};

use crate::commands::{cat, ls, stat, tree};
use crate::config::ConfigFileError;

/// Browse directories of ZIP archives as one read-only tree
#[derive(Parser)]
#[command(name = "zipfold")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # List a backup directory; every .zip shows up as a folder
    zipfold ls ~/backups

    # Look inside an archive
    zipfold ls -l ~/backups 2024/photos

    # Print one file from inside an archive
    zipfold cat ~/backups 2024/photos/readme.txt

    # Show the whole tree two levels deep, with cache statistics
    zipfold tree ~/backups --depth 2 --stats
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: $ZIPFOLD_CONFIG_DIR/config.toml or the platform config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Entries below this many bytes are buffered in memory
    #[arg(long, value_name = "BYTES", global = true)]
    cutoff: Option<u64>,

    /// Directory for temp files backing large entries
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Concurrent readers per archive
    #[arg(long, value_name = "N", global = true)]
    max_readers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List directory contents
    Ls(RootCommand<ls::Args>),

    /// Write file contents to stdout
    Cat(RootCommand<cat::Args>),

    /// Show file or directory details
    Stat(RootCommand<stat::Args>),

    /// Show directory tree
    Tree(RootCommand<tree::Args>),
}

/// Wrapper for commands that operate on a mounted root
#[derive(Parser, Clone)]
pub struct RootCommand<T: clap::Args> {
    /// Host directory (or single .zip file) to browse
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    #[command(flatten)]
    pub args: T,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // Only print error if not quiet mode (quiet is parsed separately for this)
            let is_quiet = std::env::args().any(|a| a == "-q" || a == "--quiet");
            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let fs_config = load_fs_config(&cli)?;

    match cli.command {
        Commands::Ls(cmd) => execute_root_command(&cmd, fs_config, ls::execute),
        Commands::Cat(cmd) => execute_root_command(&cmd, fs_config, cat::execute),
        Commands::Stat(cmd) => execute_root_command(&cmd, fs_config, stat::execute),
        Commands::Tree(cmd) => execute_root_command(&cmd, fs_config, tree::execute),
    }
}

/// Config file first, then command-line overrides on top.
fn load_fs_config(cli: &Cli) -> Result<FsConfig> {
    let mut fs_config = config::load(cli.config.as_deref())?;
    if let Some(cutoff) = cli.cutoff {
        fs_config = fs_config.small_file_cutoff_bytes(cutoff);
    }
    if let Some(dir) = &cli.cache_dir {
        fs_config = fs_config.with_large_file_dir(dir);
    }
    if let Some(readers) = cli.max_readers {
        fs_config = fs_config.max_readers_per_archive(readers);
    }
    Ok(fs_config)
}

/// Execute a command against a freshly opened root
fn execute_root_command<T, F>(cmd: &RootCommand<T>, fs_config: FsConfig, f: F) -> Result<()>
where
    T: clap::Args,
    F: FnOnce(&ArchiveFs, &T) -> Result<()>,
{
    let fs = ArchiveFs::new(&cmd.root, fs_config)
        .with_context(|| format!("Failed to open {}", cmd.root.display()))?;
    f(&fs, &cmd.args)
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
///
/// This approach is more robust than string matching because it doesn't depend
/// on error message wording, which could change between versions.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.downcast_ref::<ConfigFileError>().is_some() || cause.downcast_ref::<ConfigError>().is_some() {
            return exit_code::CONFIG_ERROR;
        }

        if let Some(vfs_err) = cause.downcast_ref::<VfsError>() {
            match vfs_err {
                VfsError::NotFound(_) | VfsError::Cache(CacheError::Construction(_)) => {
                    return exit_code::NOT_FOUND;
                }
                VfsError::NotADirectory(_) => return exit_code::NOT_A_DIRECTORY,
                VfsError::Config(_) => return exit_code::CONFIG_ERROR,
                VfsError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                    return exit_code::NOT_FOUND;
                }
                _ => {}
            }
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && io_err.kind() == io::ErrorKind::NotFound
        {
            return exit_code::NOT_FOUND;
        }
    }

    exit_code::GENERAL_ERROR
}
