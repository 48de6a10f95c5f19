//! Tree command - recursive directory listing.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use zipfold_core::{ArchiveFs, FileInfo};

use super::join_path;
use crate::output::print_cache_stats;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Starting path (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Maximum depth to descend
    #[arg(short, long, value_name = "N")]
    pub depth: Option<usize>,

    /// Print cache statistics to stderr afterwards
    #[arg(long)]
    pub stats: bool,
}

#[derive(Default)]
struct Totals {
    directories: usize,
    files: usize,
}

#[instrument(level = "info", name = "cmd::tree", skip_all, fields(path = %args.path, depth = ?args.depth))]
pub fn execute(fs: &ArchiveFs, args: &Args) -> Result<()> {
    // Fails early with NotADirectory for files.
    let children = fs.list_children(&args.path)?;
    println!("{}", args.path);

    let mut totals = Totals::default();
    print_level(fs, &args.path, children, "", 1, args.depth, &mut totals)?;
    println!("\n{} directories, {} files", totals.directories, totals.files);

    if args.stats {
        print_cache_stats(&fs.cache_stats());
    }
    Ok(())
}

fn print_level(
    fs: &ArchiveFs,
    path: &str,
    children: Vec<FileInfo>,
    prefix: &str,
    depth: usize,
    max_depth: Option<usize>,
    totals: &mut Totals,
) -> Result<()> {
    let count = children.len();
    for (i, info) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let connector = if last { "└── " } else { "├── " };
        if info.is_directory() {
            totals.directories += 1;
            println!("{prefix}{connector}{}/", info.name);
            if max_depth.is_none_or(|max| depth < max) {
                let child_path = join_path(path, &info.name);
                let grandchildren = fs.list_children(&child_path)?;
                let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
                print_level(fs, &child_path, grandchildren, &child_prefix, depth + 1, max_depth, totals)?;
            }
        } else {
            totals.files += 1;
            println!("{prefix}{connector}{}", info.name);
        }
    }
    Ok(())
}
