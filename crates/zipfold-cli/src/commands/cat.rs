use std::io::{self, Write};

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{debug, instrument};

use zipfold_core::ArchiveFs;

use crate::output::print_cache_stats;

/// Bytes requested per `read_file` call.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// File path within the tree
    pub file: String,

    /// Print cache statistics to stderr afterwards
    #[arg(long)]
    pub stats: bool,
}

#[instrument(level = "info", name = "cmd::cat", skip_all, fields(file = %args.file))]
pub fn execute(fs: &ArchiveFs, args: &Args) -> Result<()> {
    let mut stdout = io::stdout().lock();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;
    loop {
        let n = fs.read_file(&args.file, &mut buf, offset)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n])?;
        offset += n as u64;
    }
    stdout.flush()?;
    debug!(bytes = offset, "Wrote file to stdout");

    if args.stats {
        print_cache_stats(&fs.cache_stats());
    }
    Ok(())
}
