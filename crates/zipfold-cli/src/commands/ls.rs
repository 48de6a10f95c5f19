//! List command - list the children of a directory.
//!
//! # Examples
//!
//! ```bash
//! # List the root; archives appear as directories
//! zipfold ls ~/backups
//!
//! # List with details
//! zipfold ls -l ~/backups 2024/photos
//!
//! # Output as JSON for scripting
//! zipfold ls --json ~/backups | jq '.entries[].name'
//! ```

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use zipfold_core::{ArchiveFs, FileInfo};

use crate::output::{create_table, format_entry_type, format_size, format_time};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Path within the tree (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// One entry per line (script-friendly)
    #[arg(short = '1')]
    pub one_per_line: bool,
}

/// JSON output format for ls command
#[derive(Serialize)]
struct LsOutput<'a> {
    path: &'a str,
    entries: Vec<EntryInfo<'a>>,
}

#[derive(Serialize)]
struct EntryInfo<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    entry_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(path = %args.path))]
pub fn execute(fs: &ArchiveFs, args: &Args) -> Result<()> {
    let children = fs.list_children(&args.path)?;

    if args.json {
        print_json(&args.path, &children)?;
    } else if args.long {
        print_long_format(&children);
    } else {
        print_short_format(&children, args.one_per_line);
    }

    Ok(())
}

fn print_json(path: &str, children: &[FileInfo]) -> Result<()> {
    let entries = children
        .iter()
        .map(|info| EntryInfo {
            name: &info.name,
            entry_type: if info.is_directory() { "directory" } else { "file" },
            size: (!info.is_directory()).then_some(info.size),
        })
        .collect();
    let output = LsOutput { path, entries };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_long_format(children: &[FileInfo]) {
    let mut table = create_table();
    table.set_header(vec!["Type", "Size", "Modified", "Name"]);

    // Directories first
    for info in children.iter().filter(|info| info.is_directory()) {
        table.add_row(vec![
            format_entry_type(info).to_string(),
            "-".to_string(),
            format_time(info.times.modified),
            format!("{}/", info.name),
        ]);
    }

    // Then files
    for info in children.iter().filter(|info| !info.is_directory()) {
        table.add_row(vec![
            format_entry_type(info).to_string(),
            format_size(info.size),
            format_time(info.times.modified),
            info.name.clone(),
        ]);
    }

    println!("{table}");
}

fn print_short_format(children: &[FileInfo], one_per_line: bool) {
    let entries: Vec<String> = children
        .iter()
        .map(|info| {
            if info.is_directory() {
                format!("{}/", info.name)
            } else {
                info.name.clone()
            }
        })
        .collect();

    if entries.is_empty() {
        return;
    }
    if one_per_line || entries.len() > 10 {
        // One per line for many entries or when requested
        for entry in entries {
            println!("{entry}");
        }
    } else {
        // Space-separated for few entries
        println!("{}", entries.join("  "));
    }
}
