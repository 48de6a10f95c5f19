//! Stat command - show the details of one node.

use anyhow::Result;
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use zipfold_core::{ArchiveFs, FileAttributes, FileInfo};

use crate::output::{create_table, format_attributes, format_time};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Path within the tree
    pub path: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatOutput<'a> {
    path: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    entry_type: &'static str,
    size: u64,
    mode: String,
    attributes: FileAttributes,
    created: String,
    modified: String,
    accessed: String,
}

#[instrument(level = "info", name = "cmd::stat", skip_all, fields(path = %args.path))]
pub fn execute(fs: &ArchiveFs, args: &Args) -> Result<()> {
    let info = fs.file_info(&args.path)?;
    let node_path = fs.lookup(&args.path)?.path();

    if args.json {
        let output = StatOutput {
            path: &node_path,
            name: &info.name,
            entry_type: if info.is_directory() { "directory" } else { "file" },
            size: info.size,
            mode: format!("{:o}", info.mode()),
            attributes: info.attributes,
            created: format_time(info.times.created),
            modified: format_time(info.times.modified),
            accessed: format_time(info.times.accessed),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_table(&node_path, &info);
    }
    Ok(())
}

fn print_table(path: &str, info: &FileInfo) {
    let mut table = create_table();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Path".to_string(), path.to_string()]);
    table.add_row(vec![
        "Type".to_string(),
        if info.is_directory() { "directory" } else { "file" }.to_string(),
    ]);
    table.add_row(vec!["Size".to_string(), info.size.to_string()]);
    table.add_row(vec!["Mode".to_string(), format!("{:o}", info.mode())]);
    table.add_row(vec!["Attributes".to_string(), format_attributes(info.attributes)]);
    table.add_row(vec!["Created".to_string(), format_time(info.times.created)]);
    table.add_row(vec!["Modified".to_string(), format_time(info.times.modified)]);
    table.add_row(vec!["Accessed".to_string(), format_time(info.times.accessed)]);
    println!("{table}");
}
