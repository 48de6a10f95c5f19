use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use comfy_table::Table;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;

use zipfold_core::{CacheStatsSnapshot, FileAttributes, FileInfo};

/// Create a styled table for output
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table
}

/// Format a byte size into a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.1}G", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1}M", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1}K", b as f64 / KB as f64),
        b => format!("{b}B"),
    }
}

/// Format an entry type indicator
pub fn format_entry_type(info: &FileInfo) -> &'static str {
    if info.is_directory() { "d" } else { "-" }
}

/// RFC 3339 timestamp, `-` when unknown.
pub fn format_time(time: Option<SystemTime>) -> String {
    time.map_or_else(
        || "-".to_string(),
        |t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Attribute letters in `RHSA` order, `-` for unset flags.
pub fn format_attributes(attributes: FileAttributes) -> String {
    [
        (attributes.read_only, 'R'),
        (attributes.hidden, 'H'),
        (attributes.system, 'S'),
        (attributes.archive, 'A'),
    ]
    .iter()
    .map(|&(set, letter)| if set { letter } else { '-' })
    .collect()
}

/// Prints one row per cache to stderr.
pub fn print_cache_stats(snapshots: &[CacheStatsSnapshot]) {
    let mut table = create_table();
    table.set_header(vec!["Cache", "Entries", "Size", "Limit", "Hits", "Misses", "Hit rate", "Evictions"]);
    for snapshot in snapshots {
        table.add_row(vec![
            snapshot.name.to_string(),
            snapshot.entries.to_string(),
            snapshot.size.to_string(),
            snapshot.limit.to_string(),
            snapshot.hits.to_string(),
            snapshot.misses.to_string(),
            format!("{:.1}%", snapshot.hit_rate() * 100.0),
            snapshot.evictions.to_string(),
        ]);
    }
    eprintln!("{table}");
}
