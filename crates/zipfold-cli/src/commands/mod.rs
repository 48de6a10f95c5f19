pub mod cat;
pub mod ls;
pub mod stat;
pub mod tree;

/// Joins a virtual directory path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches(['/', '\\']);
    format!("{parent}/{name}")
}
