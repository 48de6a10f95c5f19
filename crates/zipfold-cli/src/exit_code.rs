//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad arguments); raised by clap itself
#[allow(dead_code)]
pub const USAGE_ERROR: u8 = 2;

/// File or directory not found in the tree
pub const NOT_FOUND: u8 = 3;

/// A directory operation was given a file
pub const NOT_A_DIRECTORY: u8 = 4;

/// Configuration file unreadable, malformed or invalid
pub const CONFIG_ERROR: u8 = 5;
