//! Autoupdate CLI - console front end for `autoupdate-core`.
//!
//! Checks a repository for newer releases, prints the changelog and
//! downloads and starts the installer for this platform.

pub mod args;
mod output;
mod update_cmd;

pub use args::{Cli, LogLevel};
pub use output::format_release_notes;
