//! Console presentation of update results.

use std::io::{ErrorKind, Write, stdout};

use anyhow::Result;
use autoupdate_core::VersionEntry;

/// Normalize release notes for the terminal.
///
/// Converts `\r\n` and lone `\r` line breaks to `\n` and drops trailing
/// whitespace.
pub fn format_release_notes(notes: &str) -> String {
    notes
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end()
        .to_string()
}

/// Print a line, handling broken pipe gracefully.
/// Returns Ok(true) if printed successfully, Ok(false) if pipe was closed.
pub fn print_line(line: &str) -> Result<bool> {
    match writeln!(stdout(), "{}", line) {
        Ok(()) => match stdout().flush() {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(false),
            Err(e) => Err(e.into()),
        },
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Print one changelog entry with its indented notes.
pub fn print_entry(entry: &VersionEntry) -> Result<bool> {
    if !print_line(&format!("\n  v{}", entry.version_string))? {
        return Ok(false);
    }
    let notes = format_release_notes(&entry.version_changes);
    if notes.is_empty() {
        return print_line("    (no release notes)");
    }
    for line in notes.lines() {
        if !print_line(&format!("    {line}"))? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Rewrite the current terminal line with download progress.
/// Returns Ok(false) if the pipe was closed.
pub fn print_progress(percent: f32) -> Result<bool> {
    let mut out = stdout();
    match write!(out, "\r  Downloading... {percent:>5.1}%").and_then(|()| out.flush()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// True if the entry points at an installer this platform can run.
///
/// Entries without a matching file name (the release page fallback) must be
/// installed by hand.
pub fn is_installable(entry: &VersionEntry, extension: &str) -> bool {
    !entry.version_update_filename.is_empty() && entry.version_update_filename.ends_with(extension)
}
