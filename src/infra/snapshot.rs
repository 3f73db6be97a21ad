//! Line-oriented snapshot of pending task names.
//!
//! The format is deliberately dumb: one task name per line, UTF-8, no header
//! or trailer. It survives controller restarts well enough to re-schedule
//! what was pending, and nothing more is promised.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

/// Writes the given names to `path`, one per line, replacing any previous
/// snapshot.
pub fn write_names(path: &Path, names: &[String]) -> io::Result<()> {
    let mut body = String::with_capacity(names.iter().map(|n| n.len() + 1).sum());
    for name in names {
        body.push_str(name);
        body.push('\n');
    }
    fs::write(path, body)
}

/// Reads a snapshot back. `Ok(None)` when no snapshot exists; blank lines
/// are dropped.
pub fn read_names(path: &Path) -> io::Result<Option<Vec<String>>> {
    match fs::read_to_string(path) {
        Ok(body) => Ok(Some(
            body.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Deletes a consumed snapshot. Failure only costs a duplicate re-schedule
/// on the next load, so it is logged at debug and ignored.
pub fn discard(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        debug!(path = %path.display(), %error, "could not delete the queue snapshot");
    }
}
