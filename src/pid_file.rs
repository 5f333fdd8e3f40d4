//! One PID per file, written after a spawn and removed once the process is
//! known to be gone.
//!
//! There is no locking: two servman invocations acting on the same server
//! race, and the last writer wins.

use std::io;
use std::path::Path;

/// Returns the recorded PID, or `None` if the file is missing, unreadable,
/// or holds anything other than a positive integer.
pub fn read(path: &Path) -> Option<u32> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                debug!("could not read pid file {}: {e}", path.display());
            }
            return None;
        }
    };
    match raw.trim().parse::<i64>() {
        Ok(pid) if pid > 0 => u32::try_from(pid).ok(),
        Ok(pid) => {
            debug!("ignoring non-positive pid {pid} in {}", path.display());
            None
        }
        Err(_) => {
            debug!("ignoring unparseable pid file {}", path.display());
            None
        }
    }
}

pub fn write(path: &Path, pid: u32) -> xx::XXResult<()> {
    trace!("writing pid {pid} to {}", path.display());
    if let Some(parent) = path.parent() {
        xx::file::mkdirp(parent)?;
    }
    xx::file::write(path, pid.to_string())
}

/// Deletes the pid file. A file that is already gone is not an error.
pub fn remove(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            trace!("removed pid file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
