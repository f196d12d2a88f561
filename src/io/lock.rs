use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the lock file placed inside a locked directory
pub const LOCK_FILE: &str = ".prepdeck.lock";

/// How long writers wait for a busy store by default
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

const MAX_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path} is still held after {waited:?}; another prepdeck process is writing")]
    Busy { path: PathBuf, waited: Duration },
}

/// Exclusive advisory lock over a storage directory, held until dropped.
///
/// Every writer of a tracking store takes it: the TUI, CLI invocations and
/// other machines sharing a remote directory.
pub struct DirLock {
    path: PathBuf,
    _file: File,
}

impl DirLock {
    /// Lock `dir`, creating it if needed and backing off between attempts
    /// until `wait` has passed.
    pub fn acquire(dir: &Path, wait: Duration) -> Result<Self, LockError> {
        let path = dir.join(LOCK_FILE);
        let file = open_lock_file(dir, &path).map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;

        let started = Instant::now();
        let mut backoff = Duration::from_millis(2);
        loop {
            if flock_exclusive(&file).is_ok() {
                return Ok(DirLock { path, _file: file });
            }
            let waited = started.elapsed();
            if waited >= wait {
                return Err(LockError::Busy { path, waited });
            }
            std::thread::sleep(backoff.min(wait - waited));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    pub fn acquire_default(dir: &Path) -> Result<Self, LockError> {
        Self::acquire(dir, DEFAULT_WAIT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The lock file is never removed, so every waiter contends on one inode.
fn open_lock_file(dir: &Path, path: &Path) -> io::Result<File> {
    std::fs::create_dir_all(dir)?;
    File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

#[cfg(unix)]
fn flock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    // SAFETY: the descriptor stays open for the duration of the call.
    match unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_missing_directory_and_releases_on_drop() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("remote").join("nested");

        let first = DirLock::acquire_default(&dir).unwrap();
        assert_eq!(first.path(), dir.join(LOCK_FILE));
        drop(first);

        assert!(DirLock::acquire(&dir, Duration::from_millis(20)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn held_lock_reports_busy() {
        let tmp = TempDir::new().unwrap();
        let _held = DirLock::acquire_default(tmp.path()).unwrap();
        match DirLock::acquire(tmp.path(), Duration::from_millis(30)) {
            Err(LockError::Busy { waited, .. }) => assert!(waited >= Duration::from_millis(30)),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("lock acquired twice"),
        }
    }
}
