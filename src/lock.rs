//! File locking between the server and index builds.
//!
//! Uses flock() for advisory locking on the data directory.
//! - Server: holds a shared lock for its lifetime, several servers may share
//! - Build: takes an exclusive lock, so it refuses to run while any server
//!   is reading the collection

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Lock file name placed in the base directory
const LOCK_FILE_NAME: &str = "wayfarer.lock";

/// A held file lock that releases on drop
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    /// Take the exclusive (writer) lock without waiting.
    pub fn try_exclusive(base_path: &Path) -> io::Result<Self> {
        let file = Self::open(base_path)?;
        Self::try_lock(&file, LockKind::Exclusive)?;
        Ok(FileLock { file })
    }

    /// Take a shared (reader) lock without waiting.
    pub fn try_shared(base_path: &Path) -> io::Result<Self> {
        let file = Self::open(base_path)?;
        Self::try_lock(&file, LockKind::Shared)?;
        Ok(FileLock { file })
    }

    fn open(base_path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(base_path.join(LOCK_FILE_NAME))
    }

    #[cfg(unix)]
    fn try_lock(file: &File, kind: LockKind) -> io::Result<()> {
        let operation = match kind {
            LockKind::Exclusive => libc::LOCK_EX,
            LockKind::Shared => libc::LOCK_SH,
        };

        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, operation | libc::LOCK_NB) };
        if result != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock
                || err.raw_os_error() == Some(libc::EWOULDBLOCK)
                || err.raw_os_error() == Some(libc::EAGAIN)
            {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    match kind {
                        LockKind::Exclusive => {
                            "Data directory is in use (a server is running or another build is in progress)"
                        }
                        LockKind::Shared => "An index build is in progress",
                    },
                ));
            }
            return Err(err);
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock(_file: &File, _kind: LockKind) -> io::Result<()> {
        // On non-Unix platforms, we don't implement locking (yet)
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum LockKind {
    Exclusive,
    Shared,
}

#[cfg(unix)]
impl Drop for FileLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // Release the lock - ignore errors on drop
        unsafe { libc::flock(fd, libc::LOCK_UN) };
    }
}
