//! Advisory lock sidecars.
//!
//! For `…/foo.xml` the sidecar is `…/.oks-lock-foo.xml.txt`; it holds a
//! single line naming the writer. The sidecar alone is only a hint: the
//! authoritative signal is an OS advisory lock held on the sidecar for
//! the lifetime of the in-process lock. A sidecar without a live OS
//! lock is stale — left behind by a crashed process — and is taken over.
//!
//! Locking is cooperative and serializes writers only; readers never
//! look at sidecars.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{OksError, Result};

use super::{host_name, user_name};

/// Sidecar path of a database file.
pub fn lock_sidecar_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".oks-lock-{name}.txt"))
}

/// The holder line of an existing sidecar, if any.
pub fn read_lock_holder(target: &Path) -> Option<String> {
    let mut text = String::new();
    File::open(lock_sidecar_path(target))
        .ok()?
        .read_to_string(&mut text)
        .ok()?;
    let line = text.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

#[cfg(unix)]
fn try_os_lock(file: &File) -> std::io::Result<bool> {
    use std::os::fd::AsRawFd;

    use nix::fcntl::{flock, FlockArg};

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(std::io::Error::from_raw_os_error(e as i32)),
    }
}

#[cfg(not(unix))]
fn try_os_lock(_file: &File) -> std::io::Result<bool> {
    // no OS advisory locks: the sidecar file itself is the signal
    Ok(true)
}

/// A held advisory lock: the open sidecar carrying the OS lock.
#[derive(Debug)]
pub struct FileLock {
    sidecar: PathBuf,
    /// Keeps the OS lock alive; dropping releases it.
    _file: File,
}

impl FileLock {
    /// Acquire the lock for `target`. A pre-existing sidecar whose OS
    /// lock is free is stale and removed before retrying.
    pub fn acquire(target: &Path) -> Result<FileLock> {
        let sidecar = lock_sidecar_path(target);

        if let Some(holder) = read_lock_holder(target) {
            let probe = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&sidecar)
                .map_err(|e| OksError::io(&sidecar, e))?;
            if !try_os_lock(&probe).map_err(|e| OksError::io(&sidecar, e))? {
                return Err(OksError::FileLocked {
                    path: target.to_path_buf(),
                    holder,
                });
            }
            // lock taken: the previous writer is gone
            warn!(
                "removing obsolete lock of {} created by \"{holder}\"",
                target.display()
            );
            drop(probe);
            fs::remove_file(&sidecar).map_err(|e| OksError::io(&sidecar, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&sidecar)
            .map_err(|e| OksError::io(&sidecar, e))?;
        if !try_os_lock(&file).map_err(|e| OksError::io(&sidecar, e))? {
            // another writer beat us to the fresh sidecar
            let holder = read_lock_holder(target).unwrap_or_default();
            return Err(OksError::FileLocked {
                path: target.to_path_buf(),
                holder,
            });
        }

        let line = format!(
            "process {} on {} started by {} at {} (UTC)",
            std::process::id(),
            host_name(),
            user_name(),
            chrono::Utc::now().format("%Y-%b-%d %H:%M:%S")
        );
        writeln!(file, "{line}").map_err(|e| OksError::io(&sidecar, e))?;
        file.flush().map_err(|e| OksError::io(&sidecar, e))?;

        Ok(FileLock {
            sidecar,
            _file: file,
        })
    }

    /// Release the OS lock and remove the sidecar.
    pub fn release(self) -> Result<()> {
        let sidecar = self.sidecar.clone();
        drop(self);
        match fs::remove_file(&sidecar) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OksError::io(&sidecar, e)),
        }
    }
}
