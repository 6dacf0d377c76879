use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{LockError, UtilError};
use crate::Result;

/// Extension appended to the target path while a writer holds it.
const LOCK_SUFFIX: &str = ".lock";

/// Scoped write handle for atomic file replacement.
///
/// `acquire` creates `<target>.lock` exclusively; that file doubles as the
/// cross-process mutex and as the staging area for the replacement
/// contents. `commit` renames it over the target; `abort`, or dropping
/// the handle, unlinks it and leaves the target as it was. Every exit
/// path either commits or removes the lock file.
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    /// Open while the lock is held; released by commit and abort. Drop
    /// unlinks the lock file only when this is still present.
    file: Option<File>,
}

impl LockFile {
    /// Take the lock for `target`, failing if another writer holds it.
    pub fn acquire(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let mut lock_path = target.clone().into_os_string();
        lock_path.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_path);

        let open = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path);
        let file = match open {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(UtilError::Lock(LockError::Held { path: lock_path }))
            }
            Err(e) => {
                return Err(UtilError::Lock(LockError::Io {
                    op: "create",
                    path: lock_path,
                    source: e,
                }))
            }
        };

        Ok(Self {
            target,
            lock_path,
            file: Some(file),
        })
    }

    /// The `.lock` path backing this handle.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Publish the staged contents: sync, then rename the lock file over
    /// the target.
    pub fn commit(mut self) -> Result<()> {
        if let Some(file) = &self.file {
            if let Err(e) = file.sync_all() {
                // Drop removes the lock file, keeping the rollback
                // guarantee.
                return Err(self.io_err("sync", e));
            }
        }
        // Close the handle before the rename; Drop must no longer unlink.
        self.file.take();

        if let Err(e) = fs::rename(&self.lock_path, &self.target) {
            let _ = fs::remove_file(&self.lock_path);
            return Err(self.io_err("rename", e));
        }
        Ok(())
    }

    /// Discard the staged contents and release the lock.
    pub fn abort(mut self) -> Result<()> {
        if self.file.take().is_some() {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                return Err(self.io_err("unlink", e));
            }
        }
        Ok(())
    }

    fn io_err(&self, op: &'static str, source: io::Error) -> UtilError {
        UtilError::Lock(LockError::Io {
            op,
            path: self.lock_path.clone(),
            source,
        })
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.file {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("lock already released")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.file {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_in(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("refs-slot")
    }

    fn stage(target: &Path, contents: &[u8]) -> LockFile {
        let mut lock = LockFile::acquire(target).unwrap();
        lock.write_all(contents).unwrap();
        lock
    }

    #[test]
    fn commit_replaces_target_and_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        fs::write(&target, b"0000000000000000000000000000000000000000\n").unwrap();

        let lock = stage(&target, b"da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        let lock_path = lock.lock_path().to_path_buf();
        assert!(lock_path.ends_with("refs-slot.lock"));
        lock.commit().unwrap();

        assert!(!lock_path.exists());
        assert_eq!(
            fs::read(&target).unwrap(),
            b"da39a3ee5e6b4b0d3255bfef95601890afd80709\n"
        );

        // The slot is lockable again once released.
        stage(&target, b"next").abort().unwrap();
    }

    #[test]
    fn commit_creates_a_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);

        stage(&target, b"fresh contents\n").commit().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"fresh contents\n");
    }

    #[test]
    fn abort_and_drop_both_preserve_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        fs::write(&target, b"kept").unwrap();

        stage(&target, b"aborted").abort().unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"kept");

        {
            let _dropped = stage(&target, b"dropped");
        }
        assert_eq!(fs::read(&target).unwrap(), b"kept");
        assert!(!dir.path().join("refs-slot.lock").exists());
    }

    #[test]
    fn contention_reports_held_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);

        let holder = LockFile::acquire(&target).unwrap();
        match LockFile::acquire(&target) {
            Err(UtilError::Lock(LockError::Held { path })) => {
                assert_eq!(path, holder.lock_path());
            }
            other => panic!("expected Held, got {:?}", other.map(|_| ())),
        }

        drop(holder);
        LockFile::acquire(&target).unwrap().abort().unwrap();
    }

    #[test]
    fn sequential_writers_serialize_and_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);

        for round in 0..3u8 {
            let mut lock = LockFile::acquire(&target).unwrap();
            lock.write_all(&[b'0' + round]).unwrap();
            lock.flush().unwrap();
            lock.commit().unwrap();
        }
        assert_eq!(fs::read(&target).unwrap(), b"2");
    }
}
