use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bstr::{BString, ByteSlice};
use rgit_hash::ObjectId;
use rgit_utils::lockfile::LockFile;

use crate::container::RefsContainer;
use crate::error::RefError;
use crate::name::{check_ref_format, RefName};
use crate::packed::PackedRefs;
use crate::{RefValue, SYMREF_PREFIX};

/// Refs container backed by a control directory on disk.
///
/// Loose refs live as files under the directory (`HEAD`, `refs/heads/...`),
/// packed refs in a single `packed-refs` file. Loose always wins on read.
/// Every mutation takes the target's `.lock` file as the mutual-exclusion
/// token and rereads the current value while holding it.
pub struct DiskRefsContainer {
    path: PathBuf,
    /// Cached packed table; invalidated on packed writes made through this
    /// container. External repacks are not observed until reopen.
    packed: Mutex<Option<PackedRefs>>,
}

impl DiskRefsContainer {
    /// Create a container over the given control directory.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            packed: Mutex::new(None),
        }
    }

    /// The control directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The disk path of a ref, mapping `/` to the OS separator.
    pub fn refpath(&self, name: &[u8]) -> PathBuf {
        let mut path = self.path.clone();
        for component in name.split_str(b"/") {
            let part = component.to_os_str_lossy();
            path.push(&*part);
        }
        path
    }

    fn packed_refs_path(&self) -> PathBuf {
        self.path.join("packed-refs")
    }

    /// Read the packed file from disk, bypassing the cache.
    fn read_packed_from_disk(&self) -> Result<PackedRefs, RefError> {
        match fs::read(self.packed_refs_path()) {
            Ok(data) => PackedRefs::parse(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PackedRefs::empty()),
            Err(e) => Err(RefError::IoPath {
                path: self.packed_refs_path(),
                source: e,
            }),
        }
    }

    /// Load the packed table through the cache.
    fn load_packed(&self) -> Result<PackedRefs, RefError> {
        let mut cache = self.packed.lock().unwrap();
        if let Some(ref packed) = *cache {
            return Ok(packed.clone());
        }
        let packed = self.read_packed_from_disk()?;
        *cache = Some(packed.clone());
        Ok(packed)
    }

    /// Remove a name from the packed file, rewriting it under its own
    /// lock. The peeled side-table is rewritten in lockstep.
    fn remove_packed_ref(&self, name: &RefName) -> Result<(), RefError> {
        let packed_path = self.packed_refs_path();
        let mut lock = LockFile::acquire(&packed_path)?;

        // Reread from disk while holding the lock; the cache may be stale.
        let mut packed = self.read_packed_from_disk()?;
        if !packed.remove(name) {
            lock.abort()?;
            *self.packed.lock().unwrap() = Some(packed);
            return Ok(());
        }

        packed.write(&mut lock).map_err(|e| RefError::IoPath {
            path: packed_path,
            source: e,
        })?;
        lock.commit()?;
        *self.packed.lock().unwrap() = Some(packed);
        Ok(())
    }

    /// Create the parent directories of a loose ref path. Runs before
    /// lock acquisition.
    fn ensure_parent_dirs(&self, path: &Path) -> Result<(), RefError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefError::IoPath {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    fn collect_loose_keys(
        &self,
        dir: &Path,
        keys: &mut BTreeSet<BString>,
    ) -> Result<(), RefError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(RefError::IoPath {
                    path: dir.to_path_buf(),
                    source: e,
                })
            }
        };
        for entry in entries {
            let entry = entry.map_err(|e| RefError::IoPath {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_loose_keys(&path, keys)?;
            } else if let Ok(rel) = path.strip_prefix(&self.path) {
                let name: BString = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
                    .into();
                // The grammar filters out lock files and other debris.
                if check_ref_format(&name) {
                    keys.insert(name);
                }
            }
        }
        Ok(())
    }
}

impl RefsContainer for DiskRefsContainer {
    /// Bounded loose read: probe the first five bytes for `ref: `; on a
    /// match read one line, otherwise read 35 more bytes for a 40-hex id.
    fn read_loose(&self, name: &RefName) -> Result<Option<RefValue>, RefError> {
        let path = self.refpath(name.as_bytes());
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RefError::IoPath { path, source: e }),
        };

        let mut reader = BufReader::new(file);
        let mut header = [0u8; 5];
        let mut filled = 0;
        while filled < header.len() {
            let n = reader
                .read(&mut header[filled..])
                .map_err(|e| RefError::IoPath {
                    path: path.clone(),
                    source: e,
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if &header[..filled] == SYMREF_PREFIX {
            let mut line = Vec::new();
            reader
                .read_until(b'\n', &mut line)
                .map_err(|e| RefError::IoPath {
                    path: path.clone(),
                    source: e,
                })?;
            let target = line.trim_end_with(|c| c == '\n' || c == '\r');
            let target = std::str::from_utf8(target)
                .map_err(|_| RefError::Parse("non-UTF8 symbolic ref target".into()))?;
            Ok(Some(RefValue::Symbolic(RefName::new(target)?)))
        } else {
            let mut rest = [0u8; 35];
            let mut total = filled;
            let mut hex = Vec::with_capacity(40);
            hex.extend_from_slice(&header[..filled]);
            loop {
                let n = reader.read(&mut rest).map_err(|e| RefError::IoPath {
                    path: path.clone(),
                    source: e,
                })?;
                if n == 0 {
                    break;
                }
                let take = n.min(40 - total);
                hex.extend_from_slice(&rest[..take]);
                total += take;
                if total >= 40 {
                    break;
                }
            }
            if hex.is_empty() {
                // An empty slot file reads as absent, like a missing file.
                return Ok(None);
            }
            let hex = std::str::from_utf8(&hex)
                .map_err(|_| RefError::Parse("non-UTF8 ref contents".into()))?;
            Ok(Some(RefValue::Direct(ObjectId::from_hex(hex.trim_end())?)))
        }
    }

    fn packed_refs(&self) -> Result<PackedRefs, RefError> {
        self.load_packed()
    }

    fn all_keys(&self) -> Result<BTreeSet<BString>, RefError> {
        let mut keys = BTreeSet::new();
        if self.refpath(b"HEAD").is_file() {
            keys.insert(BString::from("HEAD"));
        }
        self.collect_loose_keys(&self.path.join("refs"), &mut keys)?;
        for name in self.load_packed()?.names() {
            keys.insert(BString::from(name.as_bytes()));
        }
        Ok(keys)
    }

    /// Peeled lookups are authoritative only when the packed file
    /// advertised peeling and the name is packed. A packed entry with no
    /// annotation is known not to be a tag, so its direct id is returned.
    fn get_peeled(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        let packed = self.load_packed()?;
        if !packed.has_peeled_header() || !packed.contains(name) {
            return Ok(None);
        }
        match packed.peeled(name) {
            Some(peeled) => Ok(Some(peeled)),
            None => Ok(packed.get(name)),
        }
    }

    fn set_if_equals(
        &self,
        name: &RefName,
        expected: Option<&ObjectId>,
        new_id: &ObjectId,
    ) -> Result<bool, RefError> {
        // CAS applies at the end of the symbolic chain; an overlong chain
        // falls back to the name itself.
        let real = match self.follow(name) {
            Ok((terminal, _)) => terminal,
            Err(RefError::SymrefDepth(_)) => name.clone(),
            Err(e) => return Err(e),
        };

        let path = self.refpath(real.as_bytes());
        self.ensure_parent_dirs(&path)?;
        let mut lock = LockFile::acquire(&path)?;

        if let Some(expected) = expected {
            // Reread while holding the lock to close the read-compare-write
            // race.
            let current = self.read_ref(&real)?;
            if current.as_ref().and_then(RefValue::as_direct).as_ref() != Some(expected) {
                lock.abort()?;
                return Ok(false);
            }
        }

        lock.write_all(&RefValue::Direct(*new_id).to_bytes())
            .map_err(|e| RefError::IoPath {
                path: path.clone(),
                source: e,
            })?;
        lock.commit()?;
        Ok(true)
    }

    fn add_if_new(&self, name: &RefName, id: &ObjectId) -> Result<bool, RefError> {
        let path = self.refpath(name.as_bytes());
        self.ensure_parent_dirs(&path)?;
        let lock = LockFile::acquire(&path)?;

        // Existence is checked under the lock: a loose file or a packed
        // entry both count.
        if path.exists() || self.load_packed()?.contains(name) {
            lock.abort()?;
            return Ok(false);
        }

        let mut lock = lock;
        lock.write_all(&RefValue::Direct(*id).to_bytes())
            .map_err(|e| RefError::IoPath {
                path: path.clone(),
                source: e,
            })?;
        lock.commit()?;
        Ok(true)
    }

    fn remove_if_equals(
        &self,
        name: &RefName,
        expected: Option<&ObjectId>,
    ) -> Result<bool, RefError> {
        let path = self.refpath(name.as_bytes());
        self.ensure_parent_dirs(&path)?;
        let lock = LockFile::acquire(&path)?;

        if let Some(expected) = expected {
            let current = self.read_ref(name)?;
            if current.as_ref().and_then(RefValue::as_direct).as_ref() != Some(expected) {
                lock.abort()?;
                return Ok(false);
            }
        }

        // The slot may exist only in the packed table.
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                lock.abort()?;
                return Err(RefError::IoPath { path, source: e });
            }
        }
        self.remove_packed_ref(name)?;

        // The lock was only ever the mutual-exclusion token; nothing is
        // committed over the now-deleted file.
        lock.abort()?;
        Ok(true)
    }

    fn set_symbolic_ref(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        let path = self.refpath(name.as_bytes());
        self.ensure_parent_dirs(&path)?;
        let mut lock = LockFile::acquire(&path)?;
        lock.write_all(&RefValue::Symbolic(target.clone()).to_bytes())
            .map_err(|e| RefError::IoPath {
                path: path.clone(),
                source: e,
            })?;
        lock.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(fill: u8) -> ObjectId {
        ObjectId::from_bytes(&[fill; 20]).unwrap()
    }

    fn name(s: &str) -> RefName {
        RefName::new(s).unwrap()
    }

    fn container() -> (tempfile::TempDir, DiskRefsContainer) {
        let dir = tempfile::tempdir().unwrap();
        let refs = DiskRefsContainer::new(dir.path());
        (dir, refs)
    }

    fn write_packed(dir: &Path, contents: &str) {
        fs::write(dir.join("packed-refs"), contents).unwrap();
    }

    #[test]
    fn read_loose_direct() {
        let (dir, refs) = container();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(
            dir.path().join("refs/heads/master"),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n",
        )
        .unwrap();

        let value = refs.read_loose(&name("refs/heads/master")).unwrap().unwrap();
        assert_eq!(value.as_direct(), Some(oid(0xaa)));
    }

    #[test]
    fn read_loose_symbolic_first_line_only() {
        let (dir, refs) = container();
        fs::write(dir.path().join("HEAD"), "ref: refs/heads/master\njunk\n").unwrap();

        let value = refs.read_loose(&name("HEAD")).unwrap().unwrap();
        assert_eq!(value.as_symbolic().unwrap().as_str(), "refs/heads/master");
    }

    #[test]
    fn read_loose_missing_is_none() {
        let (_dir, refs) = container();
        assert!(refs.read_loose(&name("refs/heads/missing")).unwrap().is_none());
    }

    #[test]
    fn read_ref_prefers_loose_over_packed() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/master\n",
        );
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(
            dir.path().join("refs/heads/master"),
            "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n",
        )
        .unwrap();

        let value = refs.read_ref(&name("refs/heads/master")).unwrap().unwrap();
        assert_eq!(value.as_direct(), Some(oid(0xbb)));
    }

    #[test]
    fn read_ref_falls_back_to_packed() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/packed\n",
        );
        let value = refs.read_ref(&name("refs/heads/packed")).unwrap().unwrap();
        assert_eq!(value.as_direct(), Some(oid(0xaa)));
    }

    #[test]
    fn set_if_equals_any_then_matching() {
        let (_dir, refs) = container();
        let master = name("refs/heads/master");

        assert!(refs.set_if_equals(&master, None, &oid(0xaa)).unwrap());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));

        assert!(refs
            .set_if_equals(&master, Some(&oid(0xaa)), &oid(0xbb))
            .unwrap());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xbb));
    }

    #[test]
    fn set_if_equals_mismatch_leaves_value() {
        let (_dir, refs) = container();
        let master = name("refs/heads/master");
        refs.set_ref(&master, &oid(0xaa)).unwrap();

        assert!(!refs
            .set_if_equals(&master, Some(&oid(0xcc)), &oid(0xbb))
            .unwrap());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));
    }

    #[test]
    fn set_if_equals_follows_symref_to_terminal() {
        let (dir, refs) = container();
        let head = name("HEAD");
        let master = name("refs/heads/master");

        refs.set_symbolic_ref(&head, &master).unwrap();
        assert!(refs.set_if_equals(&head, None, &oid(0xaa)).unwrap());

        // The write landed on the branch, not on HEAD itself.
        assert!(refs.read_loose(&head).unwrap().unwrap().as_symbolic().is_some());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));
        assert!(dir.path().join("refs/heads/master").is_file());
    }

    #[test]
    fn set_if_equals_checks_packed_value() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/packed\n",
        );
        let packed_name = name("refs/heads/packed");

        // The packed value is the current value for CAS purposes.
        assert!(refs
            .set_if_equals(&packed_name, Some(&oid(0xaa)), &oid(0xbb))
            .unwrap());
        assert_eq!(refs.resolve(&packed_name).unwrap(), oid(0xbb));
    }

    #[test]
    fn add_if_new_rejects_existing_loose() {
        let (_dir, refs) = container();
        let master = name("refs/heads/master");
        refs.set_ref(&master, &oid(0xaa)).unwrap();

        assert!(!refs.add_if_new(&master, &oid(0xbb)).unwrap());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));
    }

    #[test]
    fn add_if_new_rejects_existing_packed() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/packed\n",
        );
        assert!(!refs.add_if_new(&name("refs/heads/packed"), &oid(0xbb)).unwrap());
    }

    #[test]
    fn add_if_new_creates_fresh() {
        let (_dir, refs) = container();
        let feature = name("refs/heads/feature");
        assert!(refs.add_if_new(&feature, &oid(0xaa)).unwrap());
        assert_eq!(refs.resolve(&feature).unwrap(), oid(0xaa));
    }

    #[test]
    fn remove_if_equals_removes_loose_and_packed() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/master\n",
        );
        let master = name("refs/heads/master");
        refs.set_ref(&master, &oid(0xbb)).unwrap();

        assert!(refs.remove_if_equals(&master, Some(&oid(0xbb))).unwrap());
        assert!(refs.read_ref(&master).unwrap().is_none());
        assert!(!dir.path().join("refs/heads/master").exists());

        let data = fs::read_to_string(dir.path().join("packed-refs")).unwrap();
        assert!(!data.contains("refs/heads/master"));
    }

    #[test]
    fn remove_if_equals_mismatch_keeps_ref() {
        let (_dir, refs) = container();
        let master = name("refs/heads/master");
        refs.set_ref(&master, &oid(0xaa)).unwrap();

        assert!(!refs.remove_if_equals(&master, Some(&oid(0xbb))).unwrap());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));
    }

    #[test]
    fn remove_packed_only_entry() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/packed\n",
        );
        let packed_name = name("refs/heads/packed");

        assert!(refs.remove_if_equals(&packed_name, Some(&oid(0xaa))).unwrap());
        assert!(refs.read_ref(&packed_name).unwrap().is_none());
    }

    #[test]
    fn follow_chain_to_id() {
        let (_dir, refs) = container();
        let head = name("HEAD");
        let master = name("refs/heads/master");
        refs.set_symbolic_ref(&head, &master).unwrap();
        refs.set_ref(&master, &oid(0xdd)).unwrap();

        let (terminal, id) = refs.follow(&head).unwrap();
        assert_eq!(terminal, master);
        assert_eq!(id, Some(oid(0xdd)));
    }

    #[test]
    fn follow_broken_link_returns_none() {
        let (_dir, refs) = container();
        let head = name("HEAD");
        refs.set_symbolic_ref(&head, &name("refs/heads/unborn")).unwrap();

        let (terminal, id) = refs.follow(&head).unwrap();
        assert_eq!(terminal.as_str(), "refs/heads/unborn");
        assert_eq!(id, None);
    }

    #[test]
    fn follow_cycle_is_depth_error_and_resolve_unknown() {
        let (_dir, refs) = container();
        let a = name("refs/heads/a");
        let b = name("refs/heads/b");
        refs.set_symbolic_ref(&a, &b).unwrap();
        refs.set_symbolic_ref(&b, &a).unwrap();

        assert!(matches!(refs.follow(&a), Err(RefError::SymrefDepth(_))));
        assert!(matches!(refs.resolve(&a), Err(RefError::NotFound(_))));
    }

    #[test]
    fn keys_merge_loose_packed_and_head() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/packed\n",
        );
        refs.set_ref(&name("refs/heads/master"), &oid(0xbb)).unwrap();
        refs.set_ref(&name("refs/tags/v1.0"), &oid(0xcc)).unwrap();
        refs.set_symbolic_ref(&name("HEAD"), &name("refs/heads/master"))
            .unwrap();

        let keys = refs.keys(None).unwrap();
        let expected: BTreeSet<BString> = [
            "HEAD",
            "refs/heads/master",
            "refs/heads/packed",
            "refs/tags/v1.0",
        ]
        .into_iter()
        .map(BString::from)
        .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn keys_deduplicate_loose_and_packed() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/master\n",
        );
        refs.set_ref(&name("refs/heads/master"), &oid(0xbb)).unwrap();

        let keys = refs.keys(None).unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn lock_files_are_not_enumerated() {
        let (dir, refs) = container();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(dir.path().join("refs/heads/master"), "aa".repeat(20) + "\n").unwrap();
        fs::write(dir.path().join("refs/heads/master.lock"), "").unwrap();

        let keys = refs.keys(None).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&BString::from("refs/heads/master")));
    }

    #[test]
    fn subkeys_are_base_relative() {
        let (_dir, refs) = container();
        refs.set_ref(&name("refs/heads/master"), &oid(0xaa)).unwrap();
        refs.set_ref(&name("refs/heads/feature/x"), &oid(0xbb)).unwrap();
        refs.set_ref(&name("refs/tags/v1.0"), &oid(0xcc)).unwrap();

        let keys = refs.keys(Some("refs/heads")).unwrap();
        let expected: BTreeSet<BString> = ["feature/x", "master"]
            .into_iter()
            .map(BString::from)
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn as_dict_resolves_and_skips_unborn() {
        let (_dir, refs) = container();
        refs.set_ref(&name("refs/heads/master"), &oid(0xaa)).unwrap();
        refs.set_symbolic_ref(&name("HEAD"), &name("refs/heads/master"))
            .unwrap();
        refs.set_symbolic_ref(&name("refs/heads/broken"), &name("refs/heads/unborn"))
            .unwrap();

        let dict = refs.as_dict(None).unwrap();
        assert_eq!(dict.get(&BString::from("HEAD")), Some(&oid(0xaa)));
        assert_eq!(dict.get(&BString::from("refs/heads/master")), Some(&oid(0xaa)));
        assert!(!dict.contains_key(&BString::from("refs/heads/broken")));
    }

    #[test]
    fn get_peeled_without_header_is_none() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/tags/v1.0\n",
        );
        assert!(refs.get_peeled(&name("refs/tags/v1.0")).unwrap().is_none());
    }

    #[test]
    fn get_peeled_with_header() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "# pack-refs with: peeled\n\
             aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/tags/v1.0\n\
             ^bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n\
             cccccccccccccccccccccccccccccccccccccccc refs/heads/master\n",
        );

        // Annotated tag: the recorded peeled id.
        assert_eq!(
            refs.get_peeled(&name("refs/tags/v1.0")).unwrap(),
            Some(oid(0xbb))
        );
        // Packed non-tag: its direct id.
        assert_eq!(
            refs.get_peeled(&name("refs/heads/master")).unwrap(),
            Some(oid(0xcc))
        );
        // Loose ref: unknown.
        refs.set_ref(&name("refs/heads/loose"), &oid(0xdd)).unwrap();
        assert!(refs.get_peeled(&name("refs/heads/loose")).unwrap().is_none());
    }

    #[test]
    fn packed_cache_invalidated_by_own_removal() {
        let (dir, refs) = container();
        write_packed(
            dir.path(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa refs/heads/a\n\
             bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb refs/heads/b\n",
        );
        // Warm the cache.
        assert_eq!(refs.packed_refs().unwrap().len(), 2);

        refs.remove_ref(&name("refs/heads/a")).unwrap();
        assert_eq!(refs.packed_refs().unwrap().len(), 1);
        assert_eq!(
            refs.read_ref(&name("refs/heads/b")).unwrap().unwrap().as_direct(),
            Some(oid(0xbb))
        );
    }

    #[test]
    fn concurrent_lock_holder_blocks_mutation() {
        let (dir, refs) = container();
        let master = name("refs/heads/master");
        refs.set_ref(&master, &oid(0xaa)).unwrap();

        // Simulate another process holding the lock.
        let held = LockFile::acquire(dir.path().join("refs/heads/master")).unwrap();
        assert!(refs.set_if_equals(&master, None, &oid(0xbb)).is_err());
        drop(held);

        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));
    }
}
