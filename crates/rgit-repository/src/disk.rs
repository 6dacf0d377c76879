use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::BString;
use rgit_config::ConfigFile;
use rgit_index::{Index, IndexEntry, StatData};
use rgit_object::{Blob, FileMode, Object};
use rgit_odb::{DiskObjectStore, ObjectStore};
use rgit_ref::{DiskRefsContainer, RefName, RefsContainer};
use rgit_utils::lockfile::LockFile;

use crate::error::RepoError;
use crate::facade::Repository;

/// Name of the index file inside the control dir.
const INDEX_FILENAME: &str = "index";

/// Directories created inside a fresh control dir.
const BASE_DIRECTORIES: &[&str] = &[
    "branches",
    "refs",
    "refs/tags",
    "refs/heads",
    "hooks",
    "info",
];

const DEFAULT_DESCRIPTION: &str = "Unnamed repository";

const DEFAULT_CONFIG: &str = "[core]
\trepositoryformatversion = 0
\tfilemode = true
\tbare = false
\tlogallrefupdates = true
";

/// A git repository backed by local disk.
pub struct Repo {
    root: PathBuf,
    controldir: PathBuf,
    bare: bool,
    object_store: DiskObjectStore,
    refs: DiskRefsContainer,
}

impl Repo {
    /// Open the repository at `root`: a working tree with `.git/objects/`,
    /// or a bare layout with `objects/` and `refs/` at the top.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RepoError> {
        let root = root.as_ref().to_path_buf();
        let (controldir, bare) = if root.join(".git").join("objects").is_dir() {
            (root.join(".git"), false)
        } else if root.join("objects").is_dir() && root.join("refs").is_dir() {
            (root.clone(), true)
        } else {
            return Err(RepoError::NotGitRepository(root));
        };

        let object_store = DiskObjectStore::open(controldir.join("objects"));
        let refs = DiskRefsContainer::new(&controldir);
        Ok(Self {
            root,
            controldir,
            bare,
            object_store,
            refs,
        })
    }

    /// Walk up from `start` until a repository layout is found.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        let start = start.as_ref().to_path_buf();
        let mut current = start.clone();
        loop {
            match Self::open(&current) {
                Ok(repo) => return Ok(repo),
                Err(RepoError::NotGitRepository(_)) => {}
                Err(e) => return Err(e),
            }
            match current.parent() {
                Some(parent) if parent != current => current = parent.to_path_buf(),
                _ => return Err(RepoError::NotGitRepository(start)),
            }
        }
    }

    /// Create a repository with a working tree: `<path>/.git/` plus the
    /// standard skeleton.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        let controldir = path.join(".git");
        fs::create_dir(&controldir)?;
        Self::init_bare(&controldir)?;
        Self::open(path)
    }

    /// Create the standard control-dir skeleton directly at `path`.
    pub fn init_bare(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        for dir in BASE_DIRECTORIES {
            fs::create_dir_all(path.join(dir))?;
        }
        DiskObjectStore::init(path.join("objects"))?;

        let repo = Self::open(path)?;
        repo.refs.set_symbolic_ref(
            &RefName::new("HEAD").map_err(RepoError::Ref)?,
            &RefName::new("refs/heads/master").map_err(RepoError::Ref)?,
        )?;
        repo.put_named_file("description", DEFAULT_DESCRIPTION.as_bytes())?;
        repo.put_named_file("config", DEFAULT_CONFIG.as_bytes())?;
        repo.put_named_file("info/exclude", b"")?;
        Ok(repo)
    }

    /// The working tree root (equals the control dir for bare repos).
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The control directory.
    pub fn controldir(&self) -> &Path {
        &self.controldir
    }

    /// Whether this repository has no working tree.
    pub fn is_bare(&self) -> bool {
        self.bare
    }

    /// Read a file from the control dir. `Ok(None)` when absent.
    pub fn get_named_file(&self, path: &str) -> Result<Option<Vec<u8>>, RepoError> {
        let full = self.controldir.join(path.trim_start_matches('/'));
        match fs::read(&full) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a file in the control dir via the locked-write protocol.
    pub fn put_named_file(&self, path: &str, contents: &[u8]) -> Result<(), RepoError> {
        let full = self.controldir.join(path.trim_start_matches('/'));
        let mut lock = LockFile::acquire(&full).map_err(RepoError::Util)?;
        lock.write_all(contents)?;
        lock.commit().map_err(RepoError::Util)?;
        Ok(())
    }

    /// Path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.controldir.join(INDEX_FILENAME)
    }

    /// Whether an index file exists.
    pub fn has_index(&self) -> bool {
        self.index_path().exists()
    }

    /// Stage a set of working-tree paths (relative to the repository
    /// root): hash each file into the object store and update its index
    /// entry; paths that no longer exist are dropped from the index.
    pub fn stage<P: AsRef<str>>(&self, paths: &[P]) -> Result<(), RepoError> {
        let mut index = self.open_index()?;
        for path in paths {
            let path = path.as_ref();
            let full = self.root.join(path);
            let meta = match fs::metadata(&full) {
                Ok(meta) => meta,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    index.remove(path.as_bytes());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let blob = Object::Blob(Blob::new(fs::read(&full)?));
            let oid = self.object_store.add_object(&blob)?;
            index.insert(IndexEntry {
                path: BString::from(path),
                oid,
                mode: mode_from_metadata(&meta),
                stat: StatData::from_metadata(&meta),
            });
        }
        index.write()?;
        Ok(())
    }
}

#[cfg(unix)]
fn mode_from_metadata(meta: &fs::Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 != 0 {
        FileMode::Executable
    } else {
        FileMode::Regular
    }
}

#[cfg(not(unix))]
fn mode_from_metadata(_meta: &fs::Metadata) -> FileMode {
    FileMode::Regular
}

impl Repository for Repo {
    type Store = DiskObjectStore;
    type Refs = DiskRefsContainer;

    fn object_store(&self) -> &Self::Store {
        &self.object_store
    }

    fn refs(&self) -> &Self::Refs {
        &self.refs
    }

    fn get_config(&self) -> Result<ConfigFile, RepoError> {
        let config_path = self.controldir.join("config");
        if !config_path.is_file() {
            return Ok(ConfigFile::default());
        }
        Ok(ConfigFile::open(config_path)?)
    }

    fn open_index(&self) -> Result<Index, RepoError> {
        if !self.has_index() {
            return Err(RepoError::NoIndexPresent);
        }
        Ok(Index::open(self.index_path())?)
    }
}
