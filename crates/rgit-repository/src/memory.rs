use rgit_config::ConfigFile;
use rgit_odb::MemoryObjectStore;
use rgit_ref::DictRefsContainer;

use crate::error::RepoError;
use crate::facade::Repository;

/// A repository held entirely in memory, for tests. It has no index and
/// no configuration file.
#[derive(Default)]
pub struct MemoryRepo {
    object_store: MemoryObjectStore,
    refs: DictRefsContainer,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepo {
    type Store = MemoryObjectStore;
    type Refs = DictRefsContainer;

    fn object_store(&self) -> &Self::Store {
        &self.object_store
    }

    fn refs(&self) -> &Self::Refs {
        &self.refs
    }

    fn get_config(&self) -> Result<ConfigFile, RepoError> {
        Ok(ConfigFile::default())
    }
}
