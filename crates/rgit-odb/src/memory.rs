use std::collections::HashMap;
use std::sync::Mutex;

use rgit_hash::ObjectId;
use rgit_object::Object;

use crate::{ObjectStore, OdbError};

/// In-memory object store, for tests and transient repositories.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<ObjectId, Object>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn contains(&self, oid: &ObjectId) -> bool {
        self.objects.lock().unwrap().contains_key(oid)
    }

    fn get(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        Ok(self.objects.lock().unwrap().get(oid).cloned())
    }

    fn add_object(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        let oid = obj.id();
        self.objects.lock().unwrap().insert(oid, obj.clone());
        Ok(oid)
    }

    fn iter_oids(&self) -> Result<Vec<ObjectId>, OdbError> {
        Ok(self.objects.lock().unwrap().keys().copied().collect())
    }
}
