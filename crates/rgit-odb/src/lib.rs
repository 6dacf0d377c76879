//! Object storage for the rgit version-control library.
//!
//! The [`ObjectStore`] trait is the keyed container the repository layer
//! consumes: lookup and insertion by [`ObjectId`], enumeration, and the
//! fetch-negotiation surface (`find_common_revisions`,
//! `find_missing_objects`, `iter_shas`, `graph_walker`). Two backends are
//! provided: [`DiskObjectStore`] over a loose-object directory and
//! [`MemoryObjectStore`] for tests.

mod disk;
mod error;
mod memory;
mod walk;

pub use disk::DiskObjectStore;
pub use error::OdbError;
pub use memory::MemoryObjectStore;
pub use walk::{GraphWalker, MissingObjectFinder, ObjectEntries, ObjectStoreGraphWalker};

use std::collections::HashMap;

use rgit_hash::ObjectId;
use rgit_object::Object;

/// Keyed, content-addressed object storage.
pub trait ObjectStore: Send + Sync {
    /// Check whether an object exists.
    fn contains(&self, oid: &ObjectId) -> bool;

    /// Read an object. `Ok(None)` when the id is unknown.
    fn get(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError>;

    /// Store an object, returning its id. Idempotent.
    fn add_object(&self, obj: &Object) -> Result<ObjectId, OdbError>;

    /// Enumerate every object id in the store.
    fn iter_oids(&self) -> Result<Vec<ObjectId>, OdbError>;

    /// Read an object, failing when the id is unknown.
    fn get_required(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        self.get(oid)?.ok_or(OdbError::NotFound(*oid))
    }

    /// Store a stream of objects, e.g. the result of a fetch.
    fn add_objects<I>(&self, objects: I) -> Result<(), OdbError>
    where
        I: IntoIterator<Item = Result<(ObjectId, Object), OdbError>>,
        Self: Sized,
    {
        for entry in objects {
            let (_, obj) = entry?;
            self.add_object(&obj)?;
        }
        Ok(())
    }

    /// Negotiation: drain the remote's walker, acknowledging every commit
    /// we already have. Returns the acknowledged ids.
    fn find_common_revisions<G: GraphWalker>(
        &self,
        walker: &mut G,
    ) -> Result<Vec<ObjectId>, OdbError>
    where
        Self: Sized,
    {
        let mut haves = Vec::new();
        while let Some(oid) = walker.next_head() {
            if self.contains(&oid) {
                haves.push(oid);
                walker.ack(oid);
            }
        }
        Ok(haves)
    }

    /// Enumerate the objects reachable from `wants` but not from the
    /// `haves` set, lazily.
    fn find_missing_objects<'a>(
        &'a self,
        haves: Vec<ObjectId>,
        wants: Vec<ObjectId>,
        progress: Option<Box<dyn FnMut(&str) + 'a>>,
        tagged: Option<HashMap<ObjectId, ObjectId>>,
    ) -> MissingObjectFinder<'a, Self>
    where
        Self: Sized,
    {
        MissingObjectFinder::new(self, haves, wants, progress, tagged)
    }

    /// Adapt a missing-object walk into `(id, object)` pairs.
    fn iter_shas<'a>(&'a self, finder: MissingObjectFinder<'a, Self>) -> ObjectEntries<'a, Self>
    where
        Self: Sized,
    {
        ObjectEntries::new(self, finder)
    }

    /// A walker over the ancestry of the given local heads, for use as the
    /// `haves` side of negotiation.
    fn graph_walker(&self, heads: Vec<ObjectId>) -> ObjectStoreGraphWalker<'_, Self>
    where
        Self: Sized,
    {
        ObjectStoreGraphWalker::new(self, heads)
    }
}
