use std::collections::{HashMap, HashSet, VecDeque};

use bstr::BString;
use rgit_hash::ObjectId;
use rgit_object::Object;

use crate::{ObjectStore, OdbError};

/// The negotiation walker: yields commit ids the owning side may have and
/// receives acknowledgements for the ones the peer already stores.
pub trait GraphWalker {
    /// The next candidate commit, or `None` when exhausted.
    fn next_head(&mut self) -> Option<ObjectId>;

    /// Acknowledge that the peer has `oid`; its ancestry needs no further
    /// negotiation.
    fn ack(&mut self, oid: ObjectId);
}

/// A [`GraphWalker`] over the ancestry of a set of local heads.
///
/// Heads are handed out one at a time; each one's parents are discovered
/// lazily from the object store and queued behind it. `ack` prunes the
/// already-discovered ancestry of the acknowledged commit.
pub struct ObjectStoreGraphWalker<'a, S> {
    store: &'a S,
    heads: HashSet<ObjectId>,
    parents_seen: HashMap<ObjectId, Vec<ObjectId>>,
}

impl<'a, S: ObjectStore> ObjectStoreGraphWalker<'a, S> {
    pub fn new(store: &'a S, heads: Vec<ObjectId>) -> Self {
        Self {
            store,
            heads: heads.into_iter().collect(),
            parents_seen: HashMap::new(),
        }
    }
}

impl<S: ObjectStore> GraphWalker for ObjectStoreGraphWalker<'_, S> {
    fn next_head(&mut self) -> Option<ObjectId> {
        let oid = *self.heads.iter().next()?;
        self.heads.remove(&oid);

        let parents = match self.store.get(&oid) {
            Ok(Some(Object::Commit(c))) => c.parents,
            _ => Vec::new(),
        };
        for parent in &parents {
            if !self.parents_seen.contains_key(parent) {
                self.heads.insert(*parent);
            }
        }
        self.parents_seen.insert(oid, parents);
        Some(oid)
    }

    fn ack(&mut self, oid: ObjectId) {
        let mut pending = vec![oid];
        let mut visited = HashSet::new();
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            self.heads.remove(&current);
            if let Some(parents) = self.parents_seen.get(&current) {
                pending.extend(parents.iter().copied());
            }
        }
    }
}

/// Worklist entry: id, optional path hint, and whether the object is known
/// to be a leaf (its children need no expansion).
type TodoEntry = (ObjectId, Option<BString>, bool);

/// Lazily enumerates the objects reachable from `wants` that are not
/// covered by the `haves` set.
///
/// Commits enqueue their tree and parents, trees enqueue their entries
/// (blobs as leaves), and tags enqueue their targets. When a `tagged` map
/// is supplied, emitting an id that is the target of a tag also emits the
/// tag object itself.
pub struct MissingObjectFinder<'a, S: ObjectStore> {
    store: &'a S,
    sha_done: HashSet<ObjectId>,
    to_send: VecDeque<TodoEntry>,
    tagged: HashMap<ObjectId, ObjectId>,
    progress: Option<Box<dyn FnMut(&str) + 'a>>,
}

impl<'a, S: ObjectStore> MissingObjectFinder<'a, S> {
    pub fn new(
        store: &'a S,
        haves: Vec<ObjectId>,
        wants: Vec<ObjectId>,
        progress: Option<Box<dyn FnMut(&str) + 'a>>,
        tagged: Option<HashMap<ObjectId, ObjectId>>,
    ) -> Self {
        let sha_done: HashSet<ObjectId> = haves.into_iter().collect();
        let to_send = wants
            .into_iter()
            .filter(|w| !sha_done.contains(w))
            .map(|w| (w, None, false))
            .collect();
        Self {
            store,
            sha_done,
            to_send,
            tagged: tagged.unwrap_or_default(),
            progress,
        }
    }

    /// Lower bound on the number of objects still queued.
    pub fn queued(&self) -> usize {
        self.to_send.len()
    }

    fn add_todo(&mut self, entry: TodoEntry) {
        if !self.sha_done.contains(&entry.0) {
            self.to_send.push_back(entry);
        }
    }

    fn expand(&mut self, obj: Object) {
        match obj {
            Object::Commit(commit) => {
                self.add_todo((commit.tree, Some(BString::new(Vec::new())), false));
                for parent in commit.parents {
                    self.add_todo((parent, None, false));
                }
            }
            Object::Tree(tree) => {
                for entry in tree.entries {
                    // Submodule links point outside this store.
                    if entry.mode.raw() == 0o160000 {
                        continue;
                    }
                    let leaf = !entry.mode.is_tree();
                    self.add_todo((entry.oid, Some(entry.name), leaf));
                }
            }
            Object::Tag(tag) => {
                self.add_todo((tag.target, None, false));
            }
            Object::Blob(_) => {}
        }
    }
}

impl<S: ObjectStore> Iterator for MissingObjectFinder<'_, S> {
    type Item = Result<(ObjectId, Option<BString>), OdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (oid, name, leaf) = self.to_send.pop_front()?;
            if self.sha_done.contains(&oid) {
                continue;
            }
            if !leaf {
                match self.store.get(&oid) {
                    Ok(Some(obj)) => self.expand(obj),
                    Ok(None) => return Some(Err(OdbError::NotFound(oid))),
                    Err(e) => return Some(Err(e)),
                }
            }
            if let Some(tag) = self.tagged.get(&oid).copied() {
                self.add_todo((tag, None, true));
            }
            self.sha_done.insert(oid);
            if let Some(ref mut progress) = self.progress {
                progress(&format!("counting objects: {}\r", self.sha_done.len()));
            }
            return Some(Ok((oid, name)));
        }
    }
}

/// Adapts a [`MissingObjectFinder`] into `(id, object)` pairs, reading each
/// object as it is yielded.
pub struct ObjectEntries<'a, S: ObjectStore> {
    store: &'a S,
    finder: MissingObjectFinder<'a, S>,
}

impl<'a, S: ObjectStore> ObjectEntries<'a, S> {
    pub fn new(store: &'a S, finder: MissingObjectFinder<'a, S>) -> Self {
        Self { store, finder }
    }

    /// Lower bound on the number of entries still queued.
    pub fn queued(&self) -> usize {
        self.finder.queued()
    }
}

impl<S: ObjectStore> Iterator for ObjectEntries<'_, S> {
    type Item = Result<(ObjectId, Object), OdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.finder.next()? {
            Ok((oid, _name)) => match self.store.get_required(&oid) {
                Ok(obj) => Some(Ok((oid, obj))),
                Err(e) => Some(Err(e)),
            },
            Err(e) => Some(Err(e)),
        }
    }
}
