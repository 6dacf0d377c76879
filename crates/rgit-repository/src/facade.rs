use std::collections::{BTreeMap, HashMap, VecDeque};

use bstr::{BString, ByteSlice};
use rgit_config::ConfigFile;
use rgit_hash::ObjectId;
use rgit_index::Index;
use rgit_object::{Blob, Commit, Object, Tag, Tree};
use rgit_odb::{GraphWalker, ObjectEntries, ObjectStore, ObjectStoreGraphWalker};
use rgit_ref::{RefName, RefsContainer};
use rgit_utils::date::{GitDate, Signature};

use crate::error::RepoError;

/// Bound on tag-chain unwrapping during peeling.
const MAX_PEEL_DEPTH: usize = 10;

/// Inputs to [`Repository::do_commit`]. A committer ident (`Name <email>`)
/// is mandatory; everything else has the usual defaults: author falls
/// back to committer, timestamps to now, offsets to UTC, and the tree to
/// the finalized index.
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub message: BString,
    pub committer: Option<BString>,
    pub author: Option<BString>,
    pub commit_timestamp: Option<i64>,
    pub commit_timezone: Option<i32>,
    pub author_timestamp: Option<i64>,
    pub author_timezone: Option<i32>,
    pub tree: Option<ObjectId>,
}

impl CommitOptions {
    /// A commit with message and committer, everything else defaulted.
    pub fn new(message: impl Into<BString>, committer: impl Into<BString>) -> Self {
        Self {
            message: message.into(),
            committer: Some(committer.into()),
            ..Default::default()
        }
    }
}

/// The object-graph façade over an object store and a refs container.
pub trait Repository {
    type Store: ObjectStore;
    type Refs: RefsContainer;

    /// The object store backing this repository.
    fn object_store(&self) -> &Self::Store;

    /// The refs container backing this repository.
    fn refs(&self) -> &Self::Refs;

    /// The repository configuration.
    fn get_config(&self) -> Result<ConfigFile, RepoError>;

    /// Open the working-tree index.
    fn open_index(&self) -> Result<Index, RepoError> {
        Err(RepoError::NoIndexPresent)
    }

    // --- Typed object retrieval ---

    /// Read an object by id, failing when it is unknown.
    fn get_object(&self, oid: &ObjectId) -> Result<Object, RepoError> {
        self.object_store()
            .get(oid)?
            .ok_or(RepoError::UnknownObject(*oid))
    }

    /// Read an object that must be a commit.
    fn get_commit(&self, oid: &ObjectId) -> Result<Commit, RepoError> {
        match self.get_object(oid)? {
            Object::Commit(commit) => Ok(commit),
            _ => Err(RepoError::NotCommit(*oid)),
        }
    }

    /// Read an object that must be a tree.
    fn get_tree(&self, oid: &ObjectId) -> Result<Tree, RepoError> {
        match self.get_object(oid)? {
            Object::Tree(tree) => Ok(tree),
            _ => Err(RepoError::NotTree(*oid)),
        }
    }

    /// Read an object that must be a blob.
    fn get_blob(&self, oid: &ObjectId) -> Result<Blob, RepoError> {
        match self.get_object(oid)? {
            Object::Blob(blob) => Ok(blob),
            _ => Err(RepoError::NotBlob(*oid)),
        }
    }

    /// Read an object that must be a tag.
    fn get_tag(&self, oid: &ObjectId) -> Result<Tag, RepoError> {
        match self.get_object(oid)? {
            Object::Tag(tag) => Ok(tag),
            _ => Err(RepoError::NotTag(*oid)),
        }
    }

    /// The parent ids of a commit.
    fn get_parents(&self, oid: &ObjectId) -> Result<Vec<ObjectId>, RepoError> {
        Ok(self.get_commit(oid)?.parents)
    }

    // --- Ref surface ---

    /// Resolve a ref name to an id through any symbolic chain.
    fn resolve_ref(&self, name: &str) -> Result<ObjectId, RepoError> {
        let name = RefName::new(name).map_err(|_| RepoError::UnknownRef(name.to_string()))?;
        match self.refs().resolve(&name) {
            Ok(id) => Ok(id),
            Err(rgit_ref::RefError::NotFound(n)) => Err(RepoError::UnknownRef(n)),
            Err(e) => Err(e.into()),
        }
    }

    /// The id HEAD points at.
    fn head(&self) -> Result<ObjectId, RepoError> {
        self.resolve_ref("HEAD")
    }

    /// All refs resolved to ids.
    fn get_refs(&self) -> Result<BTreeMap<BString, ObjectId>, RepoError> {
        Ok(self.refs().as_dict(None)?)
    }

    /// Indexed access: a 40-hex string reads an object; anything else is
    /// a ref name resolved to its object.
    fn lookup(&self, name: &str) -> Result<Object, RepoError> {
        if name.len() == 40 {
            if let Ok(oid) = ObjectId::from_hex(name) {
                return self.get_object(&oid);
            }
        }
        let oid = self.resolve_ref(name)?;
        self.get_object(&oid)
    }

    /// Point a ref at an id. Only `refs/…` names and `HEAD` are settable.
    fn set_ref(&self, name: &str, id: &ObjectId) -> Result<(), RepoError> {
        let name = settable_ref(name)?;
        Ok(self.refs().set_ref(&name, id)?)
    }

    /// Delete a ref. Only `refs/…` names and `HEAD` can be deleted.
    fn remove_ref(&self, name: &str) -> Result<(), RepoError> {
        let name = settable_ref(name)?;
        Ok(self.refs().remove_ref(&name)?)
    }

    // --- Peeling ---

    /// The fully-peeled id of a ref: the cached peeled value when the
    /// container has one, otherwise the result of unwrapping tag objects
    /// until a non-tag is reached.
    fn get_peeled(&self, name: &str) -> Result<ObjectId, RepoError> {
        let ref_name =
            RefName::new(name).map_err(|_| RepoError::UnknownRef(name.to_string()))?;
        if let Some(cached) = self.refs().get_peeled(&ref_name)? {
            return Ok(cached);
        }

        let mut oid = match self.refs().resolve(&ref_name) {
            Ok(id) => id,
            Err(rgit_ref::RefError::NotFound(n)) => return Err(RepoError::UnknownRef(n)),
            Err(e) => return Err(e.into()),
        };
        let mut depth = 0;
        loop {
            match self.get_object(&oid)? {
                Object::Tag(tag) => {
                    depth += 1;
                    if depth > MAX_PEEL_DEPTH {
                        return Err(RepoError::TagCycle(oid));
                    }
                    oid = tag.target;
                }
                _ => return Ok(oid),
            }
        }
    }

    // --- History ---

    /// The commits reachable from `head`, newest first.
    ///
    /// The result is built as an ascending-`commit_time` list with stable
    /// insertion on ties, then reversed; with monotone times along
    /// ancestry this is a topological linearization. A referenced id that
    /// is absent is `MissingCommit`; one that is not a commit is
    /// `NotCommit`. Merges receive no special handling.
    fn revision_history(&self, head: ObjectId) -> Result<Vec<(ObjectId, Commit)>, RepoError> {
        let mut pending: VecDeque<ObjectId> = VecDeque::from([head]);
        let mut history: Vec<(ObjectId, Commit)> = Vec::new();

        while let Some(oid) = pending.pop_front() {
            let commit = match self.object_store().get(&oid)? {
                Some(Object::Commit(commit)) => commit,
                Some(_) => return Err(RepoError::NotCommit(oid)),
                None => return Err(RepoError::MissingCommit(oid)),
            };
            if history.iter().any(|(seen, _)| *seen == oid) {
                continue;
            }
            let mut i = 0;
            for (_, known) in &history {
                if known.commit_time() > commit.commit_time() {
                    break;
                }
                i += 1;
            }
            pending.extend(commit.parents.iter().copied());
            history.insert(i, (oid, commit));
        }

        history.reverse();
        Ok(history)
    }

    // --- Fetch ---

    /// A negotiation walker over this repository's branch heads (or the
    /// given ones).
    fn graph_walker(
        &self,
        heads: Option<Vec<ObjectId>>,
    ) -> Result<ObjectStoreGraphWalker<'_, Self::Store>, RepoError> {
        let heads = match heads {
            Some(heads) => heads,
            None => self
                .refs()
                .as_dict(Some("refs/heads"))?
                .into_values()
                .collect(),
        };
        Ok(self.object_store().graph_walker(heads))
    }

    /// Enumerate the objects a peer is missing: pick wants from our refs,
    /// drain the peer's graph walker into a haves set, and return the lazy
    /// `(id, object)` stream covering the difference.
    fn fetch_objects<'a, F, G>(
        &'a self,
        determine_wants: F,
        graph_walker: &mut G,
        progress: Option<Box<dyn FnMut(&str) + 'a>>,
        get_tagged: Option<HashMap<ObjectId, ObjectId>>,
    ) -> Result<ObjectEntries<'a, Self::Store>, RepoError>
    where
        F: FnOnce(&BTreeMap<BString, ObjectId>) -> Vec<ObjectId>,
        G: GraphWalker,
    {
        let refs = self.get_refs()?;
        let wants = determine_wants(&refs);
        let haves = if wants.is_empty() {
            Vec::new()
        } else {
            self.object_store().find_common_revisions(graph_walker)?
        };
        let finder = self
            .object_store()
            .find_missing_objects(haves, wants, progress, get_tagged);
        Ok(self.object_store().iter_shas(finder))
    }

    /// Fetch every ref's objects into `target`, returning our refs.
    fn fetch<T: Repository>(
        &self,
        target: &T,
    ) -> Result<BTreeMap<BString, ObjectId>, RepoError> {
        let mut walker = target.graph_walker(None)?;
        let entries =
            self.fetch_objects(|refs| refs.values().copied().collect(), &mut walker, None, None)?;
        target.object_store().add_objects(entries)?;
        self.get_refs()
    }

    // --- Commit authoring ---

    /// Create a commit from the index (or an explicit tree) and advance
    /// HEAD, compare-and-swapped against its value at the start of the
    /// call.
    fn do_commit(&self, options: CommitOptions) -> Result<ObjectId, RepoError> {
        let CommitOptions {
            message,
            committer,
            author,
            commit_timestamp,
            commit_timezone,
            author_timestamp,
            author_timezone,
            tree,
        } = options;

        let committer = committer.ok_or(RepoError::MissingCommitter)?;

        let tree = match tree {
            Some(tree) => tree,
            None => {
                let index = self.open_index()?;
                index.commit(self.object_store())?
            }
        };

        let commit_time = commit_timestamp.unwrap_or_else(|| GitDate::now().timestamp);
        let commit_tz = commit_timezone.unwrap_or(0);
        let author = author.unwrap_or_else(|| committer.clone());
        let author_time = author_timestamp.unwrap_or(commit_time);
        let author_tz = author_timezone.unwrap_or(commit_tz);

        let committer =
            Signature::from_ident(committer.as_bstr(), GitDate::new(commit_time, commit_tz))
                .map_err(RepoError::Util)?;
        let author = Signature::from_ident(author.as_bstr(), GitDate::new(author_time, author_tz))
            .map_err(RepoError::Util)?;

        // The new commit continues the current branch; an unborn HEAD
        // yields a root commit.
        let head_name = RefName::new("HEAD").map_err(RepoError::Ref)?;
        let current_head = match self.refs().resolve(&head_name) {
            Ok(id) => Some(id),
            Err(rgit_ref::RefError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let commit = Commit {
            tree,
            parents: current_head.iter().copied().collect(),
            author,
            committer,
            extra_headers: Vec::new(),
            message,
        };
        let oid = self.object_store().add_object(&Object::Commit(commit))?;

        if !self
            .refs()
            .set_if_equals(&head_name, current_head.as_ref(), &oid)?
        {
            return Err(RepoError::HeadChanged);
        }
        Ok(oid)
    }
}

/// Names accepted by the set/delete surface: `refs/…` or `HEAD`.
fn settable_ref(name: &str) -> Result<RefName, RepoError> {
    if name == "HEAD" || name.starts_with("refs/") {
        RefName::new(name).map_err(|_| RepoError::InvalidRefName(name.to_string()))
    } else {
        Err(RepoError::InvalidRefName(name.to_string()))
    }
}
