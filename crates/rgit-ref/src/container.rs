use std::collections::{BTreeMap, BTreeSet};

use bstr::{BString, ByteSlice};
use rgit_hash::ObjectId;

use crate::error::RefError;
use crate::name::RefName;
use crate::packed::PackedRefs;
use crate::RefValue;

/// Hard bound on symbolic reference chains.
const MAX_FOLLOW_DEPTH: usize = 5;

/// A container for refs: a mapping-like read surface plus an atomic
/// compare-and-swap write surface.
///
/// Backends supply the storage primitives (`read_loose`, `packed_refs`,
/// `all_keys`, and the four mutations); chain following, precedence, and
/// enumeration logic are provided on top of them.
///
/// Concurrency failures (a CAS mismatch, an add colliding with an existing
/// name) are reported as `Ok(false)`, never as errors. I/O failures under
/// a mutation propagate after the lock is rolled back.
pub trait RefsContainer: Send + Sync {
    /// The raw contents of the loose slot, without following symrefs.
    fn read_loose(&self, name: &RefName) -> Result<Option<RefValue>, RefError>;

    /// A snapshot of the packed table. Backends cache this and invalidate
    /// on their own packed writes; external repacks are not observed.
    fn packed_refs(&self) -> Result<PackedRefs, RefError>;

    /// All well-formed names present, loose or packed, plus `HEAD` when it
    /// exists.
    fn all_keys(&self) -> Result<BTreeSet<BString>, RefError>;

    /// The cached peeled id of a ref, when the backend can know it.
    fn get_peeled(&self, _name: &RefName) -> Result<Option<ObjectId>, RefError> {
        Ok(None)
    }

    /// Follow symrefs to the terminal name, then replace its value with
    /// `new_id` if the current value equals `expected` (`None` = any).
    fn set_if_equals(
        &self,
        name: &RefName,
        expected: Option<&ObjectId>,
        new_id: &ObjectId,
    ) -> Result<bool, RefError>;

    /// Create a slot that must not yet exist, loose or packed.
    fn add_if_new(&self, name: &RefName, id: &ObjectId) -> Result<bool, RefError>;

    /// Delete a slot (loose and packed) if its current value equals
    /// `expected` (`None` = any). Does not follow symrefs.
    fn remove_if_equals(
        &self,
        name: &RefName,
        expected: Option<&ObjectId>,
    ) -> Result<bool, RefError>;

    /// Make `name` point at another ref, overwriting unconditionally.
    /// The left-hand side is not followed.
    fn set_symbolic_ref(&self, name: &RefName, target: &RefName) -> Result<(), RefError>;

    /// Read a slot: loose wins, then packed, else unknown.
    fn read_ref(&self, name: &RefName) -> Result<Option<RefValue>, RefError> {
        if let Some(value) = self.read_loose(name)? {
            return Ok(Some(value));
        }
        Ok(self.packed_refs()?.get(name).map(RefValue::Direct))
    }

    /// Whether a slot exists, loose or packed.
    fn contains(&self, name: &RefName) -> Result<bool, RefError> {
        Ok(self.read_ref(name)?.is_some())
    }

    /// Follow a symbolic chain. Returns the last name visited and the id
    /// it resolves to, or `None` when the chain breaks on a missing link.
    /// A chain longer than the depth bound is `RefError::SymrefDepth`;
    /// callers that only need an id should use [`resolve`](Self::resolve),
    /// which reports it as unknown.
    fn follow(&self, name: &RefName) -> Result<(RefName, Option<ObjectId>), RefError> {
        let mut current = name.clone();
        let mut depth = 0;
        loop {
            let Some(value) = self.read_ref(&current)? else {
                return Ok((current, None));
            };
            depth += 1;
            if depth > MAX_FOLLOW_DEPTH {
                return Err(RefError::SymrefDepth(name.to_string()));
            }
            match value {
                RefValue::Direct(id) => return Ok((current, Some(id))),
                RefValue::Symbolic(target) => current = target,
            }
        }
    }

    /// Resolve a name to an id through any symbolic chain. Broken links,
    /// cycles, and over-long chains all report the name as unknown.
    fn resolve(&self, name: &RefName) -> Result<ObjectId, RefError> {
        match self.follow(name) {
            Ok((_, Some(id))) => Ok(id),
            Ok((_, None)) => Err(RefError::NotFound(name.to_string())),
            Err(RefError::SymrefDepth(_)) => Err(RefError::NotFound(name.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Names present under `base`, relative to it.
    fn subkeys(&self, base: &str) -> Result<BTreeSet<BString>, RefError> {
        let mut keys = BTreeSet::new();
        for name in self.all_keys()? {
            if let Some(rest) = name.strip_prefix(base.as_bytes()) {
                let rest = rest.trim_start_with(|c| c == '/');
                if !rest.is_empty() {
                    keys.insert(BString::from(rest));
                }
            }
        }
        Ok(keys)
    }

    /// Names in this container: all of them, or those under `base`
    /// (relative to it).
    fn keys(&self, base: Option<&str>) -> Result<BTreeSet<BString>, RefError> {
        match base {
            Some(base) => self.subkeys(base),
            None => self.all_keys(),
        }
    }

    /// Resolve every name (under `base` when given) to an id, skipping
    /// entries that cannot be resolved.
    fn as_dict(&self, base: Option<&str>) -> Result<BTreeMap<BString, ObjectId>, RefError> {
        let mut ret = BTreeMap::new();
        for key in self.keys(base)? {
            let full = match base {
                Some(base) => {
                    let mut full = BString::from(base.trim_end_matches('/'));
                    full.extend_from_slice(b"/");
                    full.extend_from_slice(&key);
                    full
                }
                None => key.clone(),
            };
            let Ok(name) = RefName::new(full) else {
                continue;
            };
            match self.resolve(&name) {
                Ok(id) => {
                    ret.insert(key, id);
                }
                Err(RefError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(ret)
    }

    /// Unconditional assignment: follow symrefs, then overwrite.
    fn set_ref(&self, name: &RefName, id: &ObjectId) -> Result<(), RefError> {
        self.set_if_equals(name, None, id)?;
        Ok(())
    }

    /// Unconditional deletion of loose and packed state.
    fn remove_ref(&self, name: &RefName) -> Result<(), RefError> {
        self.remove_if_equals(name, None)?;
        Ok(())
    }
}
