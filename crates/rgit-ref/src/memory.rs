use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use bstr::BString;
use rgit_hash::ObjectId;

use crate::container::RefsContainer;
use crate::error::RefError;
use crate::name::RefName;
use crate::packed::PackedRefs;
use crate::RefValue;

/// Refs container over an in-memory map, for tests and transient
/// repositories. There is no packed table, so peeled lookups are always
/// unknown.
#[derive(Default)]
pub struct DictRefsContainer {
    refs: Mutex<BTreeMap<RefName, RefValue>>,
}

impl DictRefsContainer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefsContainer for DictRefsContainer {
    fn read_loose(&self, name: &RefName) -> Result<Option<RefValue>, RefError> {
        Ok(self.refs.lock().unwrap().get(name).cloned())
    }

    fn packed_refs(&self) -> Result<PackedRefs, RefError> {
        Ok(PackedRefs::empty())
    }

    fn all_keys(&self) -> Result<BTreeSet<BString>, RefError> {
        Ok(self
            .refs
            .lock()
            .unwrap()
            .keys()
            .map(|name| BString::from(name.as_bytes()))
            .collect())
    }

    fn set_if_equals(
        &self,
        name: &RefName,
        expected: Option<&ObjectId>,
        new_id: &ObjectId,
    ) -> Result<bool, RefError> {
        let real = match self.follow(name) {
            Ok((terminal, _)) => terminal,
            Err(RefError::SymrefDepth(_)) => name.clone(),
            Err(e) => return Err(e),
        };

        let mut refs = self.refs.lock().unwrap();
        if let Some(expected) = expected {
            let current = refs.get(&real).and_then(RefValue::as_direct);
            if current.as_ref() != Some(expected) {
                return Ok(false);
            }
        }
        refs.insert(real, RefValue::Direct(*new_id));
        Ok(true)
    }

    fn add_if_new(&self, name: &RefName, id: &ObjectId) -> Result<bool, RefError> {
        let mut refs = self.refs.lock().unwrap();
        if refs.contains_key(name) {
            return Ok(false);
        }
        refs.insert(name.clone(), RefValue::Direct(*id));
        Ok(true)
    }

    fn remove_if_equals(
        &self,
        name: &RefName,
        expected: Option<&ObjectId>,
    ) -> Result<bool, RefError> {
        let mut refs = self.refs.lock().unwrap();
        if let Some(expected) = expected {
            let current = refs.get(name).and_then(RefValue::as_direct);
            if current.as_ref() != Some(expected) {
                return Ok(false);
            }
        }
        refs.remove(name);
        Ok(true)
    }

    fn set_symbolic_ref(&self, name: &RefName, target: &RefName) -> Result<(), RefError> {
        self.refs
            .lock()
            .unwrap()
            .insert(name.clone(), RefValue::Symbolic(target.clone()));
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

    #[test]
    fn add_read_remove_cycle() {
        let refs = DictRefsContainer::new();
        let master = name("refs/heads/master");

        assert!(refs.add_if_new(&master, &oid(0xaa)).unwrap());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));
        assert!(!refs.add_if_new(&master, &oid(0xbb)).unwrap());

        assert!(refs.remove_if_equals(&master, Some(&oid(0xaa))).unwrap());
        assert!(refs.read_ref(&master).unwrap().is_none());
    }

    #[test]
    fn cas_mismatch_is_false() {
        let refs = DictRefsContainer::new();
        let master = name("refs/heads/master");
        refs.set_ref(&master, &oid(0xaa)).unwrap();

        assert!(!refs.set_if_equals(&master, Some(&oid(0xcc)), &oid(0xbb)).unwrap());
        assert_eq!(refs.resolve(&master).unwrap(), oid(0xaa));
    }

    #[test]
    fn symref_resolution() {
        let refs = DictRefsContainer::new();
        let head = name("HEAD");
        let master = name("refs/heads/master");

        refs.set_symbolic_ref(&head, &master).unwrap();
        refs.set_ref(&master, &oid(0xdd)).unwrap();

        let (terminal, id) = refs.follow(&head).unwrap();
        assert_eq!(terminal, master);
        assert_eq!(id, Some(oid(0xdd)));
        assert_eq!(refs.resolve(&head).unwrap(), oid(0xdd));
    }

    #[test]
    fn set_through_symref_writes_terminal() {
        let refs = DictRefsContainer::new();
        let head = name("HEAD");
        let master = name("refs/heads/master");
        refs.set_symbolic_ref(&head, &master).unwrap();

        refs.set_ref(&head, &oid(0xaa)).unwrap();
        assert!(refs.read_loose(&head).unwrap().unwrap().as_symbolic().is_some());
        assert_eq!(refs.read_loose(&master).unwrap().unwrap().as_direct(), Some(oid(0xaa)));
    }

    #[test]
    fn chain_depth_bound() {
        let refs = DictRefsContainer::new();
        // a -> b -> c -> d -> e -> f(direct): six reads, over the bound.
        let names: Vec<RefName> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|n| name(&format!("refs/heads/{n}")))
            .collect();
        for pair in names.windows(2) {
            refs.set_symbolic_ref(&pair[0], &pair[1]).unwrap();
        }
        refs.set_ref(&names[5], &oid(0x11)).unwrap();

        assert!(matches!(
            refs.follow(&names[0]),
            Err(RefError::SymrefDepth(_))
        ));
        // One link shorter resolves fine.
        assert_eq!(refs.resolve(&names[1]).unwrap(), oid(0x11));
    }

    #[test]
    fn peeled_is_always_unknown() {
        let refs = DictRefsContainer::new();
        let tag = name("refs/tags/v1.0");
        refs.set_ref(&tag, &oid(0xaa)).unwrap();
        assert!(refs.get_peeled(&tag).unwrap().is_none());
    }
}
